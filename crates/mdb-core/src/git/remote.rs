//! Remote URL helpers.

use url::Url;

/// Host part of a git remote, for both URL and scp-like (`git@host:path`) forms.
pub fn remote_host(remote: &str) -> Option<String> {
    let remote = remote.trim();
    if remote.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(remote) {
        if let Some(host) = url.host_str() {
            return Some(host.to_lowercase());
        }
    }

    // scp-like syntax: [user@]host:path
    let (authority, _path) = remote.split_once(':')?;
    let host = authority.rsplit('@').next()?;
    if host.is_empty() || host.contains('/') {
        return None;
    }
    Some(host.to_lowercase())
}

/// True when `remote` lives on `host`.
pub fn points_at_host(remote: &str, host: &str) -> bool {
    remote_host(remote).is_some_and(|h| h == host.trim().to_lowercase())
}
