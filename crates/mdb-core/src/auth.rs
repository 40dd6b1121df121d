//! Auth token lookup and claim decoding.
//!
//! The token itself is written by the login command; publishing only reads it.

use std::path::Path;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::PublishError;

/// Environment variable that takes precedence over the token file.
pub const TOKEN_ENV: &str = "MDB_TOKEN";

#[derive(Debug, Deserialize)]
struct TokenClaims {
    name: Option<String>,
}

/// Read the bearer token from `MDB_TOKEN` or the token file.
pub fn load_token(token_file: &Path) -> Result<String, PublishError> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }
    read_token_file(token_file)
}

pub fn read_token_file(token_file: &Path) -> Result<String, PublishError> {
    let not_logged_in =
        || PublishError::config("You are not logged in. Please run `mdb login` first.");

    if !token_file.exists() {
        return Err(not_logged_in());
    }
    let token = std::fs::read_to_string(token_file)
        .with_context(|| format!("Failed to read token file: {}", token_file.display()))?;
    let token = token.trim();
    if token.is_empty() {
        return Err(not_logged_in());
    }
    Ok(token.to_string())
}

/// Recover the username from the token's payload segment.
pub fn username_from_token(token: &str) -> anyhow::Result<String> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Malformed auth token: missing payload segment"))?;

    // Some issuers pad their segments; the URL-safe engine rejects padding.
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("Malformed auth token: payload is not base64url")?;
    let claims: TokenClaims =
        serde_json::from_slice(&decoded).context("Malformed auth token: payload is not JSON")?;

    claims
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Auth token does not contain a username"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn token_with_payload(payload: &str) -> String {
        format!("header.{}.signature", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn decodes_username_claim() {
        let token = token_with_payload(r#"{"id": 7, "name": "jdoe"}"#);
        assert_eq!(username_from_token(&token).unwrap(), "jdoe");
    }

    #[test]
    fn accepts_padded_payload() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode(r#"{"name":"ab"}"#);
        let token = format!("h.{padded}.s");
        assert_eq!(username_from_token(&token).unwrap(), "ab");
    }

    #[test]
    fn rejects_token_without_payload() {
        assert!(username_from_token("only-one-segment").is_err());
    }

    #[test]
    fn rejects_token_without_name() {
        let token = token_with_payload(r#"{"id": 7}"#);
        assert!(username_from_token(&token).is_err());
    }

    #[test]
    fn missing_token_file_asks_for_login() {
        let temp = TempDir::new().unwrap();
        let err = read_token_file(&temp.path().join("auth")).unwrap_err();
        assert!(err.to_string().contains("mdb login"));
    }

    #[test]
    fn token_file_is_trimmed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("auth");
        std::fs::write(&path, "abc.def.ghi\n").unwrap();
        assert_eq!(read_token_file(&path).unwrap(), "abc.def.ghi");
    }
}
