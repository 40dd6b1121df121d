//! Platform API client for publishing.
//!
//! Two endpoints matter here: `POST /project/publish` takes the archive
//! stream, `POST /project/save/<name>` correlates a pipeline run.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::archive::ArchiveStream;
use crate::context::{EntityState, PublishContext};
use crate::error::PublishError;

pub const HEADER_PROJECT_NAME: &str = "x-mdb-cli-project-name";
pub const HEADER_PACKAGE_NAME: &str = "x-mdb-cli-package-name";
pub const HEADER_DOMAIN_NAME: &str = "x-mdb-cli-domain-name";
pub const HEADER_BACKEND_TECHNOLOGY: &str = "x-mdb-cli-backend-technology";
pub const HEADER_WP_PAGE: &str = "x-mdb-cli-wp-page";
pub const HEADER_WP_USERNAME: &str = "x-mdb-cli-wp-username";
pub const HEADER_WP_EMAIL: &str = "x-mdb-cli-wp-email";
pub const HEADER_WP_PASSWORD: &str = "x-mdb-cli-wp-password";

/// Parsed acknowledgement of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyResult {
    pub status_code: u16,
    pub message: String,
    pub url: Option<String>,
}

impl StrategyResult {
    /// HTTP 201 marks the first publish of a project.
    pub fn is_first_publish(&self) -> bool {
        self.status_code == StatusCode::CREATED.as_u16()
    }
}

/// Metadata sent alongside the archive.
#[derive(Clone, PartialEq, Eq)]
pub struct PublishHeaders {
    pub token: String,
    pub project_name: String,
    pub package_name: Option<String>,
    pub domain: Option<String>,
    /// Entity-specific headers
    pub extra: Vec<(&'static str, String)>,
}

impl PublishHeaders {
    pub fn from_context(ctx: &PublishContext) -> Self {
        let mut extra = Vec::new();
        match &ctx.entity {
            EntityState::Frontend => {}
            EntityState::Backend { platform } => {
                extra.push((HEADER_BACKEND_TECHNOLOGY, platform.clone()));
            }
            EntityState::Wordpress { page, credentials } => {
                extra.push((HEADER_WP_PAGE, page.clone()));
                if let Some(creds) = credentials {
                    extra.push((HEADER_WP_USERNAME, creds.username.clone()));
                    extra.push((HEADER_WP_EMAIL, creds.email.clone()));
                    extra.push((HEADER_WP_PASSWORD, creds.password.clone()));
                }
            }
        }

        Self {
            token: ctx.token.clone(),
            project_name: ctx.project_name.clone(),
            package_name: ctx.package_name.clone(),
            domain: ctx.domain.clone(),
            extra,
        }
    }

    /// Header value by name, including the fixed ones.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            HEADER_PROJECT_NAME => Some(self.project_name.as_str()),
            HEADER_PACKAGE_NAME => self.package_name.as_deref(),
            HEADER_DOMAIN_NAME => self.domain.as_deref(),
            _ => self
                .extra
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str()),
        }
    }
}

impl std::fmt::Debug for PublishHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let extra: Vec<_> = self
            .extra
            .iter()
            .map(|(key, value)| {
                if *key == HEADER_WP_PASSWORD {
                    (*key, "<redacted>")
                } else {
                    (*key, value.as_str())
                }
            })
            .collect();
        f.debug_struct("PublishHeaders")
            .field("project_name", &self.project_name)
            .field("package_name", &self.package_name)
            .field("domain", &self.domain)
            .field("extra", &extra)
            .finish_non_exhaustive()
    }
}

/// One upload: headers plus the archive body.
#[derive(Debug)]
pub struct PublishRequest {
    pub headers: PublishHeaders,
    pub body: ArchiveStream,
}

/// Pipeline correlation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSave {
    pub token: String,
    pub project_name: String,
    pub repo_url: String,
    pub domain: Option<String>,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PublishApi: Send + Sync {
    /// Upload the archive; resolves once the HTTP response has completed.
    async fn publish(&self, request: PublishRequest) -> Result<StrategyResult, PublishError>;

    /// Tell the platform which repository and domain a pending CI run belongs to.
    async fn save_pipeline(&self, save: PipelineSave) -> Result<StrategyResult, PublishError>;
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveBody<'a> {
    repo_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
}

/// reqwest-backed [`PublishApi`].
#[derive(Debug, Clone)]
pub struct HttpPublishApi {
    base: Url,
    client: reqwest::Client,
}

impl HttpPublishApi {
    pub fn new(api_host: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mdb-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Self::with_client(api_host, client)
    }

    /// Use a preconfigured client (proxy, TLS or timeout settings).
    pub fn with_client(api_host: &str, client: reqwest::Client) -> anyhow::Result<Self> {
        let mut base = Url::parse(api_host)
            .map_err(|e| anyhow::anyhow!("Invalid API host '{}': {}", api_host, e))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, client })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, PublishError> {
        self.base
            .join(path)
            .map_err(|e| PublishError::config(format!("Invalid endpoint '{}': {}", path, e)))
    }
}

#[async_trait]
impl PublishApi for HttpPublishApi {
    async fn publish(&self, request: PublishRequest) -> Result<StrategyResult, PublishError> {
        let url = self.endpoint("project/publish")?;
        let headers = request.headers;

        let mut builder = self
            .client
            .post(url.clone())
            .bearer_auth(&headers.token)
            .header(HEADER_PROJECT_NAME, &headers.project_name);
        if let Some(package) = &headers.package_name {
            builder = builder.header(HEADER_PACKAGE_NAME, package);
        }
        if let Some(domain) = &headers.domain {
            builder = builder.header(HEADER_DOMAIN_NAME, domain);
        }
        for (key, value) in &headers.extra {
            builder = builder.header(*key, value);
        }

        tracing::debug!(%url, project = %headers.project_name, "Uploading archive");
        let response = builder
            .body(request.body.into_body())
            .send()
            .await
            .map_err(|e| PublishError::transport(format!("{} ({})", e, url)))?;

        read_response(response).await
    }

    async fn save_pipeline(&self, save: PipelineSave) -> Result<StrategyResult, PublishError> {
        let url = self.endpoint(&format!("project/save/{}", save.project_name))?;
        let body = SaveBody {
            repo_url: &save.repo_url,
            domain: save.domain.as_deref(),
        };

        tracing::debug!(%url, repo = %save.repo_url, "Saving pipeline metadata");
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&save.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::transport(format!("{} ({})", e, url)))?;

        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<StrategyResult, PublishError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| PublishError::transport(format!("Failed to read response body: {}", e)))?;
    parse_response(status, &text)
}

/// Turn a completed response into a result or an API rejection.
pub fn parse_response(status: StatusCode, body: &str) -> Result<StrategyResult, PublishError> {
    let parsed: Option<ApiMessage> = serde_json::from_str(body).ok();

    if status.is_success() {
        let parsed = parsed.ok_or_else(|| {
            PublishError::transport(format!("Unexpected response from the server: {}", body))
        })?;
        return Ok(StrategyResult {
            status_code: status.as_u16(),
            message: parsed.message.unwrap_or_default(),
            url: parsed.url.filter(|u| !u.trim().is_empty()),
        });
    }

    let message = parsed
        .and_then(|p| p.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });
    Err(PublishError::api(status.as_u16(), message))
}
