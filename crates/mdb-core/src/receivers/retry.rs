//! Conflict-retry loop shared by every receiver.
//!
//! Each attempt runs the chosen delivery strategy once. Name and domain
//! conflicts reported by the API are resolved interactively, persisted, and
//! retried with a rebuilt context; anything else ends the loop. After
//! [`MAX_PUBLISH_ATTEMPTS`] requests the loop gives up with
//! [`PublishError::TooManyRetries`].

use std::fmt;

use crate::api::StrategyResult;
use crate::browser;
use crate::config::{
    DESCRIPTOR_FILE, KEY_DOMAIN, KEY_NAME, MANIFEST_FILE, PackageJson, ProjectDescriptor,
};
use crate::context::{DeliveryMethod, PublishContext, PublishServices};
use crate::error::PublishError;
use crate::prompt::text_until_valid;
use crate::strategy::{DeliveryStrategy, select_method};

pub const MAX_PUBLISH_ATTEMPTS: u32 = 5;

/// Statuses the API uses for naming collisions.
const CONFLICT_STATUSES: [u16; 2] = [400, 409];

/// Which field the platform rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Name,
    Domain,
}

impl Conflict {
    /// Classify an error; `None` means it is not recoverable.
    pub fn classify(err: &PublishError) -> Option<Self> {
        let PublishError::Api { status, message } = err else {
            return None;
        };
        if !CONFLICT_STATUSES.contains(status) {
            return None;
        }
        let message = message.to_lowercase();
        if message.contains("project name") {
            Some(Self::Name)
        } else if message.contains("domain name") {
            Some(Self::Domain)
        } else {
            None
        }
    }
}

/// A field change made to get past a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Renamed { from: String, to: String },
    DomainChanged { from: Option<String>, to: String },
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renamed { from, to } => write!(f, "renamed project '{}' to '{}'", from, to),
            Self::DomainChanged { from: Some(from), to } => {
                write!(f, "changed domain '{}' to '{}'", from, to)
            }
            Self::DomainChanged { from: None, to } => write!(f, "set domain to '{}'", to),
        }
    }
}

/// Record of one request to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAttempt {
    /// 1-based attempt number
    pub number: u32,
    pub conflict: Option<Conflict>,
    pub resolution: Option<Resolution>,
}

/// Successful outcome of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub result: StrategyResult,
    pub method: DeliveryMethod,
    /// Every attempt made, the successful one last
    pub attempts: Vec<PublishAttempt>,
    /// Messages for the user (first-publish notes, browser failures)
    pub notes: Vec<String>,
    /// Context of the successful attempt
    pub context: PublishContext,
}

impl PublishReport {
    pub fn retries(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }
}

/// Publish `ctx`, resolving conflicts until it succeeds or the cap is hit.
pub async fn run(
    ctx: PublishContext,
    services: &PublishServices,
) -> Result<PublishReport, PublishError> {
    let strategy = DeliveryStrategy::from(select_method(&ctx, services).await?);
    let method = strategy.method();
    let mut ctx = ctx;
    let mut attempts = Vec::new();

    for number in 1..=MAX_PUBLISH_ATTEMPTS {
        tracing::debug!(attempt = number, %method, project = %ctx.project_name, "Publish attempt");

        let err = match strategy.publish(&ctx, services).await {
            Ok(result) => {
                attempts.push(PublishAttempt {
                    number,
                    conflict: None,
                    resolution: None,
                });
                return Ok(finish(ctx, method, attempts, result));
            }
            Err(err) => err,
        };

        let Some(conflict) = Conflict::classify(&err) else {
            return Err(err);
        };
        tracing::debug!(attempt = number, ?conflict, "Publish rejected with a conflict");

        if number == MAX_PUBLISH_ATTEMPTS {
            break;
        }

        services.prompter.notice(&err.to_string());
        let (next, resolution) = match conflict {
            Conflict::Name => resolve_name(ctx, services)?,
            Conflict::Domain => resolve_domain(ctx, services)?,
        };
        if let DeliveryStrategy::Pipeline(pipeline) = strategy {
            // The pipeline refuses a dirty tree; ship the resolution with the next push.
            pipeline
                .commit_settings(
                    services,
                    &[MANIFEST_FILE, DESCRIPTOR_FILE],
                    &format!("Publish: {}", resolution),
                )
                .await?;
        }
        ctx = next;
        attempts.push(PublishAttempt {
            number,
            conflict: Some(conflict),
            resolution: Some(resolution),
        });
    }

    Err(PublishError::TooManyRetries)
}

fn finish(
    ctx: PublishContext,
    method: DeliveryMethod,
    attempts: Vec<PublishAttempt>,
    result: StrategyResult,
) -> PublishReport {
    let mut notes = Vec::new();
    if ctx.flags.open {
        match &result.url {
            Some(url) => {
                if let Err(err) = browser::open(url) {
                    tracing::debug!(error = %err, "Failed to open browser");
                    notes.push(format!("Could not open a browser; visit {} instead.", url));
                }
            }
            None => notes.push("The server did not return a URL to open.".to_string()),
        }
    }
    PublishReport {
        result,
        method,
        attempts,
        notes,
        context: ctx,
    }
}

fn resolve_name(
    ctx: PublishContext,
    services: &PublishServices,
) -> Result<(PublishContext, Resolution), PublishError> {
    let rejected = ctx.project_name.clone();
    let name = text_until_valid(
        services.prompter.as_ref(),
        "Enter a new project name",
        None,
        |value| validate_project_name(value, Some(rejected.as_str())),
    )?;

    if let Some(mut package) = PackageJson::load(ctx.cwd())? {
        package.set_field("name", name.as_str());
        package.save()?;
    }
    let mut descriptor = ProjectDescriptor::load(ctx.cwd())?;
    descriptor.set_value(KEY_NAME, name.as_str());
    descriptor.save()?;

    tracing::debug!(from = %rejected, to = %name, "Project renamed");
    Ok((
        ctx.with_project_name(name.clone()),
        Resolution::Renamed {
            from: rejected,
            to: name,
        },
    ))
}

fn resolve_domain(
    ctx: PublishContext,
    services: &PublishServices,
) -> Result<(PublishContext, Resolution), PublishError> {
    let rejected = ctx.domain.clone();
    let suffix = services.config.subdomain_suffix();
    let domain = text_until_valid(
        services.prompter.as_ref(),
        "Enter a new domain name",
        None,
        |value| validate_domain(value, rejected.as_deref(), &suffix),
    )?;

    let mut descriptor = ProjectDescriptor::load(ctx.cwd())?;
    descriptor.set_value(KEY_DOMAIN, domain.as_str());
    descriptor.save()?;

    tracing::debug!(from = ?rejected, to = %domain, "Domain changed");
    Ok((
        ctx.with_domain(Some(domain.clone())),
        Resolution::DomainChanged {
            from: rejected,
            to: domain,
        },
    ))
}

/// Project names: non-empty, `[A-Za-z0-9._-]`, and not the rejected one.
pub fn validate_project_name(value: &str, rejected: Option<&str>) -> Result<(), String> {
    if value.is_empty() {
        return Err("Project name must not be empty.".to_string());
    }
    if rejected == Some(value) {
        return Err(format!(
            "The name '{}' is already taken. Choose a different one.",
            value
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(
            "Project name may only contain letters, digits, '.', '_' and '-'.".to_string(),
        );
    }
    Ok(())
}

/// Domains: no protocol prefix, different from the rejected one, and kept
/// under the platform suffix when the rejected domain used it.
pub fn validate_domain(value: &str, rejected: Option<&str>, suffix: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("Domain name must not be empty.".to_string());
    }
    let lower = value.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Err("Enter the domain without the http:// or https:// prefix.".to_string());
    }
    if value.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(format!("'{}' is not a valid domain name.", value));
    }
    if let Some(rejected) = rejected {
        if rejected.eq_ignore_ascii_case(value) {
            return Err(format!(
                "The domain '{}' is already taken. Choose a different one.",
                value
            ));
        }
        let suffix = suffix.to_lowercase();
        if rejected.to_lowercase().ends_with(&suffix)
            && (!lower.ends_with(&suffix) || lower.len() == suffix.len())
        {
            return Err(format!("The domain must be a subdomain ending with {}.", suffix));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HEADER_PROJECT_NAME;
    use crate::config::KEY_PUBLISH_METHOD;
    use crate::context::EntityState;
    use crate::testing::Mocks;
    use mockall::Sequence;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn backend_project(name: &str) -> (TempDir, PublishContext) {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".mdb"),
            format!(r#"{{"meta": {{"name": "{}"}}, "{}": "ftp"}}"#, name, KEY_PUBLISH_METHOD),
        )
        .unwrap();
        let ctx = PublishContext::new(
            dir.path(),
            name,
            EntityState::Backend {
                platform: "node18".into(),
            },
            "token",
        )
        .with_delivery_preference(Some(DeliveryMethod::Ftp));
        (dir, ctx)
    }

    fn ok() -> StrategyResult {
        StrategyResult {
            status_code: 200,
            message: "Published".to_string(),
            url: Some("https://api.mdbgo.io".to_string()),
        }
    }

    #[test]
    fn classifies_conflicts_by_status_and_message() {
        let name = PublishError::api(409, "This project name already exists");
        let domain = PublishError::api(400, "Domain name is taken");
        let other_status = PublishError::api(500, "project name already exists");
        let other_message = PublishError::api(409, "quota exceeded");

        assert_eq!(Conflict::classify(&name), Some(Conflict::Name));
        assert_eq!(Conflict::classify(&domain), Some(Conflict::Domain));
        assert_eq!(Conflict::classify(&other_status), None);
        assert_eq!(Conflict::classify(&other_message), None);
        assert_eq!(Conflict::classify(&PublishError::transport("reset")), None);
    }

    #[tokio::test]
    async fn name_conflict_retries_once_with_new_name() {
        let (dir, ctx) = backend_project("api");
        let mut mocks = Mocks::default();
        let mut seq = Sequence::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&seen);
        mocks
            .api
            .expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |req| {
                recorded
                    .lock()
                    .unwrap()
                    .push(req.headers.get(HEADER_PROJECT_NAME).unwrap().to_string());
                Err(PublishError::api(409, "project name already exists"))
            });
        mocks
            .prompter
            .expect_notice()
            .withf(|msg| msg == "project name already exists")
            .times(1)
            .return_const(());
        mocks
            .prompter
            .expect_text()
            .times(1)
            .returning(|_, _| Ok("api-v2".to_string()));
        let recorded = Arc::clone(&seen);
        mocks
            .api
            .expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |req| {
                recorded
                    .lock()
                    .unwrap()
                    .push(req.headers.get(HEADER_PROJECT_NAME).unwrap().to_string());
                Ok(ok())
            });

        let report = run(ctx, &mocks.build()).await.unwrap();

        assert_eq!(report.retries(), 1);
        assert_eq!(report.result.status_code, 200);
        assert_eq!(*seen.lock().unwrap(), vec!["api", "api-v2"]);
        assert_eq!(
            report.attempts[0].resolution,
            Some(Resolution::Renamed {
                from: "api".into(),
                to: "api-v2".into()
            })
        );
        let descriptor = ProjectDescriptor::load(dir.path()).unwrap();
        assert_eq!(descriptor.get_str(KEY_NAME).as_deref(), Some("api-v2"));
        assert_eq!(report.context.domain, None);
    }

    #[tokio::test]
    async fn pipeline_name_conflict_commits_rename_before_retrying() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(crate::strategy::CI_FILE), "stages: []\n").unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#).unwrap();
        std::fs::write(
            dir.path().join(".mdb"),
            r#"{"meta": {"name": "app"}, "publishMethod": "pipeline"}"#,
        )
        .unwrap();
        let ctx = PublishContext::new(dir.path(), "app", EntityState::Frontend, "token")
            .with_delivery_preference(Some(DeliveryMethod::Pipeline));

        let mut mocks = Mocks::default().quiet();
        let mut seq = Sequence::new();
        mocks
            .vcs
            .expect_current_branch()
            .returning(|| Ok("public".to_string()));
        mocks.vcs.expect_push().times(3).returning(|_| Ok(()));
        mocks
            .vcs
            .expect_current_remote_url()
            .returning(|| Ok("git@git.mdbgo.com:jdoe/app.git".to_string()));
        mocks
            .vcs
            .expect_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));
        mocks
            .api
            .expect_save_pipeline()
            .withf(|save| save.project_name == "app")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(PublishError::api(409, "project name already exists")));
        mocks
            .prompter
            .expect_text()
            .times(1)
            .returning(|_, _| Ok("app-2".to_string()));
        mocks
            .vcs
            .expect_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![".mdb".to_string(), "package.json".to_string()]));
        mocks
            .vcs
            .expect_commit()
            .withf(|paths, _| paths.len() == 2 && paths[0] == "package.json" && paths[1] == ".mdb")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mocks
            .vcs
            .expect_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));
        mocks
            .api
            .expect_save_pipeline()
            .withf(|save| save.project_name == "app-2")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ok()));

        let report = run(ctx, &mocks.build()).await.unwrap();

        assert_eq!(report.method, DeliveryMethod::Pipeline);
        assert_eq!(report.retries(), 1);
        assert_eq!(report.context.project_name, "app-2");
    }

    #[tokio::test]
    async fn continuous_conflicts_stop_after_five_requests() {
        let (_dir, ctx) = backend_project("api");
        let mut mocks = Mocks::default().quiet();
        mocks
            .api
            .expect_publish()
            .times(MAX_PUBLISH_ATTEMPTS as usize)
            .returning(|_| Err(PublishError::api(409, "project name already exists")));
        let counter = Arc::new(Mutex::new(0u32));
        let names = Arc::clone(&counter);
        mocks.prompter.expect_text().returning(move |_, _| {
            let mut n = names.lock().unwrap();
            *n += 1;
            Ok(format!("api-{}", n))
        });

        let err = run(ctx, &mocks.build()).await.unwrap_err();

        assert!(matches!(err, PublishError::TooManyRetries));
        assert_eq!(err.to_string(), crate::error::TOO_MANY_RETRIES);
        assert_eq!(*counter.lock().unwrap(), MAX_PUBLISH_ATTEMPTS - 1);
    }

    #[tokio::test]
    async fn domain_resolution_leaves_name_untouched() {
        let (dir, ctx) = backend_project("api");
        let ctx = ctx.with_domain(Some("api.mdbgo.io".into()));
        let mut mocks = Mocks::default().quiet();
        let mut seq = Sequence::new();
        mocks
            .api
            .expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(PublishError::api(400, "domain name already in use")));
        mocks
            .prompter
            .expect_text()
            .times(1)
            .returning(|_, _| Ok("shop.mdbgo.io".to_string()));
        mocks
            .api
            .expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.headers.domain.as_deref() == Some("shop.mdbgo.io"))
            .returning(|_| Ok(ok()));

        let report = run(ctx, &mocks.build()).await.unwrap();

        assert_eq!(report.context.project_name, "api");
        let descriptor = ProjectDescriptor::load(dir.path()).unwrap();
        assert_eq!(descriptor.get_str(KEY_NAME).as_deref(), Some("api"));
        assert_eq!(
            descriptor.get_str(KEY_DOMAIN).as_deref(),
            Some("shop.mdbgo.io")
        );
    }

    #[tokio::test]
    async fn other_errors_are_terminal() {
        let (_dir, ctx) = backend_project("api");
        let mut mocks = Mocks::default();
        mocks
            .api
            .expect_publish()
            .times(1)
            .returning(|_| Err(PublishError::api(500, "Internal error")));
        mocks.prompter.expect_text().never();

        let err = run(ctx, &mocks.build()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn attempt_numbers_increase_by_one() {
        let (_dir, ctx) = backend_project("api");
        let mut mocks = Mocks::default().quiet();
        let mut seq = Sequence::new();
        for _ in 0..3 {
            mocks
                .api
                .expect_publish()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Err(PublishError::api(409, "project name already exists")));
        }
        mocks
            .api
            .expect_publish()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ok()));
        let counter = Arc::new(Mutex::new(0u32));
        let names = Arc::clone(&counter);
        mocks.prompter.expect_text().returning(move |_, _| {
            let mut n = names.lock().unwrap();
            *n += 1;
            Ok(format!("api-{}", n))
        });

        let report = run(ctx, &mocks.build()).await.unwrap();

        let numbers: Vec<u32> = report.attempts.iter().map(|a| a.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(report.context.project_name, "api-3");
    }

    #[test]
    fn project_name_rules() {
        assert!(validate_project_name("", None).is_err());
        assert!(validate_project_name("app", Some("app")).is_err());
        assert!(validate_project_name("my app", None).is_err());
        assert!(validate_project_name("my-app_2.0", Some("app")).is_ok());
    }

    #[test]
    fn domain_rules() {
        let suffix = ".mdbgo.io";
        assert!(validate_domain("https://shop.mdbgo.io", None, suffix).is_err());
        assert!(validate_domain("HTTP://shop.example.com", None, suffix).is_err());
        assert!(validate_domain("shop.mdbgo.io", Some("shop.mdbgo.io"), suffix).is_err());
        assert!(validate_domain("shop.example.com", Some("shop.mdbgo.io"), suffix).is_err());
        assert!(validate_domain(".mdbgo.io", Some("shop.mdbgo.io"), suffix).is_err());
        assert!(validate_domain("store.mdbgo.io", Some("shop.mdbgo.io"), suffix).is_ok());
        assert!(validate_domain("www.example.com", Some("example.com"), suffix).is_ok());
    }
}
