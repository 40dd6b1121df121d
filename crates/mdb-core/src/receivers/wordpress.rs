use async_trait::async_trait;

use super::{PublishInvocation, PublishReport, Receiver, base_context, resolve_project_name};
use crate::config::{KEY_TYPE, KEY_WORDPRESS_PAGE, ProjectDescriptor};
use crate::context::{EntityKind, EntityState, PublishContext, PublishServices, WpCredentials};
use crate::error::PublishError;
use crate::prompt::{Prompter, text_until_valid};

/// Page variants a new WordPress site can start from.
pub const WORDPRESS_PAGES: &[&str] = &["blank", "blog", "blog-demo", "ecommerce", "ecommerce-demo"];

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct WordpressReceiver;

#[async_trait]
impl Receiver for WordpressReceiver {
    fn kind(&self) -> EntityKind {
        EntityKind::Wordpress
    }

    async fn prepare(
        &self,
        invocation: &PublishInvocation,
        services: &PublishServices,
    ) -> Result<PublishContext, PublishError> {
        let prompter = services.prompter.as_ref();
        let mut descriptor = ProjectDescriptor::load(&invocation.cwd)?;
        // `meta.type` is only recorded once a publish has succeeded.
        let first_publish = descriptor.get_str(KEY_TYPE).is_none();

        let page = match descriptor.get_str(KEY_WORDPRESS_PAGE) {
            Some(page) => page,
            None => {
                let items: Vec<String> = WORDPRESS_PAGES.iter().map(|p| p.to_string()).collect();
                let choice = prompter.select("Choose a WordPress page variant", &items, 0)?;
                let page = items
                    .get(choice)
                    .cloned()
                    .ok_or_else(|| PublishError::config("No WordPress page variant selected"))?;
                descriptor.set_value(KEY_WORDPRESS_PAGE, page.as_str());
                descriptor.save()?;
                page
            }
        };

        let name = resolve_project_name(&invocation.cwd, &mut descriptor, prompter)?;
        let credentials = if first_publish {
            Some(collect_credentials(prompter)?)
        } else {
            None
        };

        Ok(base_context(
            invocation,
            name,
            EntityState::Wordpress { page, credentials },
            &descriptor,
        ))
    }

    fn first_publish_note(&self, report: &PublishReport) -> String {
        let username = match &report.context.entity {
            EntityState::Wordpress {
                credentials: Some(creds),
                ..
            } => creds.username.as_str(),
            _ => "your admin user",
        };
        match &report.result.url {
            Some(url) => format!(
                "WordPress is being installed. Log in at {}/wp-admin as {} once it is ready.",
                url.trim_end_matches('/'),
                username
            ),
            None => format!(
                "WordPress is being installed. Log in to /wp-admin as {} once it is ready.",
                username
            ),
        }
    }
}

fn collect_credentials(prompter: &dyn Prompter) -> Result<WpCredentials, PublishError> {
    let username = text_until_valid(prompter, "WordPress admin username", None, |value| {
        if value.is_empty() {
            Err("Username must not be empty.".to_string())
        } else {
            Ok(())
        }
    })?;
    let email = text_until_valid(prompter, "WordPress admin email", None, validate_email)?;

    let password = loop {
        let password = prompter.password("WordPress admin password")?;
        if password.chars().count() >= MIN_PASSWORD_LEN {
            break password;
        }
        prompter.notice(&format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LEN
        ));
    };

    Ok(WpCredentials {
        username,
        email,
        password,
    })
}

fn validate_email(value: &str) -> Result<(), String> {
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(format!("'{}' is not a valid email address.", value)),
    }
}
