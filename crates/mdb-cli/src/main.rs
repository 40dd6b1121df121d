//! mdb - MDB Go command line client
//!
//! Usage:
//!   mdb publish                  # Publish the project in the current directory
//!   mdb publish backend --open   # Publish a backend and open it in a browser
//!   mdb publish --pipeline       # Deliver through the platform's CI pipeline
//!   mdb config api-host <url>    # Change a global setting

mod interactive;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mdb_core::api::HttpPublishApi;
use mdb_core::auth;
use mdb_core::config::{CliConfig, ConfigStore, ProjectDescriptor, default_lock_dir, to_toml};
use mdb_core::context::{DeliveryMethod, EntityKind, PublishFlags, PublishServices};
use mdb_core::error::PublishError;
use mdb_core::git::GitCli;
use mdb_core::package_manager::{self, NodePackageManager};
use mdb_core::progress::Progress;
use mdb_core::receivers::{self, PublishInvocation, PublishReport};

use crate::interactive::DialoguerPrompter;

#[derive(Parser)]
#[command(name = "mdb")]
#[command(about = "MDB Go command line client", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish the project in the current directory
    Publish(PublishArgs),

    /// Show or change global settings
    ///
    /// Without arguments prints the whole configuration.
    Config {
        /// Setting to read or change
        key: Option<ConfigKey>,
        /// New value
        value: Option<String>,
    },
}

#[derive(Args)]
struct PublishArgs {
    /// Project type (defaults to meta.type in .mdb, then frontend)
    entity: Option<EntityArg>,
    /// Build locally and upload the files
    #[arg(long, conflicts_with = "pipeline")]
    ftp: bool,
    /// Push to the public branch and let the CI pipeline deploy
    #[arg(long)]
    pipeline: bool,
    /// Open the published project in a browser
    #[arg(short, long)]
    open: bool,
    /// Run the project's tests before publishing
    #[arg(short, long)]
    test: bool,
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,
}

impl PublishArgs {
    fn flags(&self) -> PublishFlags {
        let method = if self.pipeline {
            Some(DeliveryMethod::Pipeline)
        } else if self.ftp {
            Some(DeliveryMethod::Ftp)
        } else {
            None
        };
        PublishFlags {
            open: self.open,
            test: self.test,
            method,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EntityArg {
    Frontend,
    Backend,
    #[value(alias = "wp")]
    Wordpress,
}

impl From<EntityArg> for EntityKind {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Frontend => EntityKind::Frontend,
            EntityArg::Backend => EntityKind::Backend,
            EntityArg::Wordpress => EntityKind::Wordpress,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ConfigKey {
    ApiHost,
    ProjectsDomain,
    GitHost,
    PublicBranch,
}

impl ConfigKey {
    fn field<'a>(&self, config: &'a mut CliConfig) -> &'a mut String {
        match self {
            Self::ApiHost => &mut config.api_host,
            Self::ProjectsDomain => &mut config.projects_domain,
            Self::GitHost => &mut config.git_host,
            Self::PublicBranch => &mut config.public_branch,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mdb=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Publish(args) => run_publish(args),
        Commands::Config { key, value } => run_config(key, value),
    }
}

fn run_publish(args: PublishArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(publish(args))
}

async fn publish(args: PublishArgs) -> Result<()> {
    let store = ConfigStore::from_default_dir()?;
    let config = store.load()?.with_env_overrides();
    config.validate()?;

    let cwd = match &args.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    let cwd = cwd
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", cwd.display()))?;

    let token = auth::load_token(&store.token_path())?;
    let kind = receivers::resolve_kind(args.entity.map(Into::into), &cwd)?;
    let descriptor = ProjectDescriptor::load(&cwd)?;
    let package_manager = NodePackageManager::new(package_manager::detect(&cwd, &descriptor));

    let services = PublishServices {
        api: Arc::new(HttpPublishApi::new(&config.api_host)?),
        vcs: Arc::new(GitCli::new(&cwd)),
        package_manager: Arc::new(package_manager),
        prompter: Arc::new(DialoguerPrompter::new()),
        progress: Progress::new(),
        lock_dir: default_lock_dir()?,
        config,
    };
    let invocation = PublishInvocation {
        cwd,
        token,
        flags: args.flags(),
    };

    tracing::debug!(%kind, cwd = %invocation.cwd.display(), "Publishing");
    match receivers::publish(kind, &invocation, &services).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(err) => {
            print_failure(&err);
            Err(err.into())
        }
    }
}

fn print_report(report: &PublishReport) {
    println!();
    println!(
        "{} Published {} ({})",
        style("✓").green().bold(),
        style(&report.context.project_name).bold(),
        report.method
    );
    if !report.result.message.is_empty() {
        println!("  {}", report.result.message);
    }
    if let Some(url) = &report.result.url {
        println!("  {}", style(url).cyan().underlined());
    }
    for attempt in &report.attempts {
        if let Some(resolution) = &attempt.resolution {
            println!(
                "  {}",
                style(format!("Attempt {}: {}", attempt.number, resolution)).dim()
            );
        }
    }
    for note in &report.notes {
        println!("  {} {}", style("Note:").yellow(), note);
    }
}

fn print_failure(err: &PublishError) {
    if let Some(hint) = err.hint() {
        eprintln!("{} {}", style("Hint:").yellow().bold(), hint);
    }
}

fn run_config(key: Option<ConfigKey>, value: Option<String>) -> Result<()> {
    let store = ConfigStore::from_default_dir()?;
    let mut config = store.load()?;

    let Some(key) = key else {
        print!("{}", to_toml(&config)?);
        return Ok(());
    };
    let Some(value) = value else {
        println!("{}", key.field(&mut config));
        return Ok(());
    };

    *key.field(&mut config) = value.trim().to_string();
    config.validate()?;
    store.save(&config)?;
    println!(
        "{} Saved to {}",
        style("✓").green().bold(),
        store.config_path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_flag_selects_pipeline() {
        let cli = Cli::parse_from(["mdb", "publish", "backend", "--pipeline", "--open"]);
        let Commands::Publish(args) = cli.command else {
            panic!("expected publish");
        };
        let flags = args.flags();
        assert_eq!(flags.method, Some(DeliveryMethod::Pipeline));
        assert!(flags.open);
        assert!(matches!(args.entity, Some(EntityArg::Backend)));
    }

    #[test]
    fn ftp_and_pipeline_conflict() {
        let result = Cli::try_parse_from(["mdb", "publish", "--ftp", "--pipeline"]);
        assert!(result.is_err());
    }

    #[test]
    fn wp_alias_maps_to_wordpress() {
        let cli = Cli::parse_from(["mdb", "publish", "wp"]);
        let Commands::Publish(args) = cli.command else {
            panic!("expected publish");
        };
        assert_eq!(
            args.entity.map(EntityKind::from),
            Some(EntityKind::Wordpress)
        );
        assert_eq!(args.flags(), PublishFlags::default());
    }

    #[test]
    fn config_key_edits_matching_field() {
        let mut config = CliConfig::default();
        *ConfigKey::PublicBranch.field(&mut config) = "release".to_string();
        assert_eq!(config.public_branch, "release");
    }
}
