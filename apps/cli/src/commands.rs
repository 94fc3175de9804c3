//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use auditor_core::{Pipeline, PipelineObserver, PipelineOutcome, StageContext};
use auditor_discovery::{NuGetClient, NuGetEndpoints};
use auditor_github::GitHubClient;
use auditor_shared::{
    AppConfig, AuditError, AuditOptions, github_token, init_config, load_config,
    load_config_from, validate_github_token,
};
use auditor_storage::JsonCheckpoint;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Addin auditor: audit Cake addins against the recommended practices.
#[derive(Parser)]
#[command(
    name = "addin-auditor",
    version,
    about = "Discover Cake addins, audit them, and report the findings.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.addin-auditor/auditor.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the audit, resuming from the checkpoint when there is one.
    Audit(AuditArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags of the `audit` command. Each one overrides the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct AuditArgs {
    /// Audit only this addin.
    #[arg(long)]
    pub addin: Option<String>,

    /// Delete the scratch directory (checkpoint and downloads) first.
    #[arg(long)]
    pub clear_cache: bool,

    /// File an issue on every addin repo with recommended changes.
    #[arg(long)]
    pub create_issues: bool,

    /// Write the markdown report to the scratch directory.
    #[arg(long)]
    pub markdown_file: bool,

    /// Commit the markdown report to the report repo.
    #[arg(long)]
    pub markdown_repo: bool,

    /// Cake version addins should reference.
    #[arg(long)]
    pub recommended_version: Option<String>,

    /// Scratch directory.
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Concurrent operations per stage (0 = unbounded).
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl AuditArgs {
    fn apply(self, options: &mut AuditOptions) {
        options.addin = self.addin.or(options.addin.take());
        options.clear_cache |= self.clear_cache;
        options.create_issues |= self.create_issues;
        options.markdown_to_file |= self.markdown_file;
        options.markdown_to_repo |= self.markdown_repo;
        if let Some(version) = self.recommended_version {
            options.recommended_version = version;
        }
        if let Some(dir) = self.temp_dir {
            options.temp_dir = dir;
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "auditor=info",
        1 => "auditor=debug",
        _ => "auditor=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Audit(args) => cmd_audit(cli.config.as_deref(), args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()).await,
        },
    }
}

fn load(path: Option<&Path>) -> Result<AppConfig, AuditError> {
    match path {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
}

/// Account that files issues, read from the configured env var.
fn issue_creator(config: &AppConfig) -> Result<String> {
    let var_name = &config.github.username_env;
    std::env::var(var_name)
        .ok()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            eyre!("GitHub username not found. Set the {var_name} environment variable to file issues.")
        })
}

async fn cmd_audit(config_path: Option<&Path>, args: AuditArgs) -> Result<()> {
    let config = load(config_path)?;
    let mut options = AuditOptions::from(&config);
    args.apply(&mut options);

    // Writes need an authenticated account; reads work anonymously.
    if options.create_issues || options.markdown_to_repo {
        validate_github_token(&config)?;
    }
    let creator = if options.create_issues {
        issue_creator(&config)?
    } else {
        String::new()
    };

    let timeout = Duration::from_secs(config.defaults.request_timeout_secs);
    let token = github_token(&config);
    let github = GitHubClient::new(&config.github.api_url, token.as_deref(), timeout)?;
    let registry = NuGetClient::new(NuGetEndpoints::from(&config.nuget), timeout)?;

    let ctx = StageContext::new(&config, options, Arc::new(github), Arc::new(registry))
        .with_issue_creator(creator);

    if ctx.options.clear_cache {
        ctx.scratch.purge()?;
    }

    info!(
        scratch = %ctx.scratch.root().display(),
        addin = ?ctx.options.addin,
        recommended_version = %ctx.options.recommended_version,
        "starting addin audit"
    );

    let store = JsonCheckpoint::in_dir(ctx.scratch.root());
    let progress = CliProgress::new();
    let outcome = Pipeline::standard().run(&ctx, &store, &progress).await?;
    progress.finish();

    print_summary(&outcome, store.path());
    Ok(())
}

fn print_summary(outcome: &PipelineOutcome, checkpoint: &Path) {
    let exceptions = outcome
        .entities
        .iter()
        .filter(|e| !e.analysis.is_clean())
        .count();

    println!();
    match &outcome.aborted_at {
        None => println!("  Audit complete."),
        Some((stage, error)) => {
            println!("  Audit stopped at stage '{stage}': {error}");
            println!("  Run the command again to resume from the checkpoint.");
        }
    }
    println!("  Addins:     {}", outcome.entities.len());
    println!("  Exceptions: {exceptions}");
    println!("  Stages:     {} run, {} skipped", outcome.completed.len(), outcome.skipped.len());
    println!("  Checkpoint: {}", checkpoint.display());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Pipeline observer drawing an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl PipelineObserver for CliProgress {
    fn stage_started(&self, _name: &str, description: &str) {
        self.spinner.set_message(description.to_string());
    }

    fn stage_skipped(&self, name: &str) {
        self.spinner.println(format!("  - {name} (skipped)"));
    }

    fn stage_completed(&self, name: &str, entities: usize, elapsed: Duration) {
        self.spinner.println(format!(
            "  ✓ {name} [{entities} addins, {:.1}s]",
            elapsed.as_secs_f64()
        ));
    }

    fn stage_failed(&self, name: &str, error: &AuditError) {
        self.spinner.println(format!("  ✗ {name}: {error}"));
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
