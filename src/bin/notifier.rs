//! EventCatalog Notifier CLI
//!
//! Detects consumer and schema changes in an EventCatalog between two git
//! revisions and notifies the subscribed teams.
//!
//! Usage:
//!   catalog-notifier detect --catalog ./catalog --commit-range origin/main...HEAD --dry-run
//!   catalog-notifier detect --lifecycle draft --action-url https://github.com/org/repo/pull/42

use std::path::PathBuf;

use anyhow::Context;
use catalog_notifier::config::NotifierConfig;
use catalog_notifier::dispatch::{DeliveryMode, DispatchReport};
use catalog_notifier::error::ConfigError;
use catalog_notifier::{
    aggregate, dispatch, filter_notifications, validate_root, CommitRange, DetectContext, Detector,
    DispatchOptions, FsCatalog, GitRepository, HttpTransport, NotifierError, NotifierSettings,
    Stage, Vcs,
};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catalog-notifier")]
#[command(about = "Notify teams about EventCatalog changes between git revisions")]
#[command(version)]
struct Cli {
    /// Additional settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<String>,

    /// Verbose output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect changes and notify subscribers
    Detect(DetectArgs),
}

#[derive(Args)]
struct DetectArgs {
    /// Show the notifications that would be sent without sending them
    #[arg(long)]
    dry_run: bool,

    /// Notifier configuration file, relative to the catalog
    #[arg(long)]
    config: Option<String>,

    /// Path to the EventCatalog directory
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Git commit range to compare (e.g. HEAD~1..HEAD or main...feature)
    #[arg(long)]
    commit_range: Option<String>,

    /// Lifecycle stage of the change
    #[arg(long, value_enum)]
    lifecycle: Option<Stage>,

    /// Link to the change under review, added to schema change messages
    #[arg(long)]
    action_url: Option<String>,

    /// Environment label added to notification metadata
    #[arg(long)]
    environment: Option<String>,
}

impl DetectArgs {
    /// Flags take precedence over settings files and environment
    fn apply(&self, settings: &mut NotifierSettings) {
        if let Some(config) = &self.config {
            settings.config_file = config.clone();
        }
        if let Some(catalog) = &self.catalog {
            settings.catalog = catalog.clone();
        }
        if let Some(range) = &self.commit_range {
            settings.commit_range = range.clone();
        }
        if let Some(stage) = self.lifecycle {
            settings.lifecycle = stage;
        }
        if self.environment.is_some() {
            settings.environment = self.environment.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let verbose = cli.verbose;
    if let Err(e) = run(cli).await {
        report_error(&e, verbose);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = NotifierSettings::load_from(cli.settings.as_deref())
        .map_err(|e| NotifierError::from(ConfigError::from(e)))?;

    match cli.command {
        Commands::Detect(args) => {
            args.apply(&mut settings);
            detect(settings, &args).await
        }
    }
}

async fn detect(mut settings: NotifierSettings, args: &DetectArgs) -> anyhow::Result<()> {
    println!("🔍 EventCatalog Notifier\n");

    settings.catalog = validate_root(&settings.catalog).map_err(NotifierError::from)?;
    let catalog_path = settings.catalog.clone();
    let config_path = settings.config_path();
    let config = NotifierConfig::load_and_validate(&config_path).map_err(NotifierError::from)?;
    debug!(
        "Loaded {} subscriber(s) from {}",
        config.owners.len(),
        config_path.display()
    );

    let range = CommitRange::parse(&settings.commit_range).map_err(NotifierError::from)?;
    let repo = GitRepository::discover(&catalog_path).map_err(NotifierError::from)?;

    println!("📂 Catalog: {}", catalog_path.display());
    println!("🔀 Commit range: {}\n", range);

    let changed: Vec<PathBuf> = repo
        .changed_files(&range)
        .map_err(NotifierError::from)?
        .into_iter()
        .filter(|p| p.starts_with(&catalog_path))
        .collect();
    if changed.is_empty() {
        println!("✅ No catalog files changed in {}. Nothing to process.", range);
        return Ok(());
    }
    info!("{} catalog file(s) changed", changed.len());

    let catalog = FsCatalog::open(&catalog_path).map_err(NotifierError::from)?;
    let ctx = DetectContext::new(&catalog, &repo, &catalog_path, &changed, &range)
        .with_environment(settings.environment.clone());

    let notifications = aggregate(&Detector::ALL, &ctx)?;
    let detected = notifications.len();
    let notifications = filter_notifications(&config, notifications);
    println!(
        "📬 {} change(s) detected, {} matched a subscriber",
        detected,
        notifications.len()
    );
    if notifications.is_empty() {
        println!("\n✅ Nothing to notify");
        return Ok(());
    }

    let transport = HttpTransport::new(&settings.http).map_err(NotifierError::from)?;
    let options = DispatchOptions {
        preview: args.dry_run,
        stage: settings.lifecycle,
        action_url: args.action_url.clone(),
    };
    let report = dispatch(&config, &notifications, &options, &transport).await?;

    print_report(&report)?;
    Ok(())
}

fn print_report(report: &DispatchReport) -> anyhow::Result<()> {
    for delivery in &report.deliveries {
        let request = &delivery.request;
        match delivery.mode {
            DeliveryMode::Previewed => {
                println!(
                    "\n[DRY RUN] Would send {} to {} ({})",
                    delivery.kind, request.endpoint, delivery.subscriber
                );
                let body: serde_json::Value = serde_json::from_str(&request.body)
                    .context("Rendered payload is not valid JSON")?;
                println!("{}", serde_json::to_string_pretty(&body)?);
                if !request.headers.is_empty() {
                    let headers = serde_json::to_string_pretty(&request.headers)?;
                    println!("[DRY RUN] Headers: {}", headers);
                }
            }
            DeliveryMode::Sent => {
                println!(
                    "✓ Sent {} to {} ({})",
                    delivery.kind, request.endpoint, delivery.subscriber
                );
            }
        }
    }

    if report.previewed() > 0 {
        println!("\n📝 {} notification(s) previewed, none sent", report.previewed());
    } else {
        println!("\n✅ {} notification(s) sent", report.sent());
    }
    Ok(())
}

fn report_error(error: &anyhow::Error, verbose: bool) {
    match error.downcast_ref::<NotifierError>() {
        Some(e) => {
            eprintln!("❌ {}", e.title());
            eprintln!("   {}", e);
            let suggestions = e.suggestions();
            if !suggestions.is_empty() {
                eprintln!("\nSuggestions:");
                for suggestion in suggestions {
                    eprintln!("  • {}", suggestion);
                }
            }
        }
        None => eprintln!("❌ Error: {}", error),
    }

    if verbose {
        for cause in error.chain().skip(1) {
            eprintln!("   caused by: {}", cause);
        }
    }
}
