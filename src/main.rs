use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mimir_syncer::command::redact_credentials;
use mimir_syncer::config::LoggingConfig;
use mimir_syncer::{create_provider, Config, Daemon, HealthCheck, SyncEngine, SyncResult};

#[derive(Parser)]
#[command(name = "mimir-syncer")]
#[command(about = "Mirror an organization's git repositories for code search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mirroring loop forever (default)
    Run,

    /// Run a single sync pass
    Sync {
        /// Log intended actions without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// List repositories the provider would mirror
    List,

    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config)?;

    init_logging(&config.logging, cli.verbose);
    info!("Starting mimir-syncer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(config).await,
        Commands::Sync { dry_run } => cmd_sync(config, dry_run).await,
        Commands::List => cmd_list(config).await,
        Commands::Doctor => cmd_doctor(&config),
    }
}

/// Initialize logging: RUST_LOG wins, then --verbose, then the configured level
fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "full" {
        registry.with(fmt::layer().with_ansi(logging.color)).init();
    } else {
        registry
            .with(fmt::layer().compact().with_ansi(logging.color))
            .init();
    }
}

/// Load configuration from file, then apply environment overrides
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::load(&path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env();
    config.expand_paths()?;
    Ok(config)
}

/// Validate configuration and enter the scheduling loop
async fn cmd_run(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let provider = create_provider(&config)?;

    info!(
        "Mirroring org: {} using provider: {}",
        config.provider.org, config.provider.kind
    );

    let mut daemon = Daemon::new(config, provider)?;
    daemon.run().await
}

/// Run exactly one pass and print a summary
async fn cmd_sync(mut config: Config, dry_run: bool) -> Result<()> {
    config.sync.dry_run |= dry_run;
    config.validate().context("Invalid configuration")?;
    let provider = create_provider(&config)?;
    let engine = SyncEngine::new(config)?;

    let summary = engine.sync_all(provider.as_ref()).await?;

    println!("Sync complete");
    println!("   Total repositories: {}", summary.total_repositories);
    println!("   Synced: {} ({} cloned, {} updated)", summary.synced, summary.cloned, summary.updated);
    println!("   Failed: {}", summary.failed);
    println!("   Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("   Reindex: {:?}", summary.reindex);

    if summary.failed > 0 {
        println!("\nFailed repositories:");
        for result in &summary.results {
            if let SyncResult::Failed { name, error } = result {
                println!("   {}: {}", name, redact_credentials(error));
            }
        }
    }

    Ok(())
}

/// List repositories that would be mirrored
async fn cmd_list(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let provider = create_provider(&config)?;

    let mut repos = provider.get_repos();
    let mut count = 0;
    while let Some(repo) = repos.next().await {
        count += 1;
        println!("  {}  {}", repo.name, redact_credentials(&repo.clone_url));
    }
    println!("Repositories ({})", count);

    Ok(())
}

/// System health check and diagnostics
fn cmd_doctor(config: &Config) -> Result<()> {
    let health = HealthCheck::run(config);
    print_health_report(&health);
    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    use mimir_syncer::health::CheckResult;

    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 Mimir Syncer System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    let warnings = health.warnings();
    if health.all_passed() {
        println!("✅ All checks passed ({} warning(s))", warnings.len());
    } else {
        println!("❌ Failed checks: {}", health.errors().join(", "));
    }
    if !warnings.is_empty() {
        println!("⚠️  Warnings: {}", warnings.join(", "));
    }
}
