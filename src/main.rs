use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use warden_bot::application::errors::BotError;
use warden_bot::application::messaging::EventDispatcher;
use warden_bot::application::registry::Registry;
use warden_bot::application::services::ModerationService;
use warden_bot::domain::entities::LockKind;
use warden_bot::domain::traits::{Platform, Snapshot, Store};
use warden_bot::infrastructure::adapters::console::ConsoleAdapter;
use warden_bot::infrastructure::config::{validate_credential, Config};
use warden_bot::infrastructure::storage::JsonStore;

#[derive(Parser)]
#[command(name = "warden-bot")]
#[command(about = "Keeps chat groups the way their admin locked them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Admin user id (overrides config and persisted state)
    #[arg(short, long)]
    admin: Option<String>,

    /// Command prefix, at most 3 characters (overrides config and persisted state)
    #[arg(short, long)]
    prefix: Option<String>,

    /// Data directory (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent
    Run,
    /// Show persisted locks, bans, mutes and rules
    Status,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run => load_config(&cli).and_then(run_bot),
        Commands::Status => load_config(&cli).and_then(show_status),
        Commands::Version => {
            println!("warden-bot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// File, then environment, then command line
fn load_config(cli: &Cli) -> Result<Config, BotError> {
    let mut config = if Path::new(&cli.config).exists() {
        let mut config = Config::load(&cli.config)?;
        config.apply_env();
        config
    } else {
        tracing::debug!("No config file at {}, using defaults", cli.config);
        Config::load_env()
    };

    if let Some(admin) = &cli.admin {
        config.bot.admin_id = Some(admin.clone());
    }
    if let Some(prefix) = &cli.prefix {
        config.bot.prefix = Some(prefix.clone());
    }
    if let Some(dir) = &cli.data_dir {
        config.storage.directory = dir.clone();
    }

    Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime, BotError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("Failed to start runtime: {}", e)))
}

fn run_bot(config: Config) -> Result<(), BotError> {
    runtime()?.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), BotError> {
    let store = Arc::new(JsonStore::new(&config.storage.directory));
    store.init().await?;
    let snapshot = store.load().await;

    let (bot_config, changed) = config.resolve_bot_config(snapshot.config.clone())?;

    if let Some(path) = &config.session.credential_file {
        let entries = validate_credential(path)?;
        tracing::info!("Session credential loaded ({} entries)", entries);
    }

    let platform: Arc<dyn Platform> = Arc::new(ConsoleAdapter::default());
    let service = Arc::new(ModerationService::new(
        bot_config.clone(),
        Registry::from_snapshot(&snapshot),
        platform.clone(),
        store.clone(),
    ));

    if changed {
        service.reconfigure(bot_config.clone()).await?;
    }

    tracing::info!(
        "Starting warden-bot with admin {} and prefix '{}'",
        bot_config.admin_id,
        bot_config.prefix
    );
    tracing::info!("Data directory: {}", store.base_path().display());

    let runtime = service.runtime().await;
    tracing::info!("Logged in as {} ({})", runtime.account.account_id, runtime.account.name);

    let events = platform.subscribe().await?;
    let mut dispatcher = EventDispatcher::new(service.clone());

    if config.enforcement.reassert_on_start {
        let actions = service.reassert_actions().await;
        if !actions.is_empty() {
            tracing::info!("Re-applying {} stored lock action(s)", actions.len());
            dispatcher.submit(actions).await;
        }
    }

    dispatcher.run(events, shutdown_signal()).await;

    service.flush().await?;
    tracing::info!("warden-bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn show_status(config: Config) -> Result<(), BotError> {
    let snapshot = runtime()?.block_on(async {
        let store = JsonStore::new(&config.storage.directory);
        store.load().await
    });
    print!("{}", status_report(&snapshot));
    Ok(())
}

fn status_report(snapshot: &Snapshot) -> String {
    let mut out = String::from("Current locks & status\n");

    match &snapshot.config {
        Some(config) => out.push_str(&format!("Admin: {}\nPrefix: {}\n", config.admin_id, config.prefix)),
        None => out.push_str("Admin: (not configured)\n"),
    }

    out.push_str("\nLocks:\n");
    if snapshot.locks.is_empty() {
        out.push_str("  none\n");
    }
    for (thread_id, locks) in &snapshot.locks {
        let active: Vec<String> = locks
            .active()
            .map(|kind| match kind {
                LockKind::Name => {
                    format!("name=\"{}\"", locks.name.as_deref().unwrap_or_default())
                }
                LockKind::Nickname => {
                    format!("nickname=\"{}\"", locks.nickname.as_deref().unwrap_or_default())
                }
                other => other.to_string(),
            })
            .collect();
        out.push_str(&format!("  {}: {}\n", thread_id, active.join(", ")));
    }

    let bans: Vec<&str> = snapshot.bans.iter().map(|u| u.as_str()).collect();
    let mutes: Vec<&str> = snapshot.mutes.iter().map(|t| t.as_str()).collect();
    out.push_str(&format!("\nBanned: {}\n", list_or_none(&bans)));
    out.push_str(&format!("Muted threads: {}\n", list_or_none(&mutes)));

    out.push_str("\nRules:\n");
    if snapshot.rules.is_empty() {
        out.push_str("  none\n");
    }
    for (thread_id, rules) in &snapshot.rules {
        out.push_str(&format!("  {}: {}\n", thread_id, rules.replace('\n', " / ")));
    }
    out
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn init_config() -> Result<(), BotError> {
    let mut config = Config::default();
    config.bot.prefix = Some("!".to_string());
    let yaml = serde_yaml::to_string(&config)
        .map_err(|e| BotError::Internal(format!("Failed to render config: {}", e)))?;
    println!("{}", yaml);
    println!("\nSet bot.admin-id, save this to config.yaml and adjust as needed.");
    Ok(())
}
