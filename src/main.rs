use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// OAuth verification gate: joins users to the guild and swaps their roles
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Path of the verified users file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Post the verification panel to the panel channel on startup
    #[arg(long)]
    post_panel: bool,

    /// Log at debug level
    #[arg(long, short = 'v')]
    verbose: bool,
}

mod config;
mod discord;
mod error;
mod logging;
mod state;
mod verification;
mod web;

use config::Config;
use discord::{DiscordApi, DiscordClient};
use state::{create_shared_verified_store, VerifiedStore};
use verification::Verifier;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Create log buffer for the admin panel
    let log_buffer = logging::create_log_buffer(1000);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = if args.verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(level)
        .with(logging::LogCaptureLayer::new(log_buffer.clone()))
        .init();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    config.post_panel |= args.post_panel;

    if let Some(bot_id) = config.bot_id_hint() {
        info!("Bot ID: {} (manage at https://discord.com/developers/applications/{}/bot)", bot_id, bot_id);
    }
    match config.log_channel {
        Some(channel) => info!("Verification notices go to channel {}", channel),
        None => info!("LOG_CHANNEL not set, verification notices are disabled"),
    }
    if config.require_provisioning {
        info!("Strict provisioning: users are only recorded once guild join and role swap succeed");
    }

    info!("Loading verified users from {}...", config.database_path.display());
    let store = VerifiedStore::load(&config.database_path)
        .await
        .context("Could not load verified users")?;
    info!("{} verified users on record", store.count().await);
    let store = create_shared_verified_store(store);

    let config = Arc::new(config);
    let discord: Arc<dyn DiscordApi> = Arc::new(DiscordClient::new(&config));
    let verifier = Arc::new(Verifier::new(config.clone(), discord, store.clone()));

    if config.post_panel {
        match verifier.post_panel().await {
            Ok(true) => {}
            Ok(false) => warn!("Panel requested but neither PANEL_CHANNEL nor LOG_CHANNEL is set"),
            Err(e) => error!("Failed to post verification panel: {}", e),
        }
    }

    let state = web::AppState {
        config,
        store,
        verifier,
        session_store: web::create_session_store(),
        log_buffer,
    };

    web::start_web_server(state).await
}
