//! bt-gateway: Breaders Twilio Bot main binary
//!
//! Usage:
//!   bt-gateway           - Start the webhook and admin server
//!   bt-gateway dev       - Start the server behind an ngrok tunnel
//!   bt-gateway --stop    - Stop ngrok and remove the tunnel files
//!   bt-gateway --check   - Report missing tools and credentials
//!   bt-gateway --help    - Show help

mod dev;

use std::sync::Arc;

use bt_core::{Config, Store, TwilioConfig};
use bt_whatsapp::webhook::public_url;
use bt_whatsapp::{PublicUrl, WhatsAppBot};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Webhook + admin API server
    Serve,
    /// Server behind an ngrok tunnel with Twilio webhook wiring
    Dev,
    /// Stop the dev tunnel
    Stop,
    /// Environment diagnostics
    Check,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("bt-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Load .env file before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    if matches!(mode, RunMode::Stop) {
        return dev::stop().await;
    }

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    match mode {
        RunMode::Serve => run_server(config).await,
        RunMode::Dev => dev::run(config).await,
        RunMode::Check => {
            dev::check(&config);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "serve" => return RunMode::Serve,
            "dev" | "--dev" => return RunMode::Dev,
            "--stop" => return RunMode::Stop,
            "--check" => return RunMode::Check,
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Serve
}

/// Print help message
fn print_help() {
    println!("bt-gateway - Breaders Twilio WhatsApp bot");
    println!();
    println!("Usage:");
    println!("  bt-gateway           Start the webhook and admin server");
    println!("  bt-gateway dev       Start the server behind an ngrok tunnel");
    println!("  bt-gateway --stop    Stop ngrok and remove the tunnel files");
    println!("  bt-gateway --check   Report missing tools and credentials");
    println!("  bt-gateway --help    Show this help message");
    println!("  bt-gateway --version Show version");
    println!();
    println!("Environment Variables:");
    println!("  TWILIO_ACCOUNT_SID            Twilio account SID");
    println!("  TWILIO_AUTH_TOKEN             Twilio auth token");
    println!("  TWILIO_WHATSAPP_NUMBER        Sender number (whatsapp:+...)");
    println!("  TWILIO_ASSISTANT_ID           Twilio AI Assistant id (optional)");
    println!("  TWILIO_ASSISTANT_WEBHOOK_URL  Assistant callback URL (optional)");
    println!("  TWILIO_VALIDATE_SIGNATURE     Verify X-Twilio-Signature (default: false)");
    println!("  SECRET_KEY                    Bearer key for the admin API");
    println!("  PORT                          Server port (default: 8000)");
    println!("  DB_PATH                       SQLite file (default: data/breaders.db)");
    println!("  PUBLIC_URL                    Public base URL used for signatures");
    println!("  BOT_INTENT_THRESHOLD          Chatbot confidence threshold (default: 0.65)");
    println!("  NGROK_BIN                     ngrok executable (default: ngrok)");
    println!("  NGROK_API_URL                 ngrok local API (default: http://localhost:4040/api/tunnels)");
    println!("  BREADERS_CONFIG               Path to a breaders.toml file");
}

/// Run server mode
async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting bt-gateway...");

    let store = Store::open(&config.database.path)
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
    let bot = WhatsAppBot::from_config(&config, Arc::new(store));

    let port = config.server.port;
    let handle = spawn_server(bot, &config, port, public_url(config.server.public_url.clone()));
    tracing::info!("Webhook server started on port {}", port);
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    handle.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Serve the bot on `port` in a background task
fn spawn_server(bot: WhatsAppBot, config: &Config, port: u16, public_url: PublicUrl) -> JoinHandle<()> {
    let secret_key = config.server.secret_key.clone();
    if secret_key.is_none() {
        tracing::warn!("SECRET_KEY not set, the admin API is unauthenticated");
    }
    let signature_token = signature_token(&config.twilio);

    tokio::spawn(async move {
        if let Err(e) = bot.start(port, secret_key, signature_token, public_url).await {
            tracing::error!("Webhook server error: {}", e);
        }
    })
}

/// Key for webhook signature checks, when validation is enabled
fn signature_token(twilio: &TwilioConfig) -> Option<String> {
    if !twilio.validate_signature {
        return None;
    }
    if twilio.auth_token.is_empty() {
        tracing::warn!("Signature validation requested without TWILIO_AUTH_TOKEN, skipping it");
        return None;
    }
    Some(twilio.auth_token.clone())
}
