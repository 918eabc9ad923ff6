//! Tank Royale Bot - turn-based client for the tank battle arena
//!
//! The game server runs this binary as a child process and talks to it over
//! stdin/stdout, one JSON message per line:
//! - a handshake with our tank id and the enemy's
//! - init snapshots of the arena until `END_INIT`
//! - one world update per turn until `END`
//!
//! Each turn the bot answers with movement and shoot actions. Logs go to stderr.

mod comms;
mod config;
mod error;
mod game;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::comms::LineTransport;
use crate::config::{Config, LogFormat};
use crate::game::run_session;

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    let rng = match config.seed {
        Some(seed) => {
            info!(seed, "Using fixed RNG seed");
            ChaCha8Rng::seed_from_u64(seed)
        }
        None => ChaCha8Rng::from_entropy(),
    };

    info!("Starting Tank Royale Bot");

    let mut transport = LineTransport::stdio();
    run_session(&mut transport, config.tuning, rng)?;

    info!("Bot shutdown complete");
    Ok(())
}

/// Initialize tracing/logging on stderr, stdout belongs to the game server
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
