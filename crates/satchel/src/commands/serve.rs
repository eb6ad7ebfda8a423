//! Serve command - runs the demo server.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Args, ValueEnum};
use satchel_server::SessionManager;
use satchel_session::{MaxAgeSetting, MemoryStore, SessionEvent, SessionOptions};
use tokio::net::TcpListener;
use tracing::{debug, info};

use super::Context;
use crate::config::AppConfig;
use crate::routes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Keep the whole session in the cookie
    Cookie,
    /// Keep sessions in process memory
    Memory,
}

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Session storage (overrides config)
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Session lifetime in seconds (overrides config)
    #[arg(long)]
    pub max_age_secs: Option<u64>,

    /// Secret for signing cookies, at least 32 bytes
    #[arg(long, env = "SATCHEL_SECRET", hide_env_values = true)]
    pub secret: Option<String>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(store) = args.store {
        config.session.store = match store {
            StoreKind::Cookie => "cookie".to_string(),
            StoreKind::Memory => "memory".to_string(),
        };
    }
    if let Some(secs) = args.max_age_secs {
        if secs == 0 {
            bail!("--max-age-secs must be greater than zero");
        }
        config.session.max_age = MaxAgeSetting::Millis(secs.saturating_mul(1000));
    }

    let addr = config.bind_address()?;
    let options = build_options(&config)?;
    if ctx.verbose {
        debug!(options = ?options, "Session options");
    }

    let secret = args.secret.as_deref().map(str::as_bytes);
    let manager = SessionManager::new(options, secret)
        .context("failed to configure sessions (is SATCHEL_SECRET set?)")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(
        addr = %addr,
        store = %config.session.store,
        key = %manager.options().key,
        "Starting satchel demo server"
    );

    axum::serve(listener, routes::router(manager))
        .await
        .context("server error")?;
    Ok(())
}

fn build_options(config: &AppConfig) -> Result<SessionOptions> {
    let settings = &config.session;
    let options = if settings.store == "memory" {
        let store = MemoryStore::new(settings.memory_store_config());
        store.spawn_cleanup_task();
        SessionOptions::from_settings_with_store(settings, store)?
    } else {
        SessionOptions::from_settings(settings)?
    };

    Ok(options.with_event_listener(|event| match event {
        SessionEvent::Missed { key } => debug!(session_id = %key, "Unknown session identifier"),
        SessionEvent::Expired { key } => debug!(key = %key, "Session expired"),
        SessionEvent::Invalid { key } => info!(key = %key, "Rejected invalid session"),
    }))
}
