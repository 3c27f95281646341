//! Bootstrap utilities for egress-intents binaries.
//!
//! Shared initialization code for the recorder and the export tool.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, LOG_ENV_VAR};
use crate::dedup::IntentDeduplicator;
use crate::dispatch::GithubDispatcher;
use crate::storage::init_storage;

/// Initialize tracing with the EGRESS_INTENTS_LOG environment variable.
///
/// Defaults to "info" level if EGRESS_INTENTS_LOG is not set. Logs go to
/// stderr; stdout carries data.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Connect storage and assemble the deduplicator described by `config`.
///
/// Attaches the GitHub dispatcher only when dispatch is enabled.
pub async fn build_deduplicator(
    config: &Config,
) -> Result<IntentDeduplicator, Box<dyn std::error::Error>> {
    let store = init_storage(&config.database).await?;
    let mut dedup = IntentDeduplicator::new(store, &config.dedup);

    if config.dispatch.enabled {
        let dispatcher = GithubDispatcher::new(&config.dispatch, &config.cluster)?;
        info!(
            endpoint = %dispatcher.endpoint(),
            cluster = %config.cluster,
            "Dispatch enabled"
        );
        dedup = dedup.with_dispatcher(Arc::new(dispatcher));
    } else {
        warn!("Dispatch disabled; new intents will be recorded but not reported");
    }

    Ok(dedup)
}
