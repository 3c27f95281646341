//! egress-intents: traffic intent recorder
//!
//! Reads batches of observed intents from stdin, one JSON document per line,
//! and records the external relationships they describe.
//!
//! ## Input
//! Each line is either a JSON array of intents or a single intent:
//! ```json
//! [{"client": {"name": "pay-svc", "namespace": "default", "kind": "Deployment"},
//!   "dns_name": "api.stripe.com", "ips": ["52.1.2.3"],
//!   "observed_at": "2026-10-18T12:00:00Z"}]
//! ```
//!
//! ## Configuration
//! - `config.yaml`, a path given as the first argument, or EGRESS_INTENTS_CONFIG
//! - EGRESS_INTENTS__* environment overrides
//! - EGRESS_INTENTS_LOG: tracing filter (default: info)

use chrono::Utc;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use egress_intents::config::Config;
use egress_intents::utils::bootstrap::{build_deduplicator, init_tracing};
use egress_intents::ExternalTrafficIntent;

#[derive(Deserialize)]
#[serde(untagged)]
enum IntentBatch {
    Many(Vec<ExternalTrafficIntent>),
    One(ExternalTrafficIntent),
}

impl IntentBatch {
    fn into_vec(self) -> Vec<ExternalTrafficIntent> {
        match self {
            Self::Many(intents) => intents,
            Self::One(intent) => vec![intent],
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;
    info!(
        cluster = %config.cluster,
        backend = %config.database.backend,
        target = %config.database.redacted_target(),
        "egress-intents starting"
    );

    let dedup = build_deduplicator(&config).await?;

    if let Err(e) = dedup.cleanup_expired(Utc::now()).await {
        warn!(error = %e, "Startup retention cleanup failed");
    }
    if config.dedup.warm_cache_on_start {
        dedup.warm_cache(Utc::now()).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number: u64 = 0;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };
        let Some(line) = line else {
            info!("Input closed");
            break;
        };
        line_number += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let batch = match serde_json::from_str::<IntentBatch>(trimmed) {
            Ok(batch) => batch.into_vec(),
            Err(e) => {
                error!(line = line_number, error = %e, "Invalid intent batch, skipping");
                continue;
            }
        };

        let summary = dedup.process_batch(&batch, Utc::now()).await;
        info!(
            line = line_number,
            received = summary.received,
            new = summary.new_intents.len(),
            known = summary.known,
            skipped = summary.skipped,
            failed = summary.failed,
            "Batch recorded"
        );
    }

    info!("egress-intents stopped");
    Ok(())
}
