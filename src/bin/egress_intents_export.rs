//! egress-intents-export: dump recorded relationships
//!
//! Applies retention cleanup, then prints every stored relationship as a
//! JSON array on stdout, most recently seen first. Uses the same
//! configuration sources as `egress-intents`.

use chrono::Utc;
use tracing::info;

use egress_intents::config::Config;
use egress_intents::dedup::IntentDeduplicator;
use egress_intents::storage::init_storage;
use egress_intents::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    let store = init_storage(&config.database).await?;
    let dedup = IntentDeduplicator::new(store, &config.dedup);

    let records = dedup.list_all(Utc::now()).await?;
    info!(count = records.len(), "Exporting intents");
    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}
