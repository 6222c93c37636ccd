pub mod fact_samples;
pub mod utils;

use common::config::Settings;
use common::{Error, Result};
use cycle_analyzer::storage;
use fact_samples::FactSamplesEtl;
use tracing::info;

/// Rebuilds the fact table from every source table in the configured store.
pub async fn run_etl_pipeline(config_path: &str) -> Result<()> {
    let settings = Settings::new(config_path)?;
    let store = storage::from_settings(&settings.storage)?;

    let mut etl = FactSamplesEtl::with_settings(store, None, &settings);
    if !etl.run().await {
        return Err(Error::Other("Fact samples ETL produced no output".into()));
    }

    info!(table = %settings.output.fact_table, "ETL pipeline completed");
    Ok(())
}
