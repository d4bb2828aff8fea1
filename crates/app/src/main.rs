use std::io;
use std::sync::Arc;

use anyhow::Context;

use hooksink_events::InMemoryEventBus;
use hooksink_infra::store::BigQueryStoreFactory;
use hooksink_infra::workers::IngestionWorker;
use hooksink_infra::{HooksinkConfig, IngestionClient};

mod feed;

fn main() -> anyhow::Result<()> {
    let config = HooksinkConfig::from_env().context("loading HOOKSINK_* configuration")?;
    match config.log_level.as_deref() {
        Some(level) => hooksink_observability::init_with_default(level),
        None => hooksink_observability::init(),
    }

    let factory = BigQueryStoreFactory::new(config.bigquery_options())
        .context("building BigQuery HTTP client")?;
    let client = Arc::new(IngestionClient::new(factory, config.provisioner()));

    let bus = Arc::new(InMemoryEventBus::new());
    let worker = IngestionWorker::spawn(config.worker_config()?, bus.clone(), client);

    let fed = feed::publish_lines(io::stdin().lock(), bus.as_ref());
    bus.close();
    let stats = worker.join();

    tracing::info!(
        published = fed.published,
        skipped = fed.skipped,
        processed = stats.processed,
        succeeded = stats.succeeded,
        failed = stats.failed,
        rows_failed = stats.rows_failed,
        "input drained"
    );

    fed.read_error.map_or(Ok(()), |e| Err(e).context("reading stdin"))
}
