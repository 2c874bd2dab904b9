use std::sync::Arc;

use tokio::io::BufReader;
use tracing::info;

use lessonbook::clock::SystemClock;
use lessonbook::config::Config;
use lessonbook::engine::{Engine, InMemoryStore};
use lessonbook::host;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    lessonbook::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let journal = config.journal_path();
    let store = Arc::new(InMemoryStore::open(&journal)?);

    let records = store.journal_records().await;
    if records >= config.compact_threshold {
        info!("journal holds {records} records, compacting");
        store.compact().await?;
    }

    info!("lessonbook ready");
    info!("  journal: {}", journal.display());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let engine = Engine::new(store, Arc::new(SystemClock));
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = host::run(&engine, stdin, stdout) => {
            result?;
            info!("input closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!("lessonbook stopped");
    Ok(())
}
