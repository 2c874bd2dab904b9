use std::net::SocketAddr;

use crate::engine::EngineError;

/// Counter: lesson and request admissions. Labels: kind, outcome.
pub const ADMISSIONS_TOTAL: &str = "lessonbook_admissions_total";

/// Counter: request approvals and rejections. Labels: decision, outcome.
pub const REQUEST_DECISIONS_TOTAL: &str = "lessonbook_request_decisions_total";

/// Histogram: availability query latency in seconds. Labels: query.
pub const QUERY_DURATION_SECONDS: &str = "lessonbook_query_duration_seconds";

/// Counter: host commands executed. Labels: command, outcome.
pub const COMMANDS_TOTAL: &str = "lessonbook_commands_total";

/// Gauge: records in the journal.
pub const JOURNAL_RECORDS: &str = "lessonbook_journal_records";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// `"ok"`, or the error's kind.
pub fn outcome<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
