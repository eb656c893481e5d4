//! Metrics for the quake feed
//!
//! Every metric name lives in [`MetricName`]; the phase modules below are
//! the only places that record them.

use std::fmt;
use std::net::SocketAddr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source metrics
    SourceFetchSuccess,
    SourceFetchError,
    SourceFetchDuration,
    SourcePayloadBytes,

    // Extraction and validation
    ExtractRowsSeen,
    ExtractRowsMalformed,
    ValidateRowsRejected,
    DedupeDuplicatesCollapsed,

    // Store metrics
    StoreEventsInserted,
    StoreEventsUpdated,
    StoreEventsDeleted,
    StoreErrors,

    // Cycle metrics
    CycleRuns,
    CycleDuration,

    // Read path
    FeedReads,
    FeedRefreshes,
    FeedRefreshSkipped,
    FeedStaleServes,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceFetchSuccess => "quake_source_fetch_success_total",
            MetricName::SourceFetchError => "quake_source_fetch_error_total",
            MetricName::SourceFetchDuration => "quake_source_fetch_duration_seconds",
            MetricName::SourcePayloadBytes => "quake_source_payload_bytes",

            MetricName::ExtractRowsSeen => "quake_extract_rows_seen_total",
            MetricName::ExtractRowsMalformed => "quake_extract_rows_malformed_total",
            MetricName::ValidateRowsRejected => "quake_validate_rows_rejected_total",
            MetricName::DedupeDuplicatesCollapsed => "quake_dedupe_duplicates_collapsed_total",

            MetricName::StoreEventsInserted => "quake_store_events_inserted_total",
            MetricName::StoreEventsUpdated => "quake_store_events_updated_total",
            MetricName::StoreEventsDeleted => "quake_store_events_deleted_total",
            MetricName::StoreErrors => "quake_store_errors_total",

            MetricName::CycleRuns => "quake_cycle_runs_total",
            MetricName::CycleDuration => "quake_cycle_duration_seconds",

            MetricName::FeedReads => "quake_feed_reads_total",
            MetricName::FeedRefreshes => "quake_feed_refreshes_total",
            MetricName::FeedRefreshSkipped => "quake_feed_refresh_skipped_total",
            MetricName::FeedStaleServes => "quake_feed_stale_serves_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs the Prometheus recorder. With an address, also serves `/metrics` there.
pub fn init(listen: Option<SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    match listen {
        Some(addr) => {
            builder = builder.with_http_listener(addr);
            builder
                .install()
                .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))?;
            info!("Metrics exporter listening on http://{}/metrics", addr);
        }
        None => {
            builder
                .install_recorder()
                .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
            info!("Metrics recorder installed (no exporter)");
        }
    }
    Ok(())
}

pub mod source {
    use super::MetricName;

    pub fn fetch_success() {
        ::metrics::counter!(MetricName::SourceFetchSuccess.as_str()).increment(1);
    }

    pub fn fetch_error(kind: &'static str) {
        ::metrics::counter!(MetricName::SourceFetchError.as_str(), "kind" => kind).increment(1);
    }

    pub fn fetch_duration(secs: f64) {
        ::metrics::histogram!(MetricName::SourceFetchDuration.as_str()).record(secs);
    }

    pub fn payload_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::SourcePayloadBytes.as_str()).record(bytes as f64);
    }
}

pub mod extract {
    use super::MetricName;

    pub fn rows_seen(count: usize) {
        ::metrics::counter!(MetricName::ExtractRowsSeen.as_str()).increment(count as u64);
    }

    pub fn rows_malformed(count: usize) {
        ::metrics::counter!(MetricName::ExtractRowsMalformed.as_str()).increment(count as u64);
    }

    pub fn row_rejected(reason: &'static str) {
        ::metrics::counter!(MetricName::ValidateRowsRejected.as_str(), "reason" => reason)
            .increment(1);
    }

    pub fn duplicates_collapsed(count: usize) {
        ::metrics::counter!(MetricName::DedupeDuplicatesCollapsed.as_str()).increment(count as u64);
    }
}

pub mod store {
    use super::MetricName;

    pub fn upserted(inserted: usize, updated: usize) {
        ::metrics::counter!(MetricName::StoreEventsInserted.as_str()).increment(inserted as u64);
        ::metrics::counter!(MetricName::StoreEventsUpdated.as_str()).increment(updated as u64);
    }

    pub fn deleted(count: usize) {
        ::metrics::counter!(MetricName::StoreEventsDeleted.as_str()).increment(count as u64);
    }

    pub fn error(operation: &'static str) {
        ::metrics::counter!(MetricName::StoreErrors.as_str(), "operation" => operation).increment(1);
    }
}

pub mod cycle {
    use super::MetricName;

    pub fn finished(outcome: &'static str, secs: f64) {
        ::metrics::counter!(MetricName::CycleRuns.as_str(), "outcome" => outcome).increment(1);
        ::metrics::histogram!(MetricName::CycleDuration.as_str()).record(secs);
    }
}

pub mod feed {
    use super::MetricName;

    pub fn read() {
        ::metrics::counter!(MetricName::FeedReads.as_str()).increment(1);
    }

    pub fn refresh(outcome: &'static str) {
        ::metrics::counter!(MetricName::FeedRefreshes.as_str(), "outcome" => outcome).increment(1);
    }

    pub fn refresh_skipped(reason: &'static str) {
        ::metrics::counter!(MetricName::FeedRefreshSkipped.as_str(), "reason" => reason)
            .increment(1);
    }

    pub fn stale_serve() {
        ::metrics::counter!(MetricName::FeedStaleServes.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_prometheus_conventions() {
        let all = [
            MetricName::SourceFetchSuccess,
            MetricName::SourceFetchDuration,
            MetricName::StoreEventsDeleted,
            MetricName::CycleRuns,
            MetricName::FeedStaleServes,
        ];
        for name in all {
            let s = name.as_str();
            assert!(s.starts_with("quake_"));
            assert!(s.ends_with("_total") || s.ends_with("_seconds") || s.ends_with("_bytes"));
        }
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        source::fetch_success();
        extract::row_rejected("timestamp");
        cycle::finished("ok", 0.01);
        feed::refresh_skipped("fresh");
    }
}
