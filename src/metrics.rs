use anyhow::Result;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Metrics collection and management
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    // Database metrics
    pub db_operations_total: &'static str,
    pub db_operation_duration: &'static str,
    pub db_connection_pool_size: &'static str,

    // Messaging metrics
    pub messages_sent_total: &'static str,
    pub messages_deleted_total: &'static str,
    pub messages_read_total: &'static str,
    pub conversations_created_total: &'static str,
    pub searches_total: &'static str,
    pub search_results: &'static str,

    // Notification metrics
    pub notifications_total: &'static str,

    // Error metrics
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            db_operations_total: "thrift_messaging_db_operations_total",
            db_operation_duration: "thrift_messaging_db_operation_duration_seconds",
            db_connection_pool_size: "thrift_messaging_db_connection_pool_size",

            messages_sent_total: "thrift_messaging_messages_sent_total",
            messages_deleted_total: "thrift_messaging_messages_deleted_total",
            messages_read_total: "thrift_messaging_messages_read_total",
            conversations_created_total: "thrift_messaging_conversations_created_total",
            searches_total: "thrift_messaging_searches_total",
            search_results: "thrift_messaging_search_results",

            notifications_total: "thrift_messaging_notifications_total",

            errors_total: "thrift_messaging_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Install the no-op recorder. An exporter can be installed instead by the
    /// host process.
    pub fn init() -> Result<()> {
        metrics::set_global_recorder(metrics::NoopRecorder).map_err(|_| {
            anyhow::anyhow!("Failed to initialize metrics recorder: already installed")
        })?;

        Ok(())
    }

    /// Record database operation metrics
    pub fn record_db_operation(&self, operation: &str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(
            self.db_operations_total,
            "operation" => operation.to_string(),
            "status" => status
        )
        .increment(1);
        histogram!(self.db_operation_duration, "operation" => operation.to_string())
            .record(duration.as_secs_f64());

        if !success {
            counter!(self.errors_total, "type" => "database").increment(1);
        }
    }

    /// Record a delivered message, labelled by message type
    pub fn record_message_sent(&self, message_type: &str) {
        counter!(self.messages_sent_total, "type" => message_type.to_string()).increment(1);
    }

    pub fn record_message_deleted(&self) {
        counter!(self.messages_deleted_total).increment(1);
    }

    /// Record read-marking, `count` being the number of rows flipped
    pub fn record_messages_read(&self, count: usize) {
        counter!(self.messages_read_total).increment(count as u64);
    }

    pub fn record_conversation_created(&self) {
        counter!(self.conversations_created_total).increment(1);
    }

    /// Record a search and the size of its result set
    pub fn record_search(&self, result_count: usize, short_circuited: bool) {
        let outcome = if short_circuited { "short_circuit" } else { "query" };
        counter!(self.searches_total, "outcome" => outcome).increment(1);
        histogram!(self.search_results).record(result_count as f64);
    }

    /// Record a notification outcome for a channel ("delivered", "suppressed", "failed")
    pub fn record_notification(&self, channel: &str, outcome: &str) {
        counter!(
            self.notifications_total,
            "channel" => channel.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }

    /// Record error metrics
    pub fn record_error(&self, error_type: &str, operation: &str) {
        counter!(
            self.errors_total,
            "type" => error_type.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    /// Update connection pool size
    pub fn update_connection_pool_size(&self, size: u32) {
        gauge!(self.db_connection_pool_size).set(f64::from(size));
    }
}

/// Performance timing wrapper for metrics
pub struct MetricsTimer {
    collector: MetricsCollector,
    operation: String,
    start: std::time::Instant,
}

impl MetricsTimer {
    pub fn new(collector: MetricsCollector, operation: &str) -> Self {
        Self {
            collector,
            operation: operation.to_string(),
            start: std::time::Instant::now(),
        }
    }

    pub fn finish(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        self.collector.record_db_operation(&self.operation, duration, success);
        duration
    }
}
