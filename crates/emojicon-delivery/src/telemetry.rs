//! Fire-and-forget audit records.

/// One audit line, optionally pointing at the image it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub message: String,
    pub attachment_url: Option<String>,
}

impl TelemetryRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attachment_url: None,
        }
    }

    pub fn with_attachment(mut self, url: impl Into<String>) -> Self {
        self.attachment_url = Some(url.into());
        self
    }
}

/// Audit sink. `record` must return promptly and must never fail the caller;
/// implementations that do I/O hand the record off to a background task.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: TelemetryRecord);
}

/// Sink that only writes to the process log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, record: TelemetryRecord) {
        tracing::info!(
            target: "emojicon::telemetry",
            attachment = record.attachment_url.as_deref().unwrap_or(""),
            "{}",
            record.message
        );
    }
}
