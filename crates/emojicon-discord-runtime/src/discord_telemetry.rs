//! Telemetry sink that mirrors audit records into a Discord log channel.

use std::sync::Arc;

use emojicon_delivery::{TelemetryRecord, TelemetrySink, TracingTelemetry};
use serenity::all::{ChannelId, CreateAttachment, CreateMessage, Http};

#[derive(Clone)]
pub struct DiscordTelemetry {
    http: Arc<Http>,
    channel: Option<ChannelId>,
}

impl DiscordTelemetry {
    pub fn new(http: Arc<Http>, log_channel_id: Option<u64>) -> Self {
        Self {
            http,
            channel: log_channel_id.map(ChannelId::new),
        }
    }
}

impl TelemetrySink for DiscordTelemetry {
    fn record(&self, record: TelemetryRecord) {
        TracingTelemetry.record(record.clone());
        let Some(channel) = self.channel else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime; telemetry not posted");
            return;
        };
        let http = Arc::clone(&self.http);
        runtime.spawn(async move {
            post_record(http, channel, record).await;
        });
    }
}

async fn post_record(http: Arc<Http>, channel: ChannelId, record: TelemetryRecord) {
    let mut builder = CreateMessage::new().content(format_log_line(&record.message));
    if let Some(url) = record.attachment_url.as_deref() {
        match CreateAttachment::url(&http, url).await {
            Ok(attachment) => builder = builder.add_file(attachment),
            Err(error) => {
                tracing::debug!(%error, url, "telemetry attachment unavailable; linking instead");
                builder = CreateMessage::new()
                    .content(format!("{}\n{url}", format_log_line(&record.message)));
            }
        }
    }
    if let Err(error) = channel.send_message(http.as_ref(), builder).await {
        tracing::warn!(%error, %channel, "failed to post telemetry record");
    }
}

/// Posted as inline code. Messages may contain "` `" to split into several spans.
pub(crate) fn format_log_line(message: &str) -> String {
    format!("`{message}`")
}
