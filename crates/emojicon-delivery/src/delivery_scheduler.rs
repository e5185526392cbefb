//! Sequential, throttle-aware delivery of rendered text.
//!
//! Small outputs go out as one transport call that lets the transport split
//! on line boundaries. Larger outputs are sent batch by batch with a fixed
//! pause between consecutive sends. Sends never overlap, and the first
//! failing batch aborts the rest.

use std::sync::Arc;
use std::time::Duration;

use emojicon_core::Destination;
use thiserror::Error;

use crate::batching::split_into_batches;
use crate::transport::{
    OutboundMessage, SplitMode, Transport, TransportError, TransportErrorKind,
    DEFAULT_MAX_PAYLOAD_CHARS,
};

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub max_payload_chars: usize,
    /// Batch counts strictly below this use the single-call path.
    pub single_call_batch_threshold: usize,
    pub batch_delay: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_payload_chars: DEFAULT_MAX_PAYLOAD_CHARS,
            single_call_batch_threshold: 4,
            batch_delay: Duration::from_millis(1_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    SingleCall,
    Batched,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleCall => "single_call",
            Self::Batched => "batched",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub mode: DeliveryMode,
    pub batch_count: usize,
    pub transport_calls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery to {destination} refused at batch {batch_index}/{batch_count}: {detail}")]
    PermissionDenied {
        destination: Destination,
        batch_index: usize,
        batch_count: usize,
        detail: String,
    },
    #[error("delivery to {destination} failed at batch {batch_index}/{batch_count} ({kind}): {detail}")]
    Transport {
        destination: Destination,
        kind: TransportErrorKind,
        batch_index: usize,
        batch_count: usize,
        detail: String,
    },
}

impl DeliveryError {
    fn from_transport(
        error: TransportError,
        destination: Destination,
        batch_index: usize,
        batch_count: usize,
    ) -> Self {
        match error.kind {
            TransportErrorKind::PermissionDenied => Self::PermissionDenied {
                destination,
                batch_index,
                batch_count,
                detail: error.detail,
            },
            kind => Self::Transport {
                destination,
                kind,
                batch_index,
                batch_count,
                detail: error.detail,
            },
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

#[derive(Clone)]
pub struct DeliveryScheduler {
    transport: Arc<dyn Transport>,
    config: DeliveryConfig,
}

impl DeliveryScheduler {
    pub fn new(transport: Arc<dyn Transport>, config: DeliveryConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Delivers `text` to `destination` completely, or reports the batch that
    /// failed.
    #[tracing::instrument(level = "debug", skip(self, text), fields(chars = text.chars().count()))]
    pub async fn deliver(
        &self,
        destination: Destination,
        text: &str,
    ) -> Result<DeliveryReport, DeliveryError> {
        let max_chars = self.config.max_payload_chars.max(1);
        let batches = split_into_batches(text, max_chars);
        let batch_count = batches.len();
        if batch_count == 0 {
            return Ok(DeliveryReport {
                mode: DeliveryMode::SingleCall,
                batch_count: 0,
                transport_calls: 0,
            });
        }

        if batch_count < self.config.single_call_batch_threshold {
            self.transport
                .send(
                    destination,
                    OutboundMessage::text(text),
                    SplitMode::OnLines { max_chars },
                )
                .await
                .map_err(|error| {
                    DeliveryError::from_transport(error, destination, 1, batch_count)
                })?;
            tracing::debug!(%destination, batch_count, "delivered in a single call");
            return Ok(DeliveryReport {
                mode: DeliveryMode::SingleCall,
                batch_count,
                transport_calls: 1,
            });
        }

        for (index, batch) in batches.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.batch_delay).await;
            }
            self.transport
                .send(destination, OutboundMessage::Text(batch), SplitMode::Single)
                .await
                .map_err(|error| {
                    DeliveryError::from_transport(error, destination, index + 1, batch_count)
                })?;
        }
        tracing::debug!(%destination, batch_count, "delivered in batches");
        Ok(DeliveryReport {
            mode: DeliveryMode::Batched,
            batch_count,
            transport_calls: batch_count,
        })
    }
}
