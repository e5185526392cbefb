//! Outbound side of Emojicon: the transport boundary, size-bounded batching,
//! the throttled delivery scheduler, and the telemetry sink contract.

pub mod batching;
pub mod delivery_scheduler;
pub mod telemetry;
pub mod transport;

pub use batching::split_into_batches;
pub use delivery_scheduler::{
    DeliveryConfig, DeliveryError, DeliveryMode, DeliveryReport, DeliveryScheduler,
};
pub use telemetry::{TelemetryRecord, TelemetrySink, TracingTelemetry};
pub use transport::{
    DestinationCapabilities, EmbedField, EmbedPayload, OutboundMessage, SplitMode, Transport,
    TransportError, TransportErrorKind, DEFAULT_MAX_PAYLOAD_CHARS,
};
