//! Chat transport boundary consumed by delivery and the request handler.

use std::fmt;

use async_trait::async_trait;
use emojicon_core::Destination;
use serde::Deserialize;
use thiserror::Error;

/// Largest message body the chat platform accepts, in characters.
pub const DEFAULT_MAX_PAYLOAD_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Rich notice body. Also the on-disk shape of the help payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct EmbedPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<u32>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default)]
    pub footer: Option<String>,
}

impl EmbedPayload {
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Embed(EmbedPayload),
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }
}

/// Whether the transport may split an oversized text body itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Send as-is in one platform call.
    Single,
    /// Split on line boundaries into bodies of at most `max_chars`, sent in
    /// order.
    OnLines { max_chars: usize },
}

/// What the bot may do in a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationCapabilities {
    pub can_send: bool,
    pub can_use_external_glyphs: bool,
}

impl DestinationCapabilities {
    pub const UNRESTRICTED: Self = Self {
        can_send: true,
        can_use_external_glyphs: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The platform refused delivery to this destination, e.g. the recipient
    /// does not accept private messages.
    PermissionDenied,
    RateLimited,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::RateLimited => "rate_limited",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error ({kind}): {detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn other(detail: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, detail)
    }
}

/// Rate-limited chat platform the bot talks through.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        destination: Destination,
        message: OutboundMessage,
        split: SplitMode,
    ) -> Result<(), TransportError>;

    /// Probes the bot's permissions in a shared channel.
    async fn capabilities(
        &self,
        destination: Destination,
    ) -> Result<DestinationCapabilities, TransportError>;
}
