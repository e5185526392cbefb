//! User-facing notice text, help payload loading, and telemetry lines.

use std::path::Path;

use anyhow::{Context, Result};
use emojicon_delivery::{DeliveryError, EmbedPayload};
use emojicon_render::ImageServiceError;

use crate::render_policy::ValidationError;

const BUILTIN_HELP_JSON: &str = include_str!("../assets/help.json");

pub(crate) const REDIRECT_NOTICE: &str = "`📨 Big one! Sending it directly to you...`";
pub(crate) const UNSUPPORTED_FILETYPE_NOTICE: &str = "❌ This filetype is not supported";
pub(crate) const GENERIC_FAILURE_NOTICE: &str = "❌ Sorry, something went wrong";
pub(crate) const DIRECT_MESSAGES_BLOCKED_NOTICE: &str =
    "❌ Please, allow direct messages from server members";

/// Loads the help embed from `path`, or the built-in one when no path is set.
pub fn load_help_payload(path: Option<&Path>) -> Result<EmbedPayload> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read help payload {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse help payload {}", path.display()))
        }
        None => serde_json::from_str(BUILTIN_HELP_JSON).context("failed to parse built-in help"),
    }
}

pub(crate) fn cooldown_notice(remaining_ms: u64) -> String {
    format!(
        "`⏰ Cooldown! {} seconds remaining.`",
        remaining_ms.div_ceil(1_000)
    )
}

pub(crate) fn validation_notice(error: &ValidationError) -> String {
    match error {
        ValidationError::TooWide { max } => format!("`📐 Too large! (width ≤ {max})`"),
        ValidationError::TooTall { max } => format!("`📐 Too tall! (height ≤ {max})`"),
        ValidationError::TooTallAfterResize { .. } => "`📐 Too tall!`".to_string(),
    }
}

pub(crate) fn image_failure_notice(error: &ImageServiceError) -> EmbedPayload {
    if error.is_unsupported_format() {
        EmbedPayload::with_description(UNSUPPORTED_FILETYPE_NOTICE)
    } else {
        EmbedPayload::with_description(GENERIC_FAILURE_NOTICE)
    }
}

pub(crate) fn delivery_failure_notice(error: &DeliveryError) -> EmbedPayload {
    if error.is_permission_denied() {
        EmbedPayload::with_description(DIRECT_MESSAGES_BLOCKED_NOTICE)
    } else {
        EmbedPayload::with_description(GENERIC_FAILURE_NOTICE)
    }
}

pub(crate) fn generic_failure_notice() -> EmbedPayload {
    EmbedPayload::with_description(GENERIC_FAILURE_NOTICE)
}

pub(crate) fn helped_telemetry(requester_tag: &str) -> String {
    format!("📰 Helped {requester_tag}")
}

pub(crate) fn failure_telemetry(detail: &str) -> String {
    format!("❌ {detail}")
}

pub(crate) const RESUMED_TELEMETRY: &str = "🔌 Resumed";
pub(crate) const DISCONNECTED_TELEMETRY: &str = "🔌 Disconnected";
pub(crate) const RATE_LIMITED_TELEMETRY: &str = "🐌 Rate-limited";

pub(crate) fn connected_telemetry(community_count: usize) -> String {
    format!("✔️ Connected in {community_count} servers")
}

pub(crate) fn joined_telemetry(community_name: &str, member_count: u64) -> String {
    format!("➕ Joined '{community_name}' ({member_count} members)")
}

/// The member count is unknown when the community was never cached.
pub(crate) fn left_telemetry(community_name: &str, member_count: Option<u64>) -> String {
    match member_count {
        Some(count) => format!("➖ Left '{community_name}' ({count} members)"),
        None => format!("➖ Left '{community_name}'"),
    }
}

pub(crate) fn shard_error_telemetry(detail: &str) -> String {
    format!("💥 {detail}")
}

pub(crate) fn render_telemetry(
    width: u32,
    height: u32,
    requester_tag: &str,
    community_name: Option<&str>,
) -> String {
    let size = format!("🎨 {width}x{height}");
    let user = format!("👤 {requester_tag}");
    match community_name {
        Some(name) => format!("{size}` `{user}` `📰 {name}"),
        None => format!("{size}` `{user}"),
    }
}
