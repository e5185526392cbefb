//! Runtime configuration and the startup assets derived from it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use emojicon_delivery::{DeliveryConfig, EmbedPayload};
use emojicon_render::{EmojiPalette, ImageServiceConfig};

use crate::notices::load_help_payload;
use crate::render_policy::RenderPolicy;

#[derive(Debug, Clone)]
pub struct DiscordRuntimeConfig {
    pub token: String,
    /// Custom blank glyph; empty or unset falls back to the default glyph.
    pub blank_glyph: Option<String>,
    pub log_channel_id: Option<u64>,
    pub palette_path: Option<PathBuf>,
    pub help_path: Option<PathBuf>,
    pub policy: RenderPolicy,
    pub delivery: DeliveryConfig,
    pub images: ImageServiceConfig,
}

impl DiscordRuntimeConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            blank_glyph: None,
            log_channel_id: None,
            palette_path: None,
            help_path: None,
            policy: RenderPolicy::default(),
            delivery: DeliveryConfig::default(),
            images: ImageServiceConfig::default(),
        }
    }

    /// Normalized blank glyph: trimmed, with empty values treated as unset.
    pub fn blank_glyph(&self) -> Option<String> {
        self.blank_glyph
            .as_deref()
            .map(str::trim)
            .filter(|blank| !blank.is_empty())
            .map(str::to_string)
    }
}

/// Palette and help payload loaded once at startup.
#[derive(Debug, Clone)]
pub struct RuntimeAssets {
    pub palette: EmojiPalette,
    pub help: EmbedPayload,
}

pub fn load_runtime_assets(config: &DiscordRuntimeConfig) -> Result<RuntimeAssets> {
    let palette = match config.palette_path.as_deref() {
        Some(path) => EmojiPalette::from_path(path)
            .with_context(|| format!("failed to load palette {}", path.display()))?,
        None => EmojiPalette::builtin().context("failed to load built-in palette")?,
    };
    let help = load_help_payload(config.help_path.as_deref())?;
    tracing::debug!(
        palette_entries = palette.len(),
        custom_palette = config.palette_path.is_some(),
        custom_help = config.help_path.is_some(),
        "runtime assets loaded"
    );
    Ok(RuntimeAssets { palette, help })
}
