//! Glyph palette: nearest-color glyph lookup and symbolic token resolution.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::glyph::{GlyphToken, Rgba};

const BUILTIN_PALETTE_JSON: &str = include_str!("../assets/palette.json");
const ALPHA_THRESHOLD: u8 = 128;
const CUSTOM_EMOJI_CDN_BASE: &str = "https://cdn.discordapp.com/emojis";
const TWEMOJI_CDN_BASE: &str = "https://cdn.jsdelivr.net/gh/twitter/twemoji@14.0.2/assets/72x72";

const ZERO_WIDTH_JOINER: char = '\u{200D}';
const VARIATION_SELECTOR_16: char = '\u{FE0F}';
const COMBINING_KEYCAP: char = '\u{20E3}';

/// Maps symbolic tokens to image sources and pixel colors to glyphs.
pub trait PaletteResolver: Send + Sync {
    /// Resolves a symbolic token (e.g. an emoji) to the URL of its image.
    fn resolve_token(&self, token: &str) -> Option<String>;

    /// Total color-to-glyph mapping used by the rendering engine.
    fn nearest_glyph(&self, rgba: Rgba) -> GlyphToken<'_>;
}

#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("failed to read palette {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse palette: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("palette must contain at least one entry")]
    Empty,
    #[error("palette entry {index} has an empty token")]
    EmptyToken { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaletteEntry {
    pub token: String,
    pub rgb: [u8; 3],
}

/// Emoji palette backed by a list of `(token, rgb)` entries.
#[derive(Debug, Clone)]
pub struct EmojiPalette {
    entries: Vec<PaletteEntry>,
}

impl EmojiPalette {
    pub fn new(entries: Vec<PaletteEntry>) -> Result<Self, PaletteError> {
        if entries.is_empty() {
            return Err(PaletteError::Empty);
        }
        if let Some(index) = entries
            .iter()
            .position(|entry| entry.token.trim().is_empty())
        {
            return Err(PaletteError::EmptyToken { index });
        }
        Ok(Self { entries })
    }

    /// Palette shipped with the binary.
    pub fn builtin() -> Result<Self, PaletteError> {
        Self::from_json_str(BUILTIN_PALETTE_JSON)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, PaletteError> {
        let entries = serde_json::from_str::<Vec<PaletteEntry>>(raw)?;
        Self::new(entries)
    }

    pub fn from_path(path: &Path) -> Result<Self, PaletteError> {
        let raw = std::fs::read_to_string(path).map_err(|source| PaletteError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PaletteResolver for EmojiPalette {
    fn resolve_token(&self, token: &str) -> Option<String> {
        resolve_emoji_image_url(token)
    }

    fn nearest_glyph(&self, rgba: Rgba) -> GlyphToken<'_> {
        let [r, g, b, a] = rgba;
        if a < ALPHA_THRESHOLD {
            return GlyphToken::Blank;
        }
        self.entries
            .iter()
            .min_by_key(|entry| squared_distance([r, g, b], entry.rgb))
            .map(|entry| GlyphToken::Glyph(entry.token.as_str()))
            .unwrap_or(GlyphToken::Blank)
    }
}

fn squared_distance(left: [u8; 3], right: [u8; 3]) -> u32 {
    left.iter()
        .zip(right.iter())
        .map(|(l, r)| {
            let delta = i32::from(*l) - i32::from(*r);
            (delta * delta) as u32
        })
        .sum()
}

fn custom_emoji_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^<(a?):([A-Za-z0-9_~]{1,32}):(\d{1,20})>$")
            .unwrap_or_else(|error| panic!("custom emoji pattern must compile: {error}"))
    })
}

/// Resolves custom emoji markup or a bare Unicode emoji to an image URL.
pub fn resolve_emoji_image_url(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if let Some(captures) = custom_emoji_pattern().captures(token) {
        let extension = if captures[1].is_empty() { "png" } else { "gif" };
        return Some(format!(
            "{CUSTOM_EMOJI_CDN_BASE}/{}.{extension}",
            &captures[3]
        ));
    }
    if !is_unicode_emoji_sequence(token) {
        return None;
    }
    let keep_variation_selector = token.contains(ZERO_WIDTH_JOINER);
    let codepoints = token
        .chars()
        .filter(|ch| keep_variation_selector || *ch != VARIATION_SELECTOR_16)
        .map(|ch| format!("{:x}", ch as u32))
        .collect::<Vec<_>>()
        .join("-");
    Some(format!("{TWEMOJI_CDN_BASE}/{codepoints}.png"))
}

fn is_unicode_emoji_sequence(token: &str) -> bool {
    let is_keycap = token.contains(COMBINING_KEYCAP);
    let mut has_pictograph = false;
    for ch in token.chars() {
        if is_pictographic(ch) {
            has_pictograph = true;
            continue;
        }
        let is_component = matches!(
            ch,
            ZERO_WIDTH_JOINER | VARIATION_SELECTOR_16 | COMBINING_KEYCAP
        ) || matches!(ch as u32, 0x1F3FB..=0x1F3FF | 0xE0020..=0xE007F);
        let is_keycap_base = is_keycap && matches!(ch, '0'..='9' | '#' | '*');
        if !is_component && !is_keycap_base {
            return false;
        }
        if is_keycap_base {
            has_pictograph = true;
        }
    }
    has_pictograph
}

fn is_pictographic(ch: char) -> bool {
    matches!(
        ch as u32,
        0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049
            | 0x2122
            | 0x2139
            | 0x2194..=0x21AA
            | 0x231A..=0x23FF
            | 0x24C2
            | 0x25AA..=0x25FE
            | 0x2600..=0x27BF
            | 0x2934..=0x2935
            | 0x2B05..=0x2B55
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x1F000..=0x1F3FA
            | 0x1F400..=0x1FAFF
    )
}
