//! Pixel and glyph data model shared by the palette, image service and
//! rendering engine.

/// Zero-width space plus newline. Keeps chat clients from collapsing lines
/// that end up empty after blank trimming.
pub const LINE_TERMINATOR: &str = "\u{200B}\n";

/// One RGBA sample, channels in `[r, g, b, a]` order.
pub type Rgba = [u8; 4];

/// One rendered unit. `Blank` marks transparent or unmatched pixels and is
/// substituted with the destination's blank text at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphToken<'a> {
    Glyph(&'a str),
    Blank,
}

impl GlyphToken<'_> {
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank)
    }
}

/// Row-major RGBA raster produced by the image service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl PixelGrid {
    /// Builds a grid, returning `None` when `pixels` does not hold exactly
    /// `width * height` samples.
    pub fn new(width: u32, height: u32, pixels: Vec<Rgba>) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// Rendered mosaic: one entry per grid row, terminator not included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArt {
    pub lines: Vec<String>,
    pub width: u32,
    pub height: u32,
}

impl RenderedArt {
    /// Joins every line with its terminator into the single blob handed to
    /// delivery.
    pub fn to_text(&self) -> String {
        let capacity = self
            .lines
            .iter()
            .map(|line| line.len() + LINE_TERMINATOR.len())
            .sum();
        let mut text = String::with_capacity(capacity);
        for line in &self.lines {
            text.push_str(line);
            text.push_str(LINE_TERMINATOR);
        }
        text
    }
}
