//! Image-to-mosaic rendering for Emojicon.
//!
//! Provides the glyph/pixel data model, the palette resolver that maps
//! symbolic tokens to image sources and pixel colors to glyphs, the HTTP
//! image service, and the row-by-row rendering engine.

pub mod glyph;
pub mod image_service;
pub mod palette;
pub mod render_engine;

pub use glyph::{GlyphToken, PixelGrid, RenderedArt, Rgba, LINE_TERMINATOR};
pub use image_service::{
    HttpImageService, ImageService, ImageServiceConfig, ImageServiceError, ImageSource,
    ImageSourceKind, TargetHeight,
};
pub use palette::{EmojiPalette, PaletteEntry, PaletteError, PaletteResolver};
pub use render_engine::render_pixel_grid;
