//! Row-by-row pixel to glyph rendering.

use crate::glyph::{GlyphToken, PixelGrid, RenderedArt};
use crate::palette::PaletteResolver;

/// Renders `grid` into one line per row.
///
/// Each pixel maps through [`PaletteResolver::nearest_glyph`]; the trailing
/// run of blank glyphs on every row is dropped, and interior blanks are
/// written as `blank_text`. A fully blank row becomes an empty line.
#[tracing::instrument(
    level = "debug",
    skip(grid, palette, blank_text),
    fields(width = grid.width(), height = grid.height())
)]
pub fn render_pixel_grid(
    grid: &PixelGrid,
    palette: &dyn PaletteResolver,
    blank_text: &str,
) -> RenderedArt {
    let mut lines = Vec::with_capacity(grid.height() as usize);
    let mut row = Vec::with_capacity(grid.width() as usize);
    for y in 0..grid.height() {
        row.clear();
        for x in 0..grid.width() {
            let glyph = grid
                .pixel(x, y)
                .map(|rgba| palette.nearest_glyph(rgba))
                .unwrap_or(GlyphToken::Blank);
            row.push(glyph);
        }
        lines.push(render_row(&row, blank_text));
    }
    RenderedArt {
        lines,
        width: grid.width(),
        height: grid.height(),
    }
}

fn render_row(row: &[GlyphToken<'_>], blank_text: &str) -> String {
    let visible = row
        .iter()
        .rposition(|glyph| !glyph.is_blank())
        .map_or(0, |index| index + 1);
    let mut line = String::new();
    for glyph in &row[..visible] {
        match glyph {
            GlyphToken::Glyph(token) => line.push_str(token),
            GlyphToken::Blank => line.push_str(blank_text),
        }
    }
    line
}
