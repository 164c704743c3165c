// ABOUTME: Placeholder grid renderer turning an image handle into printable text
// ABOUTME: Each cell repeats the handle's codepoint; row colors encode vertical position

use crate::constants::grid;
use crate::dedup::Geometry;
use crate::error::{Error, Result};
use crate::Handle;

/// Whether `codepoint` lies in one of the Unicode private-use areas
fn is_private_use(codepoint: u32) -> bool {
    matches!(
        codepoint,
        0xE000..=0xF8FF | 0xF_0000..=0xF_FFFD | 0x10_0000..=0x10_FFFD
    )
}

/// The glyph standing in for `handle`: the handle itself, read as a codepoint
pub fn placeholder_char(handle: Handle) -> Result<char> {
    let codepoint = handle.value();
    if !is_private_use(codepoint) {
        return Err(Error::InvalidHandle(codepoint));
    }
    char::from_u32(codepoint).ok_or(Error::InvalidHandle(codepoint))
}

/// Fail when `geometry` cannot be drawn with the chosen row styling.
///
/// Callers check this before any upload, so a grid that can never be
/// printed never gets a key bound in the store.
pub fn check_renderable(geometry: Geometry, row_colors: bool) -> Result<()> {
    if row_colors && geometry.rows() > grid::MAX_COLORED_ROWS {
        return Err(Error::InvalidGeometry {
            columns: geometry.columns(),
            rows: geometry.rows(),
            reason: "row colors can only address 256 rows",
        });
    }
    Ok(())
}

/// Render `geometry.rows()` lines of `geometry.columns()` placeholder glyphs.
///
/// With `row_colors`, each line starts with a 256-color foreground escape
/// whose index is the zero-based row, which is how the terminal recovers the
/// vertical position of every glyph. A foreground reset always follows the grid.
pub fn render_grid(handle: Handle, geometry: Geometry, row_colors: bool) -> Result<String> {
    let glyph = placeholder_char(handle)?;
    check_renderable(geometry, row_colors)?;

    let line: String = std::iter::repeat_n(glyph, geometry.columns() as usize).collect();
    let mut out = String::with_capacity((line.len() + 12) * geometry.rows() as usize);

    for row in 0..geometry.rows() {
        if row_colors {
            out.push_str(&format!("\x1b[38;5;{}m", row));
        }
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(grid::STYLE_RESET);

    Ok(out)
}
