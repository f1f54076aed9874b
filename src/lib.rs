#![warn(rust_2018_idioms)]

//! # TrueType font subsetting
//!
//! `ttsubset` reduces a TrueType font to the glyphs a document uses. Glyph indices are kept
//! as they are, so text already encoded with the glyph indices of the full font remains valid.
//! The subset can optionally carry a format 4 `cmap` for the code points that were used.
//!
//! ```no_run
//! use ttsubset::font_reader::FontReader;
//! use ttsubset::glyph_selection::GlyphSelection;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let font_data = std::fs::read("font.ttf")?;
//! let reader = FontReader::new(&font_data)?;
//! let selection = GlyphSelection::from_codepoints(&reader, "Hello".chars().map(u32::from))?;
//! let subset = ttsubset::subset::subset(&font_data, &selection, true)?;
//! # Ok(())
//! # }
//! ```

/// Reading and writing of binary data.
pub mod binary;
/// Checksum calculation routines.
pub mod checksum;
pub mod error;
pub mod font_reader;
pub mod font_writer;
pub mod glyph_selection;
pub mod size;
/// Font subsetting.
pub mod subset;
pub mod tables;
pub mod tag;
