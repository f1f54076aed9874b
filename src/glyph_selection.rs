//! The glyphs and code points a subset font must cover.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::error::SubsetError;
use crate::font_reader::FontReader;

/// A set of glyph indices together with the code points that map to them.
///
/// Glyphs can be added directly or through a code point. The glyphs of the subset are the union
/// of both, and the code point map becomes the `cmap` of the subset font.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphSelection {
    glyphs: BTreeSet<u16>,
    codepoint_to_glyph: BTreeMap<u32, u16>,
}

impl GlyphSelection {
    pub fn new() -> Self {
        GlyphSelection::default()
    }

    /// Select the glyphs `font` maps `codepoints` to.
    pub fn from_codepoints(
        font: &FontReader<'_>,
        codepoints: impl IntoIterator<Item = u32>,
    ) -> Result<Self, SubsetError> {
        let mut selection = GlyphSelection::new();
        for codepoint in codepoints {
            selection.add_codepoint(font, codepoint)?;
        }
        Ok(selection)
    }

    pub fn add_glyph(&mut self, glyph_id: u16) {
        self.glyphs.insert(glyph_id);
    }

    /// Look up `codepoint` in the `cmap` of `font` and record the mapping.
    ///
    /// Returns the glyph index, or 0 if the font has no glyph for the code point, in which case
    /// nothing is recorded.
    pub fn add_codepoint(
        &mut self,
        font: &FontReader<'_>,
        codepoint: u32,
    ) -> Result<u16, SubsetError> {
        let glyph_id = font.charcode_to_glyph_index(codepoint)?;
        if glyph_id == 0 {
            warn!("no glyph for code point U+{:04X}", codepoint);
        } else {
            self.codepoint_to_glyph.insert(codepoint, glyph_id);
        }
        Ok(glyph_id)
    }

    /// Record that `codepoint` maps to `glyph_id` without consulting a font.
    pub fn insert_mapping(&mut self, codepoint: u32, glyph_id: u16) {
        self.codepoint_to_glyph.insert(codepoint, glyph_id);
    }

    /// Add everything in `other` to this selection.
    ///
    /// Mappings in `other` replace mappings for the same code point.
    pub fn merge(&mut self, other: &GlyphSelection) {
        self.glyphs.extend(&other.glyphs);
        self.codepoint_to_glyph.extend(&other.codepoint_to_glyph);
    }

    pub fn contains(&self, glyph_id: u16) -> bool {
        self.glyphs.contains(&glyph_id)
            || self.codepoint_to_glyph.values().any(|&id| id == glyph_id)
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty() && self.codepoint_to_glyph.is_empty()
    }

    /// Every selected glyph in ascending order.
    pub fn glyphs(&self) -> BTreeSet<u16> {
        let mut glyphs = self.glyphs.clone();
        glyphs.extend(self.codepoint_to_glyph.values());
        glyphs
    }

    pub fn codepoint_to_glyph(&self) -> &BTreeMap<u32, u16> {
        &self.codepoint_to_glyph
    }

    /// Fill in the code points of glyphs that were added directly, using the `cmap` of `font`.
    ///
    /// Existing mappings are left alone.
    pub fn map_glyphs_to_codepoints(&mut self, font: &FontReader<'_>) -> Result<(), SubsetError> {
        for (codepoint, glyph_id) in font.cmap_mappings()? {
            if self.glyphs.contains(&glyph_id) {
                self.codepoint_to_glyph.entry(codepoint).or_insert(glyph_id);
            }
        }
        Ok(())
    }
}
