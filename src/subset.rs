//! Font subsetting.
//!
//! The subsetter keeps glyph indices stable: the output font has the same glyph at the same
//! index as the input, with unselected glyphs left empty. Only `glyf`, `loca` and `cmap` are
//! rebuilt, the other tables are copied.

use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom, Write};

use log::{debug, warn};
use rustc_hash::FxHashSet;

use crate::error::{ParseError, SubsetError};
use crate::font_reader::{FontReader, ReaderOptions, Severity};
use crate::font_writer::FontWriter;
use crate::glyph_selection::GlyphSelection;
use crate::tables::glyf::GlyfRecord;
use crate::tag::TableTag;

/// Tables copied from the source font when present.
const PASSTHROUGH_TABLES: [TableTag; 10] = [
    TableTag::Maxp,
    TableTag::Head,
    TableTag::Name,
    TableTag::Os2,
    TableTag::Cvt,
    TableTag::Fpgm,
    TableTag::Prep,
    TableTag::Hhea,
    TableTag::Hmtx,
    TableTag::Post,
];

/// Only the first 255 glyphs are searched for an outline to add to a subset without one.
const FORCED_GLYPH_SEARCH_LIMIT: u16 = 255;

/// How the components of composite glyphs are added to a subset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CompositeClosure {
    /// Add the components of the selected glyphs, but not the components of those components.
    #[default]
    OneLevel,
    /// Add components until every composite glyph in the subset has all of its components.
    Recursive,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct SubsetOptions {
    pub composite_closure: CompositeClosure,
    pub checksum_severity: Severity,
}

/// Subset `font_data` so that it only contains the glyphs in `selection`.
///
/// When `include_cmap` is set the code points of `selection` are written to a format 4 `cmap`.
pub fn subset(
    font_data: &[u8],
    selection: &GlyphSelection,
    include_cmap: bool,
) -> Result<Vec<u8>, SubsetError> {
    subset_with_options(font_data, selection, include_cmap, &SubsetOptions::default())
}

pub fn subset_with_options(
    font_data: &[u8],
    selection: &GlyphSelection,
    include_cmap: bool,
    options: &SubsetOptions,
) -> Result<Vec<u8>, SubsetError> {
    let reader_options = ReaderOptions {
        checksum_severity: options.checksum_severity,
    };
    let reader = FontReader::with_options(font_data, &reader_options)?;
    let mut writer = FontWriter::new();

    let selected = selection.glyphs();
    for &glyph_id in &selected {
        writer.add_glyph(reader.load_glyph(glyph_id)?, glyph_id)?;
    }

    let additional = composite_components(&reader, &selected, options.composite_closure)?;
    if !additional.is_empty() {
        debug!("adding composite glyph components {:?}", additional);
    }
    for glyph_id in additional {
        writer.add_glyph(reader.load_glyph(glyph_id)?, glyph_id)?;
    }

    if !writer.has_outlines() {
        add_forced_glyph(&reader, &mut writer)?;
    }

    for table in PASSTHROUGH_TABLES {
        if reader.has_table(table) {
            writer.add_table(table, reader.load_table(table)?)?;
        }
    }

    writer.set_codepoint_to_glyph(selection.codepoint_to_glyph());
    writer.output(include_cmap)
}

/// Read a font from `input`, subset it and write the result to `output`.
///
/// The font is read from the current position of `input` to its end.
pub fn subset_stream<R: Read + Seek, W: Write>(
    mut input: R,
    mut output: W,
    selection: &GlyphSelection,
    include_cmap: bool,
    options: &SubsetOptions,
) -> Result<(), SubsetError> {
    let start = input
        .stream_position()
        .map_err(|err| SubsetError::io("finding start of font data", err))?;
    let end = input
        .seek(SeekFrom::End(0))
        .map_err(|err| SubsetError::io("seeking to end of font data", err))?;
    input
        .seek(SeekFrom::Start(start))
        .map_err(|err| SubsetError::io(format!("seeking to font data at {}", start), err))?;

    let capacity = usize::try_from(end.saturating_sub(start)).unwrap_or(0);
    let mut font_data = Vec::with_capacity(capacity);
    input
        .read_to_end(&mut font_data)
        .map_err(|err| SubsetError::io(format!("reading font data at {}", start), err))?;

    let subset_data = subset_with_options(&font_data, selection, include_cmap, options)?;
    output.write_all(&subset_data).map_err(|err| {
        SubsetError::io(format!("writing {} bytes of font data", subset_data.len()), err)
    })?;
    Ok(())
}

/// Find the component glyphs of the composite glyphs in `selected` that are not already
/// selected.
fn composite_components(
    reader: &FontReader<'_>,
    selected: &BTreeSet<u16>,
    closure: CompositeClosure,
) -> Result<BTreeSet<u16>, SubsetError> {
    let mut seen = selected.iter().copied().collect::<FxHashSet<u16>>();
    let mut pending = selected.iter().copied().collect::<Vec<u16>>();
    let mut additional = BTreeSet::new();

    while let Some(glyph_id) = pending.pop() {
        let glyph = GlyfRecord::new(reader.load_glyph(glyph_id)?);
        for component in glyph.component_indices()? {
            if component >= reader.num_glyphs() {
                return Err(ParseError::BadIndex.into());
            }
            if seen.insert(component) {
                additional.insert(component);
                if closure == CompositeClosure::Recursive {
                    pending.push(component);
                }
            }
        }
    }

    Ok(additional)
}

/// Add the first glyph with an outline so that `glyf` is not empty.
fn add_forced_glyph(
    reader: &FontReader<'_>,
    writer: &mut FontWriter<'_>,
) -> Result<(), SubsetError> {
    for glyph_id in 0..reader.num_glyphs().min(FORCED_GLYPH_SEARCH_LIMIT) {
        if writer.contains_glyph(glyph_id) {
            continue;
        }
        let glyph = reader.load_glyph(glyph_id)?;
        if !glyph.is_empty() {
            debug!("subset has no outlines, adding glyph {}", glyph_id);
            return writer.add_glyph(glyph, glyph_id);
        }
    }

    warn!(
        "none of the first {} glyphs have outlines",
        FORCED_GLYPH_SEARCH_LIMIT
    );
    Ok(())
}
