//! Assembly of a subset TrueType font.
//!
//! A [`FontWriter`] collects glyph outlines and the tables copied from the source font, then
//! [`FontWriter::output`] synthesises `glyf`, `loca` and `cmap`, patches `head`, `hhea`, `maxp`
//! and `hmtx` to match the new glyph count, and serialises the whole font with valid
//! checksums.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::num::Wrapping;

use log::{debug, warn};

use crate::binary::long_align;
use crate::binary::read::ReadScope;
use crate::binary::write::{self, Placeholder, WriteBinary, WriteBuffer, WriteContext};
use crate::binary::{U16Be, U32Be};
use crate::checksum::{self, CHECKSUM_MAGIC};
use crate::error::{InternalError, ParseError, SubsetError, WriteError};
use crate::size;
use crate::tables::cmap::owned::{Cmap, CmapSubtableFormat4};
use crate::tables::loca::owned::LocaTable;
use crate::tables::{
    HeadTable, HheaTable, IndexToLocFormat, MaxpTable, PostHeader, TableRecord, TTF_MAGIC,
};
use crate::tag::{DisplayTag, TableTag};

/// Builds a subset font from individually added glyphs and tables.
///
/// `'a` is the lifetime of the code point map installed with
/// [`set_codepoint_to_glyph`](FontWriter::set_codepoint_to_glyph).
#[derive(Debug, Default)]
pub struct FontWriter<'a> {
    glyphs: BTreeMap<u16, Vec<u8>>,
    tables: BTreeMap<TableTag, WriteBuffer>,
    hmtx: Option<Vec<u8>>,
    codepoint_to_glyph: Option<&'a BTreeMap<u32, u16>>,
}

impl<'a> FontWriter<'a> {
    pub fn new() -> Self {
        FontWriter {
            glyphs: BTreeMap::new(),
            tables: BTreeMap::new(),
            hmtx: None,
            codepoint_to_glyph: None,
        }
    }

    /// Store the outline `data` of glyph `index`.
    ///
    /// Each glyph may only be added once.
    pub fn add_glyph(&mut self, data: &[u8], index: u16) -> Result<(), SubsetError> {
        match self.glyphs.entry(index) {
            Entry::Occupied(_) => Err(InternalError::DuplicateGlyph(index).into()),
            Entry::Vacant(entry) => {
                entry.insert(data.to_vec());
                Ok(())
            }
        }
    }

    pub fn contains_glyph(&self, index: u16) -> bool {
        self.glyphs.contains_key(&index)
    }

    /// Returns `true` if any added glyph has outline data.
    pub fn has_outlines(&self) -> bool {
        self.glyphs.values().any(|glyph| !glyph.is_empty())
    }

    /// Install the code point to glyph map the `cmap` table is built from.
    pub fn set_codepoint_to_glyph(&mut self, codepoint_to_glyph: &'a BTreeMap<u32, u16>) {
        self.codepoint_to_glyph = Some(codepoint_to_glyph);
    }

    /// Copy `table` into the font.
    ///
    /// `hmtx` is truncated when the font is output and `post` is reduced to a version 3 header.
    /// `glyf`, `loca` and `cmap` are built by the writer and cannot be added.
    pub fn add_table(&mut self, table: TableTag, data: &[u8]) -> Result<(), SubsetError> {
        match table {
            TableTag::Glyf | TableTag::Loca | TableTag::Cmap => {
                return Err(InternalError::ReservedTable(table.tag()).into())
            }
            TableTag::Hmtx => {
                self.hmtx = Some(data.to_vec());
            }
            TableTag::Post => {
                // Only the fixed header is kept, zero filled if the source is shorter
                let mut header = [0; PostHeader::SIZE];
                let len = data.len().min(PostHeader::SIZE);
                header[..len].copy_from_slice(&data[..len]);
                if len < PostHeader::SIZE {
                    warn!("post table is only {} bytes, zero filling the header", len);
                }
                let post = ReadScope::new(&header).read::<PostHeader>()?;
                let (_, buffer) = write::buffer::<_, PostHeader>(&post.to_version_3(), ())?;
                self.tables.insert(table, buffer);
            }
            _ => {
                let mut buffer = WriteBuffer::new();
                buffer.write_bytes(data)?;
                self.tables.insert(table, buffer);
            }
        }
        Ok(())
    }

    /// Serialise the font, consuming the writer.
    ///
    /// A `cmap` table is only written when `include_cmap` is set and a non-empty code point map
    /// was installed.
    pub fn output(mut self, include_cmap: bool) -> Result<Vec<u8>, SubsetError> {
        let max_index = match self.glyphs.keys().next_back() {
            Some(&index) => index,
            None => return Err(InternalError::NoGlyphs.into()),
        };
        let num_glyphs = max_index.checked_add(1).ok_or(WriteError::BadValue)?;

        let (glyf, loca) = self.assemble_glyf(num_glyphs)?;
        if glyf.is_empty() {
            warn!("subset font has no outlines, leaving out glyf");
        }
        self.tables.insert(TableTag::Glyf, glyf);
        let (_, loca) = write::buffer::<_, LocaTable>(loca, IndexToLocFormat::Long)?;
        self.tables.insert(TableTag::Loca, loca);

        let mut hhea = self.take_table(TableTag::Hhea, |scope| scope.read::<HheaTable>())?;
        let hmtx = self
            .hmtx
            .take()
            .ok_or(InternalError::MissingTable(TableTag::Hmtx.tag()))?;
        let hmtx = truncate_hmtx(&hmtx, &mut hhea, usize::from(num_glyphs))?;
        self.tables.insert(TableTag::Hmtx, hmtx);
        let (_, hhea) = write::buffer::<_, HheaTable>(&hhea, ())?;
        self.tables.insert(TableTag::Hhea, hhea);

        if include_cmap {
            match self.codepoint_to_glyph {
                Some(mappings) if !mappings.is_empty() => {
                    let sub_table = CmapSubtableFormat4::from_mappings(mappings)?;
                    let cmap = Cmap::windows_unicode(sub_table);
                    let (_, cmap) = write::buffer::<_, Cmap>(cmap, ())?;
                    self.tables.insert(TableTag::Cmap, cmap);
                }
                _ => warn!("no data for cmap"),
            }
        }

        let mut head = self.take_table(TableTag::Head, |scope| scope.read::<HeadTable>())?;
        head.index_to_loc_format = IndexToLocFormat::Long;
        let (check_sum_adjustment, head) = write::buffer::<_, HeadTable>(&head, ())?;
        self.tables.insert(TableTag::Head, head);

        let mut maxp = self.take_table(TableTag::Maxp, |scope| scope.read::<MaxpTable>())?;
        maxp.num_glyphs = num_glyphs;
        let (_, maxp) = write::buffer::<_, MaxpTable>(&maxp, ())?;
        self.tables.insert(TableTag::Maxp, maxp);

        debug!(
            "writing font with {} glyphs ({} outlines) and {} tables",
            num_glyphs,
            self.glyphs.len(),
            self.tables.len()
        );
        assemble(self.tables, check_sum_adjustment)
    }

    /// Write the glyphs in index order, each padded to a 4-byte boundary.
    fn assemble_glyf(&self, num_glyphs: u16) -> Result<(WriteBuffer, LocaTable), WriteError> {
        let mut glyf = WriteBuffer::new();
        let mut loca = LocaTable::new();
        for (&index, glyph) in &self.glyphs {
            loca.fill_to(index, u32::try_from(glyf.bytes_written())?);
            glyf.write_bytes(glyph)?;
            glyf.write_zeros(long_align(glyph.len()) - glyph.len())?;
        }
        loca.fill_to(num_glyphs, u32::try_from(glyf.bytes_written())?);

        Ok((glyf, loca))
    }

    /// Remove a table that must have been added and parse it.
    fn take_table<T>(
        &mut self,
        table: TableTag,
        read: impl FnOnce(ReadScope<'_>) -> Result<T, ParseError>,
    ) -> Result<T, SubsetError> {
        let buffer = self
            .tables
            .remove(&table)
            .ok_or(InternalError::MissingTable(table.tag()))?;
        let value = read(ReadScope::new(buffer.bytes()))?;
        Ok(value)
    }
}

/// Cut `hmtx` down to what a font of `num_glyphs` glyphs needs.
///
/// When the subset has no more glyphs than there are long metrics the long metrics are
/// truncated and `hhea` updated to match. Otherwise all long metrics are kept, followed by as
/// many of the remaining left side bearings as the source has.
fn truncate_hmtx(
    hmtx: &[u8],
    hhea: &mut HheaTable,
    num_glyphs: usize,
) -> Result<WriteBuffer, SubsetError> {
    let num_h_metrics = usize::from(hhea.num_h_metrics);
    let data = if num_glyphs <= num_h_metrics {
        hhea.num_h_metrics = u16::try_from(num_glyphs).map_err(WriteError::from)?;
        hmtx.get(..num_glyphs * size::LONG_HOR_METRIC)
            .ok_or(ParseError::BadEof)?
    } else {
        let metrics_len = num_h_metrics * size::LONG_HOR_METRIC;
        let len = metrics_len + (num_glyphs - num_h_metrics) * size::I16;
        hmtx.get(..len.min(hmtx.len()))
            .filter(|data| data.len() >= metrics_len)
            .ok_or(ParseError::BadEof)?
    };

    let mut buffer = WriteBuffer::new();
    buffer.write_bytes(data)?;
    Ok(buffer)
}

/// Write the offset table, table directory and table data in `TableTag` order.
///
/// Empty tables are left out of the font.
fn assemble(
    mut tables: BTreeMap<TableTag, WriteBuffer>,
    check_sum_adjustment: Placeholder<U32Be, u32>,
) -> Result<Vec<u8>, SubsetError> {
    tables.retain(|table, buffer| {
        if buffer.is_empty() {
            debug!("leaving out empty {} table", DisplayTag(table.tag()));
            false
        } else {
            true
        }
    });
    let mut font = WriteBuffer::new();

    let num_tables = u16::try_from(tables.len()).map_err(WriteError::from)?;
    let entry_selector = max_power_of_2(num_tables);
    let search_range = (1 << entry_selector) * 16;
    U32Be::write(&mut font, TTF_MAGIC)?;
    U16Be::write(&mut font, num_tables)?;
    U16Be::write(&mut font, search_range)?;
    U16Be::write(&mut font, entry_selector)?;
    U16Be::write(&mut font, num_tables * 16 - search_range)?;

    let mut table_offset = long_align(font.bytes_written() + tables.len() * TableRecord::SIZE);
    let mut tables_checksum = Wrapping(0);
    let mut ordered_tables = Vec::with_capacity(tables.len());
    for (table, mut buffer) in tables {
        let length = buffer.len();
        let padded_length = long_align(length);
        buffer.write_zeros(padded_length - length)?;

        // checkSumAdjustment is still zero so this is also the head checksum
        let table_checksum = checksum::table_checksum(buffer.bytes())?;
        tables_checksum += table_checksum;

        let record = TableRecord {
            table_tag: table.tag(),
            checksum: table_checksum.0,
            offset: u32::try_from(table_offset).map_err(WriteError::from)?,
            length: u32::try_from(length).map_err(WriteError::from)?,
        };
        TableRecord::write(&mut font, &record)?;
        table_offset += padded_length;
        ordered_tables.push((table, buffer));
    }

    let headers_checksum = checksum::table_checksum(font.bytes())?;
    let adjustment = Wrapping(CHECKSUM_MAGIC) - (headers_checksum + tables_checksum);
    if let Some((_, head)) = ordered_tables
        .iter_mut()
        .find(|(table, _)| *table == TableTag::Head)
    {
        head.write_placeholder(check_sum_adjustment, adjustment.0)?;
    }

    for (_, buffer) in &ordered_tables {
        font.write_bytes(buffer.bytes())?;
    }

    Ok(font.into_inner())
}

/// Calculate the maximum power of 2 that is <= num
fn max_power_of_2(num: u16) -> u16 {
    15u16.saturating_sub(num.leading_zeros() as u16)
}
