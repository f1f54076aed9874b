//! Parsing and writing of the `cmap` table.
//!
//! Only format 4 subtables (segment mapping to delta values) are understood. They are the
//! Unicode BMP subtables found in practically every TrueType font, and the only subtable written
//! to subset fonts.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/cmap>

pub mod subset;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be, U32Be};
use crate::error::ParseError;
use crate::size;

/// Code point used by the final segment of every format 4 subtable.
pub const SENTINEL: u16 = 0xFFFF;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlatformId(pub u16);

impl PlatformId {
    pub const UNICODE: PlatformId = PlatformId(0);
    pub const MACINTOSH: PlatformId = PlatformId(1);
    pub const WINDOWS: PlatformId = PlatformId(3);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingId(pub u16);

impl EncodingId {
    pub const WINDOWS_UNICODE_BMP_UCS2: EncodingId = EncodingId(1);
}

pub struct Cmap<'a> {
    pub scope: ReadScope<'a>,
    encoding_records: ReadArray<'a, EncodingRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

/// A format 4 `cmap` subtable.
#[derive(Debug, Clone)]
pub struct CmapSubtableFormat4<'a> {
    pub language: u16,
    pub end_codes: ReadArray<'a, U16Be>,
    pub start_codes: ReadArray<'a, U16Be>,
    pub id_deltas: ReadArray<'a, I16Be>,
    pub id_range_offsets: ReadArray<'a, U16Be>,
    pub glyph_id_array: ReadArray<'a, U16Be>,
}

/// Derives the binary search fields of a format 4 subtable from its segment count.
#[derive(Copy, Clone)]
pub(crate) struct Format4Calculator {
    seg_count: u16,
}

impl ReadBinary for Cmap<'_> {
    type HostType<'a> = Cmap<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Cmap<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check(version == 0)?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;
        Ok(Cmap {
            scope,
            encoding_records,
        })
    }
}

impl ReadFrom for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);

    fn read_from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl EncodingRecord {
    /// Windows Unicode BMP, or any Unicode platform record.
    pub fn is_unicode(&self) -> bool {
        (self.platform_id == PlatformId::WINDOWS.0
            && self.encoding_id == EncodingId::WINDOWS_UNICODE_BMP_UCS2.0)
            || self.platform_id == PlatformId::UNICODE.0
    }
}

impl ReadBinary for CmapSubtableFormat4<'_> {
    type HostType<'a> = CmapSubtableFormat4<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<CmapSubtableFormat4<'a>, ParseError> {
        let format = ctxt.read_u16be()?;
        ctxt.check_version(format == 4)?;
        let length = usize::from(ctxt.read_u16be()?);
        let language = ctxt.read_u16be()?;
        let seg_count_x2 = usize::from(ctxt.read_u16be()?);
        ctxt.check((seg_count_x2 & 1) == 0)?;
        let seg_count = seg_count_x2 >> 1;
        let _search_range = ctxt.read_u16be()?;
        let _entry_selector = ctxt.read_u16be()?;
        let _range_shift = ctxt.read_u16be()?;
        let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
        let _reserved_pad = ctxt.read_u16be()?;
        let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
        let id_deltas = ctxt.read_array::<I16Be>(seg_count)?;
        let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;
        let fixed_length = (8 + (4 * seg_count)) * size::U16;
        ctxt.check(length >= fixed_length)?;
        let remaining = length - fixed_length;
        ctxt.check((remaining & 1) == 0)?;
        let glyph_id_array = ctxt.read_array::<U16Be>(remaining >> 1)?;
        Ok(CmapSubtableFormat4 {
            language,
            end_codes,
            start_codes,
            id_deltas,
            id_range_offsets,
            glyph_id_array,
        })
    }
}

impl<'a> Cmap<'a> {
    pub fn encoding_records(&self) -> impl Iterator<Item = EncodingRecord> + 'a {
        self.encoding_records.iter()
    }

    /// Find the first Unicode encoding record whose subtable is format 4 and parse it.
    ///
    /// Records with other subtable formats are passed over.
    pub fn find_format4_subtable(
        &self,
    ) -> Result<Option<(EncodingRecord, CmapSubtableFormat4<'a>)>, ParseError> {
        for record in self.encoding_records.iter() {
            if !record.is_unicode() {
                continue;
            }
            let scope = self.scope.offset(usize::try_from(record.offset)?);
            let format = scope.ctxt().read_u16be()?;
            if format == 4 {
                let subtable = scope.read::<CmapSubtableFormat4<'_>>()?;
                return Ok(Some((record, subtable)));
            }
        }
        Ok(None)
    }
}

impl CmapSubtableFormat4<'_> {
    pub fn seg_count(&self) -> usize {
        self.end_codes.len()
    }

    /// Map a code point to a glyph index, returning 0 (`.notdef`) when it is not mapped.
    pub fn map_glyph(&self, code: u32) -> Result<u16, ParseError> {
        let code = match u16::try_from(code) {
            Ok(code) => code,
            Err(_) => return Ok(0),
        };
        // Lower bound: the first segment whose end code is >= code
        let (Ok(index) | Err(index)) = self.end_codes.binary_search_by(|end_code| {
            if end_code < code {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        });
        if index == self.seg_count() {
            return Ok(0);
        }
        let start_code = self.start_codes.read_item(index)?;
        if code < start_code {
            return Ok(0);
        }
        self.segment_glyph(index, start_code, code)
    }

    /// Decode every mapping in the subtable.
    ///
    /// Code points mapped to glyph 0 and the final 0xFFFF segment are omitted.
    pub fn mappings(&self) -> Result<BTreeMap<u32, u16>, ParseError> {
        let mut mappings = BTreeMap::new();
        for index in 0..self.seg_count() {
            let start_code = self.start_codes.read_item(index)?;
            let end_code = self.end_codes.read_item(index)?;
            for code in start_code..=end_code {
                if code == SENTINEL {
                    break;
                }
                let glyph_id = self.segment_glyph(index, start_code, code)?;
                if glyph_id != 0 {
                    mappings.entry(u32::from(code)).or_insert(glyph_id);
                }
            }
        }
        Ok(mappings)
    }

    fn segment_glyph(&self, index: usize, start_code: u16, code: u16) -> Result<u16, ParseError> {
        // The idDelta arithmetic is modulo 65536.
        let id_delta = self.id_deltas.read_item(index)? as u16;
        let id_range_offset = self.id_range_offsets.read_item(index)?;
        if id_range_offset == 0 {
            return Ok(code.wrapping_add(id_delta));
        }

        // id_range_offset is a byte offset from its own slot in the id_range_offsets array, which
        // is immediately followed by the glyph id array.
        let slot = usize::from(id_range_offset / 2) + usize::from(code - start_code);
        let remaining_offsets = self.seg_count() - index;
        let glyph_index = slot
            .checked_sub(remaining_offsets)
            .ok_or(ParseError::BadIndex)?;
        match self.glyph_id_array.read_item(glyph_index)? {
            0 => Ok(0),
            glyph_id => Ok(glyph_id.wrapping_add(id_delta)),
        }
    }
}

impl Format4Calculator {
    /// Returns `None` if `seg_count * 2` does not fit in 16 bits.
    pub(crate) fn new(seg_count: usize) -> Option<Self> {
        let seg_count = u16::try_from(seg_count).ok()?;
        seg_count.checked_mul(2)?;
        Some(Format4Calculator { seg_count })
    }

    pub(crate) fn seg_count_x2(self) -> u16 {
        self.seg_count * 2
    }

    pub(crate) fn search_range(self) -> u16 {
        2 << self.entry_selector()
    }

    /// floor(log2(seg_count))
    pub(crate) fn entry_selector(self) -> u16 {
        15u16.saturating_sub(self.seg_count.leading_zeros() as u16)
    }

    pub(crate) fn range_shift(self) -> u16 {
        self.seg_count_x2().saturating_sub(self.search_range())
    }
}

pub mod owned {
    use std::convert::TryFrom;

    use super::{EncodingId, Format4Calculator, PlatformId};
    use crate::binary::write::{WriteBinary, WriteContext};
    use crate::binary::{I16Be, U16Be, U32Be};
    use crate::error::WriteError;

    pub struct Cmap {
        pub encoding_records: Vec<EncodingRecord>,
    }

    pub struct EncodingRecord {
        pub platform_id: PlatformId,
        pub encoding_id: EncodingId,
        pub sub_table: CmapSubtableFormat4,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct CmapSubtableFormat4 {
        pub language: u16,
        pub end_codes: Vec<u16>,
        pub start_codes: Vec<u16>,
        pub id_deltas: Vec<i16>,
        pub id_range_offsets: Vec<u16>,
        pub glyph_id_array: Vec<u16>,
    }

    impl Cmap {
        /// A `cmap` holding a single Windows Unicode BMP subtable.
        pub fn windows_unicode(sub_table: CmapSubtableFormat4) -> Self {
            Cmap {
                encoding_records: vec![EncodingRecord {
                    platform_id: PlatformId::WINDOWS,
                    encoding_id: EncodingId::WINDOWS_UNICODE_BMP_UCS2,
                    sub_table,
                }],
            }
        }
    }

    impl CmapSubtableFormat4 {
        pub fn seg_count(&self) -> usize {
            self.end_codes.len()
        }
    }

    impl WriteBinary<Self> for Cmap {
        type Output = ();

        fn write<C: WriteContext>(ctxt: &mut C, table: Cmap) -> Result<(), WriteError> {
            let start = ctxt.bytes_written();
            U16Be::write(ctxt, 0u16)?; // version
            U16Be::write(ctxt, u16::try_from(table.encoding_records.len())?)?;

            // encoding records
            let mut offsets = Vec::with_capacity(table.encoding_records.len());
            for record in &table.encoding_records {
                U16Be::write(ctxt, record.platform_id.0)?;
                U16Be::write(ctxt, record.encoding_id.0)?;
                let offset = ctxt.placeholder::<U32Be, _>()?;
                offsets.push(offset);
            }

            // sub-tables
            for (record, placeholder) in table.encoding_records.into_iter().zip(offsets) {
                let offset = u32::try_from(ctxt.bytes_written() - start)?;
                CmapSubtableFormat4::write(ctxt, record.sub_table)?;
                ctxt.write_placeholder(placeholder, offset)?;
            }

            Ok(())
        }
    }

    impl WriteBinary<Self> for CmapSubtableFormat4 {
        type Output = ();

        fn write<C: WriteContext>(
            ctxt: &mut C,
            table: CmapSubtableFormat4,
        ) -> Result<(), WriteError> {
            let seg_count = table.seg_count();
            if table.start_codes.len() != seg_count
                || table.id_deltas.len() != seg_count
                || table.id_range_offsets.len() != seg_count
            {
                return Err(WriteError::BadValue);
            }
            let calc = Format4Calculator::new(seg_count).ok_or(WriteError::BadValue)?;

            let start = ctxt.bytes_written();
            U16Be::write(ctxt, 4u16)?; // format
            let length = ctxt.placeholder::<U16Be, _>()?;
            U16Be::write(ctxt, table.language)?;
            U16Be::write(ctxt, calc.seg_count_x2())?;
            U16Be::write(ctxt, calc.search_range())?;
            U16Be::write(ctxt, calc.entry_selector())?;
            U16Be::write(ctxt, calc.range_shift())?;
            ctxt.write_vec::<U16Be, _>(table.end_codes)?;
            U16Be::write(ctxt, 0u16)?; // reserved_pad
            ctxt.write_vec::<U16Be, _>(table.start_codes)?;
            ctxt.write_vec::<I16Be, _>(table.id_deltas)?;
            ctxt.write_vec::<U16Be, _>(table.id_range_offsets)?;
            ctxt.write_vec::<U16Be, _>(table.glyph_id_array)?;
            // Fails when the subtable does not fit the 16-bit length field
            ctxt.write_placeholder(length, u16::try_from(ctxt.bytes_written() - start)?)?;

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBinary, WriteBuffer};
    use crate::error::WriteError;
    use crate::tests::writer::{self, TtfType::*};

    // Segments: 'A'..='B' by delta, 'Z'..='\' through the glyph id array, then the sentinel.
    fn format4_data() -> Vec<u8> {
        writer::convert(&[
            UInt16(4),  // format
            UInt16(46), // length
            UInt16(0),  // language
            UInt16(6),  // segCountX2
            UInt16(4),  // searchRange
            UInt16(1),  // entrySelector
            UInt16(2),  // rangeShift
            // endCode
            UInt16(0x42),
            UInt16(0x5C),
            UInt16(0xFFFF),
            UInt16(0), // reservedPad
            // startCode
            UInt16(0x41),
            UInt16(0x5A),
            UInt16(0xFFFF),
            // idDelta
            Int16(-60),
            Int16(0),
            Int16(1),
            // idRangeOffset
            UInt16(0),
            UInt16(4),
            UInt16(0),
            // glyphIdArray
            UInt16(31),
            UInt16(0),
            UInt16(40),
        ])
    }

    #[test]
    fn test_format4_map_glyph() {
        let data = format4_data();
        let subtable = ReadScope::new(&data)
            .read::<CmapSubtableFormat4<'_>>()
            .unwrap();

        assert_eq!(subtable.seg_count(), 3);
        assert_eq!(subtable.map_glyph(0x20), Ok(0));
        assert_eq!(subtable.map_glyph(0x41), Ok(5));
        assert_eq!(subtable.map_glyph(0x42), Ok(6));
        assert_eq!(subtable.map_glyph(0x43), Ok(0));
        assert_eq!(subtable.map_glyph(0x5A), Ok(31));
        assert_eq!(subtable.map_glyph(0x5B), Ok(0));
        assert_eq!(subtable.map_glyph(0x5C), Ok(40));
        assert_eq!(subtable.map_glyph(0xFFFF), Ok(0));
        assert_eq!(subtable.map_glyph(0x1F600), Ok(0));
    }

    #[test]
    fn test_format4_mappings() {
        let data = format4_data();
        let subtable = ReadScope::new(&data)
            .read::<CmapSubtableFormat4<'_>>()
            .unwrap();
        let expected = vec![(0x41, 5), (0x42, 6), (0x5A, 31), (0x5C, 40)]
            .into_iter()
            .collect::<BTreeMap<u32, u16>>();

        assert_eq!(subtable.mappings().unwrap(), expected);
    }

    #[test]
    fn test_format4_short_length() {
        let mut data = format4_data();
        data[2..4].copy_from_slice(&38u16.to_be_bytes());

        assert!(matches!(
            ReadScope::new(&data).read::<CmapSubtableFormat4<'_>>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn test_find_format4_subtable() {
        // A (3,1) record pointing at a format 6 subtable and a (0,3) record pointing at format 4
        let mut data = writer::convert(&[
            UInt16(0), // version
            UInt16(3), // numTables
            UInt16(1),
            UInt16(0),
            UInt32(28), // Mac Roman -> format 4, not Unicode
            UInt16(3),
            UInt16(1),
            UInt32(28 + 46),
            UInt16(0),
            UInt16(3),
            UInt32(28),
        ]);
        data.extend(format4_data());
        data.extend(writer::convert(&[
            UInt16(6),  // format
            UInt16(12), // length
            UInt16(0),  // language
            UInt16(0x20),
            UInt16(1),
            UInt16(3),
        ]));

        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        assert_eq!(cmap.encoding_records().count(), 3);
        let (record, subtable) = cmap.find_format4_subtable().unwrap().unwrap();
        assert_eq!(record.platform_id, 0);
        assert_eq!(subtable.map_glyph(0x41), Ok(5));
        assert!(cmap.encoding_records().any(|record| {
            record.platform_id == PlatformId::WINDOWS.0
                && record.encoding_id == EncodingId::WINDOWS_UNICODE_BMP_UCS2.0
        }));
    }

    #[test]
    fn test_calculator() {
        let calc = Format4Calculator::new(39).unwrap();
        assert_eq!(calc.seg_count_x2(), 78);
        assert_eq!(calc.search_range(), 64);
        assert_eq!(calc.entry_selector(), 5);
        assert_eq!(calc.range_shift(), 14);

        let calc = Format4Calculator::new(1).unwrap();
        assert_eq!(calc.search_range(), 2);
        assert_eq!(calc.entry_selector(), 0);
        assert_eq!(calc.range_shift(), 0);

        assert!(Format4Calculator::new(32768).is_none());
    }

    #[test]
    fn test_write_cmap() {
        let sub_table = owned::CmapSubtableFormat4 {
            language: 0,
            end_codes: vec![0x42, 0x5C, 0xFFFF],
            start_codes: vec![0x41, 0x5A, 0xFFFF],
            id_deltas: vec![-60, 0, 1],
            id_range_offsets: vec![0, 4, 0],
            glyph_id_array: vec![31, 0, 40],
        };
        let mut ctxt = WriteBuffer::new();
        owned::Cmap::write(&mut ctxt, owned::Cmap::windows_unicode(sub_table)).unwrap();

        let mut expected = writer::convert(&[
            UInt16(0),
            UInt16(1),
            UInt16(3),
            UInt16(1),
            UInt32(12),
        ]);
        expected.extend(format4_data());
        assert_eq!(ctxt.bytes(), expected.as_slice());
    }

    #[test]
    fn test_write_mismatched_arrays() {
        let sub_table = owned::CmapSubtableFormat4 {
            end_codes: vec![0xFFFF],
            ..Default::default()
        };
        let mut ctxt = WriteBuffer::new();

        assert_eq!(
            owned::CmapSubtableFormat4::write(&mut ctxt, sub_table),
            Err(WriteError::BadValue)
        );
    }
}
