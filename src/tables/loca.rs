//! Parsing and writing of the `loca` table.
//!
//! > The indexToLoc table stores the offsets to the locations of the glyphs in the font, relative
//! > to the beginning of the glyphData table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>

use std::ops::Range;

use crate::binary::read::{ReadArray, ReadBinaryDep, ReadCtxt};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::size;
use crate::tables::IndexToLocFormat;

/// `loca` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>
#[derive(Clone, Debug)]
pub struct LocaTable<'a> {
    pub offsets: LocaOffsets<'a>,
}

#[derive(Clone, Debug)]
pub enum LocaOffsets<'a> {
    Short(ReadArray<'a, U16Be>),
    Long(ReadArray<'a, U32Be>),
}

impl<'b> ReadBinaryDep for LocaTable<'b> {
    type Args<'a> = (u16, IndexToLocFormat);
    type HostType<'a> = LocaTable<'a>;

    /// Read a `loca` table from `ctxt`
    ///
    /// * `num_glyphs` is the number of glyphs in the font. The value for `num_glyphs` is found in
    ///   the 'maxp' table.
    /// * `index_to_loc_format` specifies whether the offsets in the `loca` table are short or
    ///   long. This value can be read from the `head` table.
    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, index_to_loc_format): (u16, IndexToLocFormat),
    ) -> Result<Self::HostType<'a>, ParseError> {
        let num_glyphs = usize::from(num_glyphs);
        let offsets = match index_to_loc_format {
            IndexToLocFormat::Short => {
                // The actual local offset divided by 2 is stored. The value of n is numGlyphs + 1.
                LocaOffsets::Short(ctxt.read_array::<U16Be>(num_glyphs + 1)?)
            }
            IndexToLocFormat::Long => {
                // The actual local offset is stored. The value of n is numGlyphs + 1.
                LocaOffsets::Long(ctxt.read_array::<U32Be>(num_glyphs + 1)?)
            }
        };

        Ok(LocaTable { offsets })
    }
}

impl LocaTable<'_> {
    /// The exact byte length of a `loca` table for `num_glyphs` glyphs in the given format.
    pub fn expected_length(num_glyphs: u16, index_to_loc_format: IndexToLocFormat) -> usize {
        let entries = usize::from(num_glyphs) + 1;
        match index_to_loc_format {
            IndexToLocFormat::Short => entries * size::U16,
            IndexToLocFormat::Long => entries * size::U32,
        }
    }

    /// The byte range of glyph `index` within the `glyf` table.
    ///
    /// The range is empty for glyphs without outline data.
    pub fn glyph_range(&self, index: u16) -> Result<Range<usize>, ParseError> {
        let index = usize::from(index);
        let start = self.offsets.get(index).ok_or(ParseError::BadIndex)?;
        let end = self.offsets.get(index + 1).ok_or(ParseError::BadIndex)?;
        if start > end {
            return Err(ParseError::BadOffset);
        }
        Ok(usize::try_from(start)?..usize::try_from(end)?)
    }
}

impl<'a> LocaOffsets<'a> {
    /// Iterate the offsets in this table.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Returns the number of offsets in the table.
    pub fn len(&self) -> usize {
        match self {
            LocaOffsets::Short(array) => array.len(),
            LocaOffsets::Long(array) => array.len(),
        }
    }

    /// Get a specified offset from the table at `index`.
    pub fn get(&self, index: usize) -> Option<u32> {
        match self {
            LocaOffsets::Short(array) => array.get_item(index).map(|offset| u32::from(offset) * 2),
            LocaOffsets::Long(array) => array.get_item(index),
        }
    }
}

pub mod owned {
    use std::convert::TryFrom;

    use super::{IndexToLocFormat, U16Be, U32Be};
    use crate::binary::write::{WriteBinary, WriteBinaryDep, WriteContext};
    use crate::error::WriteError;

    /// A `loca` table under construction.
    #[derive(Debug, Default)]
    pub struct LocaTable {
        pub offsets: Vec<u32>,
    }

    impl LocaTable {
        pub fn new() -> Self {
            LocaTable {
                offsets: Vec::new(),
            }
        }

        /// Record `offset` for every slot up to and including glyph `index`.
        ///
        /// Slots of glyphs that were skipped get the same offset, making them empty.
        pub fn fill_to(&mut self, index: u16, offset: u32) {
            while self.offsets.len() <= usize::from(index) {
                self.offsets.push(offset);
            }
        }
    }

    impl WriteBinaryDep<Self> for LocaTable {
        type Output = ();
        type Args = IndexToLocFormat;

        fn write_dep<C: WriteContext>(
            ctxt: &mut C,
            loca: LocaTable,
            index_to_loc_format: Self::Args,
        ) -> Result<(), WriteError> {
            // 0 for short offsets (Offset16), 1 for long (Offset32).
            match index_to_loc_format {
                IndexToLocFormat::Short => {
                    // The actual loca offset divided by 2 is stored.
                    // https://docs.microsoft.com/en-us/typography/opentype/spec/loca#short-version
                    for offset in loca.offsets {
                        if offset & 1 == 1 {
                            // odd offsets can't use this format
                            return Err(WriteError::BadValue);
                        }
                        let short_offset = u16::try_from(offset / 2)?;
                        U16Be::write(ctxt, short_offset)?;
                    }

                    Ok(())
                }
                IndexToLocFormat::Long => ctxt.write_vec::<U32Be, _>(loca.offsets),
            }
        }
    }
}
