//! Parsing of the `glyf` table.
//!
//! > This table contains information that describes the glyphs in the font in the TrueType outline
//! > format. Information regarding the rasterizer (scaler) refers to the TrueType rasterizer.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/glyf>
//!
//! Glyphs are copied into a subset font byte for byte, so only the glyph header and the component
//! records of composite glyphs are decoded.

use bitflags::bitflags;

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be};
use crate::error::ParseError;
use crate::tables::F2Dot14;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompositeGlyphFlag: u16 {
        /// Bit 0: If this is set, the arguments are 16-bit (uint16 or int16); otherwise, they are
        /// bytes (uint8 or int8).
        const ARG_1_AND_2_ARE_WORDS = 0x0001;
        /// Bit 1: If this is set, the arguments are signed xy values; otherwise, they are unsigned
        /// point numbers.
        const ARGS_ARE_XY_VALUES = 0x0002;
        /// Bit 2: For the xy values if the preceding is true.
        const ROUND_XY_TO_GRID = 0x0004;
        /// Bit 3: This indicates that there is a simple scale for the component. Otherwise, scale = 1.0.
        const WE_HAVE_A_SCALE = 0x0008;
        /// Bit 4: Reserved, set to 0
        /// Bit 5: Indicates at least one more glyph after this one.
        const MORE_COMPONENTS = 0x0020;
        /// Bit 6: The x direction will use a different scale from the y direction.
        const WE_HAVE_AN_X_AND_Y_SCALE = 0x0040;
        /// Bit 7: There is a 2 by 2 transformation that will be used to scale the component.
        const WE_HAVE_A_TWO_BY_TWO = 0x0080;
        /// Bit 8: Following the last component are instructions for the composite character.
        const WE_HAVE_INSTRUCTIONS = 0x0100;
        /// Bit 9: If set, this forces the aw and lsb (and rsb) for the composite to be equal to
        /// those from this original glyph.
        const USE_MY_METRICS = 0x0200;
        /// Bit 10: If set, the components of the compound glyph overlap.
        const OVERLAP_COMPOUND = 0x0400;
        /// Bit 11: The composite is designed to have the component offset scaled.
        const SCALED_COMPONENT_OFFSET = 0x0800;
        /// Bit 12: The composite is designed not to have the component offset scaled.
        const UNSCALED_COMPONENT_OFFSET = 0x1000;
        // 0xE010 	Reserved 	Bits 4, 13, 14 and 15 are reserved: set to 0.
    }
}

/// The outline data of one glyph, as stored in the `glyf` table.
///
/// A glyph without outline data (such as a space) has an empty record.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyfRecord<'a> {
    scope: ReadScope<'a>,
}

/// The header that starts every non-empty glyph.
#[derive(Debug, PartialEq, Clone)]
pub struct GlyphHeader {
    pub number_of_contours: i16,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, PartialEq, Clone)]
pub struct BoundingBox {
    pub x_min: i16,
    pub x_max: i16,
    pub y_min: i16,
    pub y_max: i16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyph {
    pub flags: CompositeGlyphFlag,
    pub glyph_index: u16,
    pub argument1: CompositeGlyphArgument,
    pub argument2: CompositeGlyphArgument,
    pub scale: Option<CompositeGlyphScale>,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphArgument {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphScale {
    Scale(F2Dot14),
    XY { x_scale: F2Dot14, y_scale: F2Dot14 },
    Matrix([[F2Dot14; 2]; 2]),
}

/// The chain of component records of a composite glyph.
#[derive(Debug, PartialEq)]
pub struct CompositeGlyphs {
    pub glyphs: Vec<CompositeGlyph>,
    pub have_instructions: bool,
}

impl<'a> GlyfRecord<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        GlyfRecord {
            scope: ReadScope::new(data),
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.scope.data()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.data().is_empty()
    }

    /// Read the glyph header, `None` for an empty glyph.
    pub fn header(&self) -> Result<Option<GlyphHeader>, ParseError> {
        if self.is_empty() {
            return Ok(None);
        }
        self.scope.read::<GlyphHeader>().map(Some)
    }

    /// Composite glyphs have a negative number of contours.
    pub fn is_composite(&self) -> Result<bool, ParseError> {
        Ok(self
            .header()?
            .map_or(false, |header| header.number_of_contours < 0))
    }

    /// Decode the component records of a composite glyph.
    ///
    /// Returns `None` for simple and empty glyphs.
    pub fn composite_glyphs(&self) -> Result<Option<CompositeGlyphs>, ParseError> {
        if !self.is_composite()? {
            return Ok(None);
        }
        let mut ctxt = self.scope.ctxt();
        ctxt.read::<GlyphHeader>()?;
        ctxt.read::<CompositeGlyphs>().map(Some)
    }

    /// The glyph indices this glyph references directly, in the order they appear.
    pub fn component_indices(&self) -> Result<Vec<u16>, ParseError> {
        Ok(self
            .composite_glyphs()?
            .map(|composite| {
                composite
                    .glyphs
                    .iter()
                    .map(|component| component.glyph_index)
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl ReadBinary for GlyphHeader {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let number_of_contours = ctxt.read_i16be()?;
        let bounding_box = ctxt.read::<BoundingBox>()?;

        Ok(GlyphHeader {
            number_of_contours,
            bounding_box,
        })
    }
}

impl ReadBinary for BoundingBox {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let x_min = ctxt.read::<I16Be>()?;
        let y_min = ctxt.read::<I16Be>()?;
        let x_max = ctxt.read::<I16Be>()?;
        let y_max = ctxt.read::<I16Be>()?;

        Ok(BoundingBox {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }
}

impl ReadBinary for CompositeGlyphs {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let mut have_instructions = false;
        let mut glyphs = Vec::new();
        loop {
            let flags = ctxt.read::<CompositeGlyphFlag>()?;
            let data = ctxt.read_dep::<CompositeGlyph>(flags)?;

            if flags.we_have_instructions() {
                have_instructions = true;
            }

            glyphs.push(data);

            if !flags.more_components() {
                break;
            }
        }

        Ok(CompositeGlyphs {
            glyphs,
            have_instructions,
        })
    }
}

impl ReadFrom for CompositeGlyphFlag {
    type ReadType = U16Be;

    fn read_from(flag: u16) -> Self {
        CompositeGlyphFlag::from_bits_truncate(flag)
    }
}

impl ReadBinaryDep for CompositeGlyphArgument {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, flags: Self::Args<'a>) -> Result<Self, ParseError> {
        let arg = match (flags.arg_1_and_2_are_words(), flags.args_are_xy_values()) {
            (true, true) => CompositeGlyphArgument::I16(ctxt.read_i16be()?),
            (true, false) => CompositeGlyphArgument::U16(ctxt.read_u16be()?),
            (false, true) => CompositeGlyphArgument::I8(ctxt.read_i8()?),
            (false, false) => CompositeGlyphArgument::U8(ctxt.read_u8()?),
        };

        Ok(arg)
    }
}

impl ReadBinaryDep for CompositeGlyph {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, flags: Self::Args<'a>) -> Result<Self, ParseError> {
        let glyph_index = ctxt.read_u16be()?;
        let argument1 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;
        let argument2 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;

        let scale = if flags.we_have_a_scale() {
            Some(CompositeGlyphScale::Scale(ctxt.read::<F2Dot14>()?))
        } else if flags.we_have_an_x_and_y_scale() {
            Some(CompositeGlyphScale::XY {
                x_scale: ctxt.read::<F2Dot14>()?,
                y_scale: ctxt.read::<F2Dot14>()?,
            })
        } else if flags.we_have_a_two_by_two() {
            Some(CompositeGlyphScale::Matrix([
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
            ]))
        } else {
            None
        };

        Ok(CompositeGlyph {
            flags,
            glyph_index,
            argument1,
            argument2,
            scale,
        })
    }
}

impl CompositeGlyphFlag {
    pub fn arg_1_and_2_are_words(self) -> bool {
        self.contains(Self::ARG_1_AND_2_ARE_WORDS)
    }

    pub fn args_are_xy_values(self) -> bool {
        self.contains(Self::ARGS_ARE_XY_VALUES)
    }

    pub fn we_have_a_scale(self) -> bool {
        self.contains(Self::WE_HAVE_A_SCALE)
    }

    pub fn we_have_an_x_and_y_scale(self) -> bool {
        self.contains(Self::WE_HAVE_AN_X_AND_Y_SCALE)
    }

    pub fn we_have_a_two_by_two(self) -> bool {
        self.contains(Self::WE_HAVE_A_TWO_BY_TWO)
    }

    pub fn more_components(self) -> bool {
        self.contains(Self::MORE_COMPONENTS)
    }

    pub fn we_have_instructions(self) -> bool {
        self.contains(Self::WE_HAVE_INSTRUCTIONS)
    }
}
