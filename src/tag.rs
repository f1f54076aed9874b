//! Font table tags.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Generate a 4-byte font table tag from byte string
///
/// `tag!(b"glyf")` evaluates to `0x676C7966`.
macro_rules! tag {
    ($w:expr) => {
        tag(*$w)
    };
}

/// Wrapper type for a tag that implements `Display`
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

const fn tag(chars: [u8; 4]) -> u32 {
    ((chars[3] as u32) << 0)
        | ((chars[2] as u32) << 8)
        | ((chars[1] as u32) << 16)
        | ((chars[0] as u32) << 24)
}

/// Parse a tag from a string of up to four ASCII characters, padding with spaces.
pub fn from_string(s: &str) -> Result<u32, ParseError> {
    if s.len() > 4 {
        return Err(ParseError::BadValue);
    }

    let mut tag: u32 = 0;
    let mut count = 0;

    for c in s.chars() {
        if !c.is_ascii() || c.is_ascii_control() {
            return Err(ParseError::BadValue);
        }

        tag = (tag << 8) | (c as u32);
        count += 1;
    }

    while count < 4 {
        tag = (tag << 8) | (' ' as u32);
        count += 1;
    }

    Ok(tag)
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.0;
        let mut s = String::with_capacity(4);
        s.push(char::from((tag >> 24) as u8));
        s.push(char::from(((tag >> 16) & 255) as u8));
        s.push(char::from(((tag >> 8) & 255) as u8));
        s.push(char::from((tag & 255) as u8));
        if s.chars().any(|c| !c.is_ascii() || c.is_ascii_control()) {
            write!(f, "0x{:08x}", tag)
        } else {
            s.fmt(f)
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_string().fmt(f)
    }
}

pub const CMAP: u32 = tag!(b"cmap");
pub const CVT: u32 = tag!(b"cvt ");
pub const FPGM: u32 = tag!(b"fpgm");
pub const GLYF: u32 = tag!(b"glyf");
pub const HEAD: u32 = tag!(b"head");
pub const HHEA: u32 = tag!(b"hhea");
pub const HMTX: u32 = tag!(b"hmtx");
pub const LOCA: u32 = tag!(b"loca");
pub const MAXP: u32 = tag!(b"maxp");
pub const NAME: u32 = tag!(b"name");
pub const OS_2: u32 = tag!(b"OS/2");
pub const POST: u32 = tag!(b"post");
pub const PREP: u32 = tag!(b"prep");
/// Apple's alternative sfnt version for TrueType outlines.
pub const TRUE: u32 = tag!(b"true");

/// The tables understood by the subsetter.
///
/// The declaration order is the order tables are written to the table directory and to the
/// table data of an output font.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableTag {
    Maxp,
    Cmap,
    Loca,
    Head,
    Glyf,
    Name,
    Os2,
    Cvt,
    Fpgm,
    Prep,
    Hhea,
    Hmtx,
    Post,
}

impl TableTag {
    /// Every table tag in output order.
    pub const ALL: [TableTag; 13] = [
        TableTag::Maxp,
        TableTag::Cmap,
        TableTag::Loca,
        TableTag::Head,
        TableTag::Glyf,
        TableTag::Name,
        TableTag::Os2,
        TableTag::Cvt,
        TableTag::Fpgm,
        TableTag::Prep,
        TableTag::Hhea,
        TableTag::Hmtx,
        TableTag::Post,
    ];

    /// The 4-byte tag of this table.
    pub const fn tag(self) -> u32 {
        match self {
            TableTag::Maxp => MAXP,
            TableTag::Cmap => CMAP,
            TableTag::Loca => LOCA,
            TableTag::Head => HEAD,
            TableTag::Glyf => GLYF,
            TableTag::Name => NAME,
            TableTag::Os2 => OS_2,
            TableTag::Cvt => CVT,
            TableTag::Fpgm => FPGM,
            TableTag::Prep => PREP,
            TableTag::Hhea => HHEA,
            TableTag::Hmtx => HMTX,
            TableTag::Post => POST,
        }
    }

    pub fn from_tag(tag: u32) -> Option<TableTag> {
        match tag {
            MAXP => Some(TableTag::Maxp),
            CMAP => Some(TableTag::Cmap),
            LOCA => Some(TableTag::Loca),
            HEAD => Some(TableTag::Head),
            GLYF => Some(TableTag::Glyf),
            NAME => Some(TableTag::Name),
            OS_2 => Some(TableTag::Os2),
            CVT => Some(TableTag::Cvt),
            FPGM => Some(TableTag::Fpgm),
            PREP => Some(TableTag::Prep),
            HHEA => Some(TableTag::Hhea),
            HMTX => Some(TableTag::Hmtx),
            POST => Some(TableTag::Post),
            _ => None,
        }
    }

    /// `cvt`, `fpgm` and `prep` may be absent from a font, all other tables must be present.
    pub fn is_required(self) -> bool {
        !matches!(self, TableTag::Cvt | TableTag::Fpgm | TableTag::Prep)
    }

    /// The exact length of tables that have a fixed size.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            TableTag::Head => Some(crate::tables::HeadTable::SIZE),
            TableTag::Hhea => Some(crate::tables::HheaTable::SIZE),
            TableTag::Maxp => Some(crate::tables::MaxpTable::SIZE),
            _ => None,
        }
    }
}

impl FromStr for TableTag {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = from_string(s)?;
        TableTag::from_tag(tag).ok_or(ParseError::BadValue)
    }
}

impl fmt::Display for TableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        DisplayTag(self.tag()).fmt(f)
    }
}
