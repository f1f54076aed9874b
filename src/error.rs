//! Error types
//!
//! Every public operation returns [`SubsetError`]. It separates malformed fonts
//! ([`SubsetError::InvalidInput`]) from misuse of the reader and writer
//! ([`SubsetError::Internal`]) and from failures of the underlying stream ([`SubsetError::Io`]).
//! The lower level `ParseError` and `WriteError` come from the binary codec.

use std::fmt;
use std::io;

use crate::binary::read::ReadEof;
use crate::font_reader::Diagnostic;
use crate::tag::DisplayTag;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    LimitExceeded,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
    PlaceholderMismatch,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
            WriteError::PlaceholderMismatch => {
                write!(f, "data written to placeholder did not match expected size")
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// The font data is malformed or unsuitable for subsetting.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum InvalidInputError {
    Parse(ParseError),
    /// The sfnt version is not TrueType.
    BadMagic,
    MissingTable(u32),
    ZeroLengthTable(u32),
    TableSize {
        tag: u32,
        expected: usize,
        actual: usize,
    },
    InconsistentLoca,
    UnsupportedNameFormat(u16),
    MissingPostscriptName,
    InvalidPostscriptName(String),
    /// A checksum mismatch reported with `Severity::Error`.
    ChecksumMismatch(Diagnostic),
}

/// A broken invariant in how the reader or writer was driven.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum InternalError {
    DuplicateGlyph(u16),
    GlyphOutOfRange { index: u16, num_glyphs: u16 },
    /// `FontWriter::output` was called without any glyphs.
    NoGlyphs,
    /// `glyf`, `loca` and `cmap` are synthesised by the writer.
    ReservedTable(u32),
    /// A table the writer needs was never supplied.
    MissingTable(u32),
    MissingCmapSubtable,
    Write(WriteError),
}

/// Error returned from reading, writing and subsetting fonts
#[derive(Debug)]
pub enum SubsetError {
    InvalidInput(InvalidInputError),
    Internal(InternalError),
    Io {
        context: String,
        source: io::Error,
    },
}

impl SubsetError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        SubsetError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<ParseError> for SubsetError {
    fn from(error: ParseError) -> Self {
        SubsetError::InvalidInput(InvalidInputError::Parse(error))
    }
}

impl From<ReadEof> for SubsetError {
    fn from(error: ReadEof) -> Self {
        SubsetError::from(ParseError::from(error))
    }
}

impl From<WriteError> for SubsetError {
    fn from(error: WriteError) -> Self {
        SubsetError::Internal(InternalError::Write(error))
    }
}

impl From<InvalidInputError> for SubsetError {
    fn from(error: InvalidInputError) -> Self {
        SubsetError::InvalidInput(error)
    }
}

impl From<InternalError> for SubsetError {
    fn from(error: InternalError) -> Self {
        SubsetError::Internal(error)
    }
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidInputError::Parse(err) => write!(f, "parse: {}", err),
            InvalidInputError::BadMagic => write!(f, "not a TrueType font"),
            InvalidInputError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
            InvalidInputError::ZeroLengthTable(tag) => {
                write!(f, "'{}' table has zero length", DisplayTag(*tag))
            }
            InvalidInputError::TableSize {
                tag,
                expected,
                actual,
            } => write!(
                f,
                "'{}' table is {} bytes, expected {}",
                DisplayTag(*tag),
                actual,
                expected
            ),
            InvalidInputError::InconsistentLoca => write!(f, "inconsistent loca table"),
            InvalidInputError::UnsupportedNameFormat(format) => {
                write!(f, "unsupported name table format {}", format)
            }
            InvalidInputError::MissingPostscriptName => write!(f, "no postscript name"),
            InvalidInputError::InvalidPostscriptName(name) => {
                write!(f, "invalid postscript name {:?}", name)
            }
            InvalidInputError::ChecksumMismatch(diagnostic) => diagnostic.fmt(f),
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::DuplicateGlyph(index) => write!(f, "glyph {} added twice", index),
            InternalError::GlyphOutOfRange { index, num_glyphs } => write!(
                f,
                "glyph {} out of range, font has {} glyphs",
                index, num_glyphs
            ),
            InternalError::NoGlyphs => write!(f, "no glyphs were added"),
            InternalError::ReservedTable(tag) => {
                write!(f, "'{}' table is built by the writer", DisplayTag(*tag))
            }
            InternalError::MissingTable(tag) => {
                write!(f, "'{}' table was not supplied", DisplayTag(*tag))
            }
            InternalError::MissingCmapSubtable => write!(f, "no format 4 unicode cmap subtable"),
            InternalError::Write(err) => err.fmt(f),
        }
    }
}

impl fmt::Display for SubsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsetError::InvalidInput(err) => write!(f, "invalid font: {}", err),
            SubsetError::Internal(err) => write!(f, "internal error: {}", err),
            SubsetError::Io { context, source } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for InvalidInputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvalidInputError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for InternalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InternalError::Write(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for SubsetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubsetError::InvalidInput(err) => Some(err),
            SubsetError::Internal(err) => Some(err),
            SubsetError::Io { source, .. } => Some(source),
        }
    }
}
