#![deny(missing_docs)]

//! Checksum calculation routines.

use std::num::Wrapping;

use crate::binary::read::ReadScope;
use crate::binary::U32Be;
use crate::error::ParseError;
use crate::size;

/// The value the checksum of a whole font, adjustment included, must sum to.
pub const CHECKSUM_MAGIC: u32 = 0xB1B0AFBA;

/// The `magicNumber` field of the `head` table.
pub const HEAD_MAGIC: u32 = 0x5F0F3CF5;

/// Offset of `checkSumAdjustment` within the `head` table.
pub const HEAD_CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;

/// Calculate a checksum of `data` according to the OpenType table checksum algorithm
///
/// A trailing partial word is treated as if padded with zeros.
///
/// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums
pub fn table_checksum(data: &[u8]) -> Result<Wrapping<u32>, ParseError> {
    let words = data.len() / size::U32;
    let mut ctxt = ReadScope::new(data).ctxt();
    let array = ctxt.read_array::<U32Be>(words)?;
    let sum = array.iter().map(Wrapping).sum::<Wrapping<u32>>();

    let tail = &data[words * size::U32..];
    if tail.is_empty() {
        Ok(sum)
    } else {
        let mut last = [0; 4];
        last[..tail.len()].copy_from_slice(tail);
        Ok(sum + Wrapping(u32::from_be_bytes(last)))
    }
}

/// Calculate the checksum of `data` with the four bytes at `skip_offset` treated as zero.
///
/// Used to sum a whole font without its `checkSumAdjustment`.
pub fn checksum_skipping(data: &[u8], skip_offset: usize) -> Result<Wrapping<u32>, ParseError> {
    let sum = table_checksum(data)?;
    let end = skip_offset + size::U32;
    match data.get(skip_offset..end) {
        // The skipped word is aligned when it is an aligned field of an aligned table
        Some(skipped) if skip_offset % 4 == 0 => Ok(sum - table_checksum(skipped)?),
        Some(_) => Err(ParseError::BadOffset),
        None => Err(ParseError::BadEof),
    }
}

/// Calculate the checksum of a `head` table, excluding `checkSumAdjustment`.
pub fn head_checksum(data: &[u8]) -> Result<Wrapping<u32>, ParseError> {
    checksum_skipping(data, HEAD_CHECKSUM_ADJUSTMENT_OFFSET)
}

/// Calculate the value of `checkSumAdjustment` for a whole font.
///
/// `head_offset` is the file offset of the `head` table; its current adjustment is ignored.
pub fn checksum_adjustment(font: &[u8], head_offset: usize) -> Result<u32, ParseError> {
    let sum = checksum_skipping(font, head_offset + HEAD_CHECKSUM_ADJUSTMENT_OFFSET)?;
    Ok((Wrapping(CHECKSUM_MAGIC) - sum).0)
}
