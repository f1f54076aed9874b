//! Sizes in bytes of the binary types read and written.

use std::mem;

pub const U8: usize = mem::size_of::<u8>();
pub const I8: usize = mem::size_of::<i8>();
pub const U16: usize = mem::size_of::<u16>();
pub const I16: usize = mem::size_of::<i16>();
pub const U32: usize = mem::size_of::<u32>();
pub const I32: usize = mem::size_of::<i32>();
pub const I64: usize = mem::size_of::<i64>();

/// An `advanceWidth` and `lsb` pair in `hmtx`.
pub const LONG_HOR_METRIC: usize = U16 + I16;
