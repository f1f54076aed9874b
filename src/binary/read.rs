#![allow(missing_docs)]

//! Parse binary data
//!
//! All font parsing in this crate goes through the types in this module. A `ReadScope` is a
//! bounded view of some bytes, a `ReadCtxt` is a cursor over a scope. Every read is checked
//! against the end of the scope it is made from, so malformed offsets and lengths surface as
//! `ParseError` values instead of out-of-bounds accesses.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder};

use crate::binary::{I16Be, I32Be, I64Be, U16Be, U32Be, I8, U8};
use crate::error::ParseError;
use crate::size;

#[derive(Debug, Copy, Clone)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    base: usize,
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

pub trait ReadBinary {
    type HostType<'a>: Sized; // default = Self

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized; // default = Self

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

/// Values that always occupy `SIZE` bytes.
pub trait ReadFixed {
    type HostType: Sized; // default = Self

    /// The number of bytes consumed by `read_fixed`.
    const SIZE: usize;

    /// Reads exactly `SIZE` bytes, or fails without consuming anything useful.
    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<Self::HostType, ReadEof>;
}

pub trait ReadFrom {
    type ReadType: ReadFixed;
    fn read_from(value: <Self::ReadType as ReadFixed>::HostType) -> Self;
}

impl<T> ReadFixed for T
where
    T: ReadFrom,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<Self::HostType, ReadEof> {
        T::ReadType::read_fixed(ctxt).map(T::read_from)
    }
}

impl<T> ReadBinary for T
where
    T: ReadFixed,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        Ok(T::read_fixed(ctxt)?)
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'_>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

/// A lazily decoded array of fixed size values.
pub struct ReadArray<'a, T: ReadFixed> {
    scope: ReadScope<'a>,
    length: usize,
    phantom: PhantomData<T>,
}

pub struct ReadArrayIter<'a, T: ReadFixed> {
    array: ReadArray<'a, T>,
    index: usize,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        let base = 0;
        ReadScope { base, data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The offset of this scope from the start of the data it was created from.
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        let base = self.base + offset;
        let data = self.data.get(offset..).unwrap_or(&[]);
        ReadScope { base, data }
    }

    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        if offset < self.data.len() || length == 0 {
            let data = self.data.get(offset..).unwrap_or(&[]);
            match data.get(..length) {
                Some(data) => Ok(ReadScope {
                    base: self.base + offset,
                    data,
                }),
                None => Err(ParseError::BadEof),
            }
        } else {
            Err(ParseError::BadOffset)
        }
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt::new(*self)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }
}

impl<'a> ReadCtxt<'a> {
    /// ReadCtxt is constructed by calling `ReadScope::ctxt`.
    fn new(scope: ReadScope<'a>) -> ReadCtxt<'a> {
        ReadCtxt { scope, offset: 0 }
    }

    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadValue),
        }
    }

    /// Check a condition, returning `ParseError::BadVersion` if `false`.
    ///
    /// Intended for use in checking versions read from data. Example:
    ///
    /// ```
    /// use ttsubset::binary::read::ReadScope;
    /// use ttsubset::error::ParseError;
    ///
    /// let scope = ReadScope::new(&[0, 2]);
    /// let mut ctxt = scope.ctxt();
    /// let major_version = ctxt.read_u16be().expect("unable to read version");
    ///
    /// assert!(ctxt.check_version(major_version == 2).is_ok());
    /// assert_eq!(ctxt.check_version(major_version == 1), Err(ParseError::BadVersion));
    /// ```
    pub fn check_version(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadVersion),
        }
    }

    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    pub fn bytes_available(&self) -> bool {
        self.offset < self.scope.data.len()
    }

    /// Consume the next `length` bytes.
    fn take(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        let end = self.offset.checked_add(length).ok_or(ReadEof {})?;
        let bytes = self.scope.data.get(self.offset..end).ok_or(ReadEof {})?;
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadEof> {
        self.take(size::U8).map(|bytes| bytes[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadEof> {
        self.read_u8().map(|byte| byte as i8)
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        self.take(size::U16).map(BigEndian::read_u16)
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        self.take(size::I16).map(BigEndian::read_i16)
    }

    pub fn read_u32be(&mut self) -> Result<u32, ReadEof> {
        self.take(size::U32).map(BigEndian::read_u32)
    }

    pub fn read_i32be(&mut self) -> Result<i32, ReadEof> {
        self.take(size::I32).map(BigEndian::read_i32)
    }

    pub fn read_i64be(&mut self) -> Result<i64, ReadEof> {
        self.take(size::I64).map(BigEndian::read_i64)
    }

    pub fn read_array<T: ReadFixed>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_length = length
            .checked_mul(T::SIZE)
            .ok_or(ParseError::LimitExceeded)?;
        let scope = self.read_scope(byte_length)?;
        Ok(ReadArray {
            scope,
            length,
            phantom: PhantomData,
        })
    }

    pub fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        match self.scope.offset_length(self.offset, length) {
            Ok(scope) => {
                self.offset += length;
                Ok(scope)
            }
            Err(_) => Err(ReadEof {}),
        }
    }

    pub fn read_slice(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        let scope = self.read_scope(length)?;
        Ok(scope.data)
    }
}

impl<'a, T: ReadFixed> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Read the item at `index`, returning `ParseError::BadIndex` if it is out of range.
    pub fn read_item(&self, index: usize) -> Result<T::HostType, ParseError> {
        self.get_item(index).ok_or(ParseError::BadIndex)
    }

    pub fn get_item(&self, index: usize) -> Option<T::HostType> {
        if index < self.length {
            let mut ctxt = self.scope.offset(index * T::SIZE).ctxt();
            T::read_fixed(&mut ctxt).ok()
        } else {
            None
        }
    }

    pub fn to_vec(&self) -> Vec<T::HostType> {
        self.iter().collect()
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T> {
        ReadArrayIter {
            array: self.clone(),
            index: 0,
        }
    }

    // This is derived from the function on slice in the standard library
    pub fn binary_search_by<F>(&self, mut f: F) -> Result<usize, usize>
    where
        F: FnMut(T::HostType) -> Ordering,
    {
        // INVARIANTS:
        // - 0 <= left <= left + size = right <= self.len()
        // - f returns Less for everything in self[..left]
        // - f returns Greater for everything in self[right..]
        let mut size = self.len();
        let mut left = 0;
        let mut right = size;
        while left < right {
            let mid = left + size / 2;
            let Some(item) = self.get_item(mid) else {
                return Err(left);
            };
            let cmp = f(item);

            if cmp == Ordering::Less {
                left = mid + 1;
            } else if cmp == Ordering::Greater {
                right = mid;
            } else {
                return Ok(mid);
            }

            size = right - left;
        }

        Err(left)
    }
}

impl<'a, T: ReadFixed> Clone for ReadArray<'a, T> {
    fn clone(&self) -> Self {
        ReadArray {
            scope: self.scope,
            length: self.length,
            phantom: PhantomData,
        }
    }
}

impl<'a, 'b, T: ReadFixed> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;
    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadFixed> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        let item = self.array.get_item(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.array.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<'a, T: ReadFixed> ExactSizeIterator for ReadArrayIter<'a, T> {}

impl ReadFixed for U8 {
    type HostType = u8;

    const SIZE: usize = size::U8;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<u8, ReadEof> {
        ctxt.read_u8()
    }
}

impl ReadFixed for I8 {
    type HostType = i8;

    const SIZE: usize = size::I8;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<i8, ReadEof> {
        ctxt.read_i8()
    }
}

impl ReadFixed for U16Be {
    type HostType = u16;

    const SIZE: usize = size::U16;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<u16, ReadEof> {
        ctxt.read_u16be()
    }
}

impl ReadFixed for I16Be {
    type HostType = i16;

    const SIZE: usize = size::I16;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<i16, ReadEof> {
        ctxt.read_i16be()
    }
}

impl ReadFixed for U32Be {
    type HostType = u32;

    const SIZE: usize = size::U32;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<u32, ReadEof> {
        ctxt.read_u32be()
    }
}

impl ReadFixed for I32Be {
    type HostType = i32;

    const SIZE: usize = size::I32;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<i32, ReadEof> {
        ctxt.read_i32be()
    }
}

impl ReadFixed for I64Be {
    type HostType = i64;

    const SIZE: usize = size::I64;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<i64, ReadEof> {
        ctxt.read_i64be()
    }
}

impl<T1, T2> ReadFixed for (T1, T2)
where
    T1: ReadFixed,
    T2: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<Self::HostType, ReadEof> {
        let t1 = T1::read_fixed(ctxt)?;
        let t2 = T2::read_fixed(ctxt)?;
        Ok((t1, t2))
    }
}

impl<T1, T2, T3> ReadFixed for (T1, T2, T3)
where
    T1: ReadFixed,
    T2: ReadFixed,
    T3: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType, T3::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE + T3::SIZE;

    fn read_fixed(ctxt: &mut ReadCtxt<'_>) -> Result<Self::HostType, ReadEof> {
        let t1 = T1::read_fixed(ctxt)?;
        let t2 = T2::read_fixed(ctxt)?;
        let t3 = T3::read_fixed(ctxt)?;
        Ok((t1, t2, t3))
    }
}

impl<'a, T> fmt::Debug for ReadArray<'a, T>
where
    T: ReadFixed,
    T::HostType: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list().entries(self.iter()).finish()
    }
}
