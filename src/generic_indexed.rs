//! `GenericIndexed<T>`: a length-prefixed, offset-indexed array of opaque
//! items, decoded on demand via a pluggable [`ObjectStrategy`].
//!
//! On-disk layout, all integers big-endian:
//!
//! ```text
//! u8  version
//! u8  flags        (bit 0 = sorted, supports binary search)
//! u32 total_bytes   // offsets_size + payload_size
//! u32 count
//! u32 offsets[count]  // end-offset of element i within the payload
//! u8  payload[total_bytes - 4*count]
//! ```
//!
//! Element `i` occupies `payload[offsets[i-1]..offsets[i]]` with
//! `offsets[-1]` taken as 0. There is no per-element length prefix inside
//! the payload; the offsets table is the only delimiter, so decoding never
//! requires scanning.

use std::cmp::Ordering;
use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{ColumnError, Result};
use crate::strategy::ObjectStrategy;

const HEADER_SIZE: usize = 1 + 1 + 4 + 4;
const SORTED_FLAG: u8 = 0b0000_0001;
const VERSION: u8 = 0x0;

/// Zero-copy reader over a `GenericIndexed<T>` block. `data` is exactly the
/// bytes of this block (header + offsets + payload); trailing bytes beyond
/// it, if any, belong to whatever component follows and are ignored here.
#[derive(Debug)]
pub struct GenericIndexed<'a, T, S> {
    data: &'a [u8],
    count: usize,
    sorted: bool,
    values_start: usize,
    _marker: PhantomData<fn() -> (T, S)>,
}

impl<'a, T, S> Clone for GenericIndexed<'a, T, S> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'a, T, S> Copy for GenericIndexed<'a, T, S> {}

impl<'a, T, S> GenericIndexed<'a, T, S>
where
    S: ObjectStrategy<'a, T>,
{
    /// Parse a `GenericIndexed` block starting at `data[0]`. Returns the
    /// accessor and the number of bytes it consumed, so callers can advance
    /// a cursor past it (the format is positional, not tagged).
    pub fn from_bytes(data: &'a [u8]) -> Result<(Self, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(ColumnError::corrupt(format!(
                "GenericIndexed: buffer of {} bytes too short for header ({HEADER_SIZE} needed)",
                data.len()
            )));
        }

        let version = data[0];
        if version != VERSION {
            return Err(ColumnError::corrupt(format!(
                "GenericIndexed: unsupported version {version:#x}"
            )));
        }
        let flags = data[1];
        let sorted = flags & SORTED_FLAG != 0;

        let total_bytes = BigEndian::read_u32(&data[2..6]) as usize;
        let count = BigEndian::read_u32(&data[6..10]) as usize;

        let offsets_size = count
            .checked_mul(4)
            .ok_or_else(|| ColumnError::corrupt("GenericIndexed: offsets size overflow"))?;
        if offsets_size > total_bytes {
            return Err(ColumnError::corrupt(format!(
                "GenericIndexed: offsets size {offsets_size} exceeds total_bytes {total_bytes}"
            )));
        }

        let values_start = HEADER_SIZE + offsets_size;
        let total_size = HEADER_SIZE
            .checked_add(total_bytes)
            .ok_or_else(|| ColumnError::corrupt("GenericIndexed: total size overflow"))?;
        if data.len() < total_size {
            return Err(ColumnError::corrupt(format!(
                "GenericIndexed: buffer of {} bytes shorter than declared size {total_size}",
                data.len()
            )));
        }

        let indexed = GenericIndexed {
            data: &data[..total_size],
            count,
            sorted,
            values_start,
            _marker: PhantomData,
        };
        Ok((indexed, total_size))
    }

    pub fn size(&self) -> usize {
        self.count
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Total bytes this block occupies on disk, including its own header.
    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    fn offset_at(&self, i: usize) -> Result<usize> {
        let pos = HEADER_SIZE + i * 4;
        if pos + 4 > self.values_start {
            return Err(ColumnError::corrupt(format!(
                "GenericIndexed: offset index {i} out of bounds"
            )));
        }
        Ok(BigEndian::read_u32(&self.data[pos..pos + 4]) as usize)
    }

    fn element_range(&self, i: usize) -> Result<(usize, usize)> {
        if i >= self.count {
            return Err(ColumnError::corrupt(format!(
                "GenericIndexed: index {i} out of range (len {})",
                self.count
            )));
        }
        let start = if i == 0 { 0 } else { self.offset_at(i - 1)? };
        let end = self.offset_at(i)?;
        if end < start {
            return Err(ColumnError::corrupt(format!(
                "GenericIndexed: non-monotonic offsets at index {i}"
            )));
        }
        let payload_len = self.data.len() - self.values_start;
        if end > payload_len {
            return Err(ColumnError::corrupt(format!(
                "GenericIndexed: element {i} range [{start}, {end}) exceeds payload of {payload_len} bytes"
            )));
        }
        Ok((start, end))
    }

    /// Raw bytes of element `i`, with no strategy decoding applied.
    pub fn get_raw(&self, i: usize) -> Result<&'a [u8]> {
        let (start, end) = self.element_range(i)?;
        Ok(&self.data[self.values_start + start..self.values_start + end])
    }

    pub fn get(&self, i: usize) -> Result<T> {
        S::decode(self.get_raw(i)?)
    }

    pub fn iter(&self) -> GenericIndexedIter<'a, T, S> {
        GenericIndexedIter {
            indexed: *self,
            next: 0,
        }
    }

    /// Binary search for `key`'s raw bytes among a sorted `GenericIndexed`.
    /// Returns `Ok(i)` on an exact hit, `Err(insertion_point)` on a miss,
    /// the same convention as [`slice::binary_search`].
    pub fn index_of_raw(&self, key: &[u8]) -> Result<std::result::Result<usize, usize>> {
        debug_assert!(self.sorted, "index_of called on an unsorted GenericIndexed");
        let mut lo = 0usize;
        let mut hi = self.count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let candidate = self.get_raw(mid)?;
            match S::compare(candidate, key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(lo))
    }
}

pub struct GenericIndexedIter<'a, T, S> {
    indexed: GenericIndexed<'a, T, S>,
    next: usize,
}

impl<'a, T, S> Iterator for GenericIndexedIter<'a, T, S>
where
    S: ObjectStrategy<'a, T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.indexed.count {
            return None;
        }
        let item = self.indexed.get(self.next);
        self.next += 1;
        Some(item)
    }
}

/// Write-side counterpart: accumulates encoded items and emits the exact
/// layout [`GenericIndexed::from_bytes`] parses.
pub struct GenericIndexedBuilder<T, S> {
    sorted: bool,
    offsets: Vec<u32>,
    payload: Vec<u8>,
    _marker: PhantomData<fn(T, S)>,
}

impl<T, S> GenericIndexedBuilder<T, S> {
    pub fn new(sorted: bool) -> Self {
        Self {
            sorted,
            offsets: Vec::new(),
            payload: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl<'a, T, S> GenericIndexedBuilder<T, S>
where
    S: ObjectStrategy<'a, T>,
{
    pub fn push(&mut self, value: &T) {
        S::encode_into(value, &mut self.payload);
        self.offsets.push(self.payload.len() as u32);
    }

    pub fn serialized_size(&self) -> usize {
        HEADER_SIZE + self.offsets.len() * 4 + self.payload.len()
    }

    pub fn write_to(&self, sink: &mut Vec<u8>) {
        let count = self.offsets.len() as u32;
        let total_bytes = (self.offsets.len() * 4 + self.payload.len()) as u32;
        let flags = if self.sorted { SORTED_FLAG } else { 0 };

        sink.push(VERSION);
        sink.push(flags);
        let mut buf4 = [0u8; 4];
        BigEndian::write_u32(&mut buf4, total_bytes);
        sink.extend_from_slice(&buf4);
        BigEndian::write_u32(&mut buf4, count);
        sink.extend_from_slice(&buf4);
        for off in &self.offsets {
            BigEndian::write_u32(&mut buf4, *off);
            sink.extend_from_slice(&buf4);
        }
        sink.extend_from_slice(&self.payload);
    }
}
