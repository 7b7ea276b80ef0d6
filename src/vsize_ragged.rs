//! `VSizeRagged`: a packed ragged list-of-lists of ids, used for
//! multi-valued row storage.
//!
//! On-disk layout, big-endian:
//!
//! ```text
//! u8  version
//! u8  offsets_width
//! u8  values_width
//! u32 num_rows
//! u8  offsets_payload[(num_rows + 1) * offsets_width]
//! u32 values_bytes
//! u8  values_payload[values_bytes]
//! ```
//!
//! Row `r` occupies `values_payload[offsets[r]..offsets[r+1])`, itself a
//! `values_width`-packed array of ids. `offsets[0] == 0`, the table is
//! monotonic non-decreasing, and `offsets[num_rows] == values_bytes`.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{ColumnError, Result};
use crate::vsize_ints::width_for_max_id;

const VERSION: u8 = 0x0;
const HEADER_SIZE: usize = 1 + 1 + 1 + 4;

#[derive(Debug, Clone, Copy)]
pub struct VSizeRagged<'a> {
    offsets: &'a [u8],
    offsets_width: usize,
    values: &'a [u8],
    values_width: usize,
    num_rows: usize,
}

fn read_be_uint(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf[4 - bytes.len()..].copy_from_slice(bytes);
    BigEndian::read_u32(&buf)
}

fn write_be_uint(value: u32, width: usize, sink: &mut Vec<u8>) {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    sink.extend_from_slice(&buf[4 - width..]);
}

impl<'a> VSizeRagged<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<(Self, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(ColumnError::corrupt(format!(
                "VSizeRagged: buffer of {} bytes too short for header",
                data.len()
            )));
        }
        let version = data[0];
        if version != VERSION {
            return Err(ColumnError::corrupt(format!(
                "VSizeRagged: unsupported version {version:#x}"
            )));
        }
        let offsets_width = data[1] as usize;
        let values_width = data[2] as usize;
        if !(1..=4).contains(&offsets_width) || !(1..=4).contains(&values_width) {
            return Err(ColumnError::corrupt(
                "VSizeRagged: illegal width, must be 1..=4",
            ));
        }
        let num_rows = BigEndian::read_u32(&data[3..7]) as usize;

        let offsets_count = num_rows
            .checked_add(1)
            .ok_or_else(|| ColumnError::corrupt("VSizeRagged: num_rows overflow"))?;
        let offsets_payload_len = offsets_count
            .checked_mul(offsets_width)
            .ok_or_else(|| ColumnError::corrupt("VSizeRagged: offsets payload overflow"))?;
        let offsets_start = HEADER_SIZE;
        let offsets_end = offsets_start
            .checked_add(offsets_payload_len)
            .ok_or_else(|| ColumnError::corrupt("VSizeRagged: offsets end overflow"))?;
        if data.len() < offsets_end + 4 {
            return Err(ColumnError::corrupt(format!(
                "VSizeRagged: buffer of {} bytes too short for offsets table",
                data.len()
            )));
        }

        let values_bytes = BigEndian::read_u32(&data[offsets_end..offsets_end + 4]) as usize;
        let values_start = offsets_end + 4;
        let values_end = values_start
            .checked_add(values_bytes)
            .ok_or_else(|| ColumnError::corrupt("VSizeRagged: values end overflow"))?;
        if data.len() < values_end {
            return Err(ColumnError::corrupt(format!(
                "VSizeRagged: buffer of {} bytes shorter than declared size {values_end}",
                data.len()
            )));
        }

        let ragged = VSizeRagged {
            offsets: &data[offsets_start..offsets_end],
            offsets_width,
            values: &data[values_start..values_end],
            values_width,
            num_rows,
        };

        let first = ragged.offset_at(0)?;
        if first != 0 {
            return Err(ColumnError::corrupt("VSizeRagged: offsets[0] must be 0"));
        }
        let last = ragged.offset_at(num_rows)?;
        if last as usize != values_bytes {
            return Err(ColumnError::corrupt(
                "VSizeRagged: offsets[num_rows] must equal values_bytes",
            ));
        }

        Ok((ragged, values_end))
    }

    fn offset_at(&self, i: usize) -> Result<u32> {
        let start = i * self.offsets_width;
        if start + self.offsets_width > self.offsets.len() {
            return Err(ColumnError::corrupt(format!(
                "VSizeRagged: offset index {i} out of bounds"
            )));
        }
        Ok(read_be_uint(&self.offsets[start..start + self.offsets_width]))
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Ids of row `r`, in insertion order. Never deduplicated: row order is
    /// part of the contract.
    pub fn get(&self, r: usize) -> Result<VSizeRaggedRow<'a>> {
        if r >= self.num_rows {
            return Err(ColumnError::corrupt(format!(
                "VSizeRagged: row {r} out of range (num_rows {})",
                self.num_rows
            )));
        }
        let start = self.offset_at(r)? as usize;
        let end = self.offset_at(r + 1)? as usize;
        if end < start {
            return Err(ColumnError::corrupt(format!(
                "VSizeRagged: non-monotonic offsets around row {r}"
            )));
        }
        if end > self.values.len() {
            return Err(ColumnError::corrupt(format!(
                "VSizeRagged: row {r} range [{start}, {end}) exceeds values payload"
            )));
        }
        Ok(VSizeRaggedRow {
            data: &self.values[start..end],
            width: self.values_width,
        })
    }
}

/// A single row's packed ids; iterate without allocating.
#[derive(Debug, Clone, Copy)]
pub struct VSizeRaggedRow<'a> {
    data: &'a [u8],
    width: usize,
}

impl<'a> VSizeRaggedRow<'a> {
    pub fn len(&self) -> usize {
        self.data.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, i: usize) -> u32 {
        let start = i * self.width;
        read_be_uint(&self.data[start..start + self.width])
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + 'a {
        let data = self.data;
        let width = self.width;
        (0..data.len() / width).map(move |i| {
            let start = i * width;
            read_be_uint(&data[start..start + width])
        })
    }
}

pub struct VSizeRaggedBuilder {
    offsets_width: usize,
    values_width: usize,
    offsets: Vec<u32>,
    values: Vec<u8>,
}

impl VSizeRaggedBuilder {
    /// `max_id` bounds the per-value width; `max_values_bytes` bounds the
    /// offsets width (it must be able to index the whole concatenated
    /// values payload).
    pub fn new(max_id: u32, max_values_bytes: u32) -> Self {
        let mut offsets = Vec::new();
        offsets.push(0u32);
        Self {
            offsets_width: width_for_max_id(max_values_bytes) as usize,
            values_width: width_for_max_id(max_id) as usize,
            offsets,
            values: Vec::new(),
        }
    }

    /// Append one row's ids.
    pub fn push_row<I: IntoIterator<Item = u32>>(&mut self, ids: I) {
        for id in ids {
            write_be_uint(id, self.values_width, &mut self.values);
        }
        self.offsets.push(self.values.len() as u32);
    }

    pub fn num_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn serialized_size(&self) -> usize {
        HEADER_SIZE + self.offsets.len() * self.offsets_width + 4 + self.values.len()
    }

    pub fn write_to(&self, sink: &mut Vec<u8>) {
        sink.push(VERSION);
        sink.push(self.offsets_width as u8);
        sink.push(self.values_width as u8);
        let mut buf4 = [0u8; 4];
        BigEndian::write_u32(&mut buf4, self.num_rows() as u32);
        sink.extend_from_slice(&buf4);
        for &off in &self.offsets {
            write_be_uint(off, self.offsets_width, sink);
        }
        BigEndian::write_u32(&mut buf4, self.values.len() as u32);
        sink.extend_from_slice(&buf4);
        sink.extend_from_slice(&self.values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ragged_rows() {
        let rows: Vec<Vec<u32>> = vec![vec![0, 1], vec![], vec![2], vec![0, 0]];
        let mut builder = VSizeRaggedBuilder::new(2, 64);
        for row in &rows {
            builder.push_row(row.iter().copied());
        }
        let mut bytes = Vec::new();
        builder.write_to(&mut bytes);
        assert_eq!(bytes.len(), builder.serialized_size());

        let (ragged, consumed) = VSizeRagged::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(ragged.num_rows(), 4);
        for (r, expected) in rows.iter().enumerate() {
            let got: Vec<u32> = ragged.get(r).unwrap().iter().collect();
            assert_eq!(&got, expected);
        }
    }

    #[test]
    fn preserves_duplicate_ids_in_order() {
        let mut builder = VSizeRaggedBuilder::new(5, 64);
        builder.push_row([3, 3, 1, 3]);
        let mut bytes = Vec::new();
        builder.write_to(&mut bytes);
        let (ragged, _) = VSizeRagged::from_bytes(&bytes).unwrap();
        let got: Vec<u32> = ragged.get(0).unwrap().iter().collect();
        assert_eq!(got, vec![3, 3, 1, 3]);
    }

    #[test]
    fn truncated_buffer_is_corrupt() {
        let mut builder = VSizeRaggedBuilder::new(2, 64);
        builder.push_row([0, 1]);
        builder.push_row([]);
        let mut bytes = Vec::new();
        builder.write_to(&mut bytes);
        let truncated = &bytes[..bytes.len() - 1];
        assert!(VSizeRagged::from_bytes(truncated).is_err());
    }
}
