//! `VSizeInts`: a packed array of fixed-width unsigned integers, width
//! chosen at write time as the minimum byte count needed for the largest
//! id.
//!
//! On-disk layout, big-endian:
//!
//! ```text
//! u8  version = 0x0
//! u8  num_bytes  (width, 1..=4)
//! u32 count
//! u8  payload[count * width]
//! ```

use byteorder::{BigEndian, ByteOrder};

use crate::error::{ColumnError, Result};

const VERSION: u8 = 0x0;
const HEADER_SIZE: usize = 1 + 1 + 4;

/// Minimum byte width (1..=4) needed to represent `max_id`.
pub fn width_for_max_id(max_id: u32) -> u8 {
    if max_id == 0 {
        1
    } else {
        let bits = 32 - max_id.leading_zeros();
        (bits as usize).div_ceil(8).max(1) as u8
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VSizeInts<'a> {
    data: &'a [u8],
    width: usize,
    count: usize,
}

impl<'a> VSizeInts<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<(Self, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(ColumnError::corrupt(format!(
                "VSizeInts: buffer of {} bytes too short for header",
                data.len()
            )));
        }
        let version = data[0];
        if version != VERSION {
            return Err(ColumnError::corrupt(format!(
                "VSizeInts: unsupported version {version:#x}"
            )));
        }
        let width = data[1] as usize;
        if !(1..=4).contains(&width) {
            return Err(ColumnError::corrupt(format!(
                "VSizeInts: illegal width {width}, must be 1..=4"
            )));
        }
        let count = BigEndian::read_u32(&data[2..6]) as usize;
        let payload_len = count
            .checked_mul(width)
            .ok_or_else(|| ColumnError::corrupt("VSizeInts: payload size overflow"))?;
        let total_size = HEADER_SIZE
            .checked_add(payload_len)
            .ok_or_else(|| ColumnError::corrupt("VSizeInts: total size overflow"))?;
        if data.len() < total_size {
            return Err(ColumnError::corrupt(format!(
                "VSizeInts: buffer of {} bytes shorter than declared size {total_size}",
                data.len()
            )));
        }

        Ok((
            VSizeInts {
                data: &data[HEADER_SIZE..total_size],
                width,
                count,
            },
            total_size,
        ))
    }

    pub fn size(&self) -> usize {
        self.count
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, i: usize) -> Result<u32> {
        if i >= self.count {
            return Err(ColumnError::corrupt(format!(
                "VSizeInts: index {i} out of range (len {})",
                self.count
            )));
        }
        let start = i * self.width;
        Ok(read_be_uint(&self.data[start..start + self.width]))
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + 'a {
        let data = self.data;
        let width = self.width;
        (0..self.count).map(move |i| {
            let start = i * width;
            read_be_uint(&data[start..start + width])
        })
    }
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

pub struct VSizeIntsBuilder {
    width: usize,
    values: Vec<u32>,
}

impl VSizeIntsBuilder {
    /// `max_id` picks the packed width; every pushed value must be `<=
    /// max_id`.
    pub fn new(max_id: u32) -> Self {
        Self {
            width: width_for_max_id(max_id) as usize,
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, value: u32) {
        self.values.push(value);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn serialized_size(&self) -> usize {
        HEADER_SIZE + self.values.len() * self.width
    }

    pub fn write_to(&self, sink: &mut Vec<u8>) {
        sink.push(VERSION);
        sink.push(self.width as u8);
        let mut buf4 = [0u8; 4];
        BigEndian::write_u32(&mut buf4, self.values.len() as u32);
        sink.extend_from_slice(&buf4);
        for &v in &self.values {
            write_be_uint(v, self.width, sink);
        }
    }
}
