//! `SpatialIndex`: an immutable R-tree over (point, bitmap) pairs,
//! serialized via a strategy that reuses the bitmap factory.
//!
//! The outer wire form is just a length-prefixed blob:
//! `u32 num_bytes, bytes payload[num_bytes]`, because an R-tree doesn't
//! self-delimit the way a `GenericIndexed` does. What's inside that blob is
//! this crate's own leaf encoding (point + bitmap per entry); the R-tree
//! library itself (`rstar`) only supplies the in-memory query structure,
//! not a wire format, so persistence is this module's responsibility.

use byteorder::{BigEndian, ByteOrder};
use rstar::{RTree, RTreeObject, AABB};

use crate::bitmap::BitmapFactory;
use crate::error::{ColumnError, Result};

/// One leaf: a two-dimensional point paired with the bitmap of row
/// ordinals at that point.
#[derive(Debug, Clone)]
pub struct SpatialEntry<B> {
    pub point: [f64; 2],
    pub bitmap: B,
}

impl<B> RTreeObject for SpatialEntry<B> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

pub struct SpatialIndex<F: BitmapFactory> {
    tree: RTree<SpatialEntry<F::Bitmap>>,
}

impl<F: BitmapFactory> Clone for SpatialIndex<F> {
    fn clone(&self) -> Self {
        SpatialIndex {
            tree: self.tree.clone(),
        }
    }
}

impl<F: BitmapFactory> SpatialIndex<F> {
    pub fn build(entries: Vec<SpatialEntry<F::Bitmap>>) -> Self {
        SpatialIndex {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// All bitmaps whose point falls within the axis-aligned box
    /// `[min, max]`.
    pub fn search(&self, min: [f64; 2], max: [f64; 2]) -> impl Iterator<Item = &F::Bitmap> {
        let envelope = AABB::from_corners(min, max);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|entry| &entry.bitmap)
    }

    pub fn from_bytes(data: &[u8], factory: &F) -> Result<(Self, usize)> {
        if data.len() < 4 {
            return Err(ColumnError::corrupt(
                "SpatialIndex: buffer too short for length prefix",
            ));
        }
        let num_bytes = BigEndian::read_u32(&data[0..4]) as usize;
        let total = 4usize
            .checked_add(num_bytes)
            .ok_or_else(|| ColumnError::corrupt("SpatialIndex: length overflow"))?;
        if data.len() < total {
            return Err(ColumnError::corrupt(format!(
                "SpatialIndex: buffer of {} bytes shorter than declared size {total}",
                data.len()
            )));
        }
        let payload = &data[4..total];
        let entries = decode_entries(payload, factory)?;
        Ok((SpatialIndex::build(entries), total))
    }

    pub fn write_to(&self, factory: &F, sink: &mut Vec<u8>) {
        let mut payload = Vec::new();
        let mut buf4 = [0u8; 4];
        BigEndian::write_u32(&mut buf4, self.tree.size() as u32);
        payload.extend_from_slice(&buf4);
        for entry in self.tree.iter() {
            let x_bits = entry.point[0].to_bits();
            let y_bits = entry.point[1].to_bits();
            payload.extend_from_slice(&x_bits.to_be_bytes());
            payload.extend_from_slice(&y_bits.to_be_bytes());
            let bitmap_bytes = factory.serialize(&entry.bitmap);
            BigEndian::write_u32(&mut buf4, bitmap_bytes.len() as u32);
            payload.extend_from_slice(&buf4);
            payload.extend_from_slice(&bitmap_bytes);
        }

        BigEndian::write_u32(&mut buf4, payload.len() as u32);
        sink.extend_from_slice(&buf4);
        sink.extend_from_slice(&payload);
    }

    pub fn serialized_size(&self, factory: &F) -> usize {
        let mut size = 4 + 4; // outer length prefix + inner entry count
        for entry in self.tree.iter() {
            size += 8 + 8; // x, y
            size += 4 + factory.serialize(&entry.bitmap).len();
        }
        size
    }
}

fn decode_entries<F: BitmapFactory>(
    payload: &[u8],
    factory: &F,
) -> Result<Vec<SpatialEntry<F::Bitmap>>> {
    if payload.len() < 4 {
        return Err(ColumnError::corrupt(
            "SpatialIndex: payload too short for entry count",
        ));
    }
    let count = BigEndian::read_u32(&payload[0..4]) as usize;
    let mut pos = 4;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        if pos + 16 + 4 > payload.len() {
            return Err(ColumnError::corrupt(
                "SpatialIndex: truncated entry header",
            ));
        }
        let x = f64::from_bits(BigEndian::read_u64(&payload[pos..pos + 8]));
        let y = f64::from_bits(BigEndian::read_u64(&payload[pos + 8..pos + 16]));
        pos += 16;
        let bitmap_len = BigEndian::read_u32(&payload[pos..pos + 4]) as usize;
        pos += 4;
        if pos + bitmap_len > payload.len() {
            return Err(ColumnError::corrupt(
                "SpatialIndex: truncated bitmap payload",
            ));
        }
        let bitmap = factory.deserialize(&payload[pos..pos + bitmap_len])?;
        pos += bitmap_len;
        entries.push(SpatialEntry {
            point: [x, y],
            bitmap,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::RoaringBitmapFactory;

    #[test]
    fn round_trips_points_and_bitmaps() {
        let factory = RoaringBitmapFactory;
        let mut b0 = factory.empty();
        b0.insert(0);
        let mut b1 = factory.empty();
        b1.insert(1);
        b1.insert(2);

        let index = SpatialIndex::<RoaringBitmapFactory>::build(vec![
            SpatialEntry {
                point: [0.0, 0.0],
                bitmap: b0.clone(),
            },
            SpatialEntry {
                point: [10.0, 10.0],
                bitmap: b1.clone(),
            },
        ]);

        let mut bytes = Vec::new();
        index.write_to(&factory, &mut bytes);
        assert_eq!(bytes.len(), index.serialized_size(&factory));

        let (decoded, consumed) =
            SpatialIndex::<RoaringBitmapFactory>::from_bytes(&bytes, &factory).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.len(), 2);

        let hits: Vec<_> = decoded.search([-1.0, -1.0], [1.0, 1.0]).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0], &b0);
    }

    #[test]
    fn truncated_buffer_is_corrupt() {
        let factory = RoaringBitmapFactory;
        let index = SpatialIndex::<RoaringBitmapFactory>::build(vec![SpatialEntry {
            point: [1.0, 1.0],
            bitmap: factory.empty(),
        }]);
        let mut bytes = Vec::new();
        index.write_to(&factory, &mut bytes);
        let truncated = &bytes[..bytes.len() - 1];
        assert!(SpatialIndex::<RoaringBitmapFactory>::from_bytes(truncated, &factory).is_err());
    }
}
