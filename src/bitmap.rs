//! The bitmap collaborator contract: this crate never hard-codes a bitmap
//! representation, only the capability set a [`BitmapFactory`] must provide.
//! [`RoaringBitmapFactory`] is the one concrete factory shipped here, backed
//! by the `roaring` crate.

use std::cmp::Ordering;

use roaring::RoaringBitmap;

use crate::error::{ColumnError, Result};
use crate::strategy::ObjectStrategy;

/// Capability set required of a bitmap implementation. Row ordinals are
/// `u32`, matching the dictionary-id width ceiling used elsewhere in this
/// format.
pub trait BitmapFactory {
    type Bitmap: Clone;

    fn empty(&self) -> Self::Bitmap;
    fn union<'a, I: IntoIterator<Item = &'a Self::Bitmap>>(&self, bitmaps: I) -> Self::Bitmap
    where
        Self::Bitmap: 'a;
    fn deserialize(&self, span: &[u8]) -> Result<Self::Bitmap>;
    fn serialize(&self, bitmap: &Self::Bitmap) -> Vec<u8>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RoaringBitmapFactory;

impl BitmapFactory for RoaringBitmapFactory {
    type Bitmap = RoaringBitmap;

    fn empty(&self) -> RoaringBitmap {
        RoaringBitmap::new()
    }

    fn union<'a, I: IntoIterator<Item = &'a RoaringBitmap>>(&self, bitmaps: I) -> RoaringBitmap
    where
        RoaringBitmap: 'a,
    {
        let mut out = RoaringBitmap::new();
        for b in bitmaps {
            out |= b;
        }
        out
    }

    fn deserialize(&self, span: &[u8]) -> Result<RoaringBitmap> {
        RoaringBitmap::deserialize_from(span)
            .map_err(|e| ColumnError::collaborator("bitmap", e))
    }

    fn serialize(&self, bitmap: &RoaringBitmap) -> Vec<u8> {
        let mut out = Vec::with_capacity(bitmap.serialized_size());
        // RoaringBitmap::serialize_into only fails on an I/O error, which a
        // Vec<u8> sink never produces.
        bitmap
            .serialize_into(&mut out)
            .expect("serializing a RoaringBitmap into a Vec cannot fail");
        out
    }
}

/// Object strategy adapting a [`BitmapFactory`] to [`GenericIndexed`]'s
/// decode/encode/compare capability. Bitmaps have no defined ordering, so
/// `compare` is only ever invoked by a caller that (incorrectly) marks a
/// bitmap `GenericIndexed` sorted; `BitmapIndex` always builds with
/// `sorted = false`.
pub struct BitmapStrategy<F>(std::marker::PhantomData<F>);

impl<'a, F: BitmapFactory + Default> ObjectStrategy<'a, F::Bitmap> for BitmapStrategy<F> {
    fn decode(span: &'a [u8]) -> Result<F::Bitmap> {
        F::default().deserialize(span)
    }

    fn encode_into(value: &F::Bitmap, sink: &mut Vec<u8>) {
        let bytes = F::default().serialize(value);
        sink.extend_from_slice(&bytes);
    }

    fn compare(_a: &[u8], _b: &[u8]) -> Ordering {
        Ordering::Equal
    }
}
