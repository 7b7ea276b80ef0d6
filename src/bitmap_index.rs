//! `BitmapIndex`: a `GenericIndexed<Bitmap>` parallel to the dictionary.
//! Element `i` is the set of row ordinals whose value is dictionary id `i`.

use crate::bitmap::{BitmapFactory, BitmapStrategy};
use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::generic_indexed::{GenericIndexed, GenericIndexedBuilder};

#[derive(Debug, Clone, Copy)]
pub struct BitmapIndex<'a, F: BitmapFactory> {
    indexed: GenericIndexed<'a, F::Bitmap, BitmapStrategy<F>>,
}

impl<'a, F: BitmapFactory + Default> BitmapIndex<'a, F> {
    pub fn from_bytes(data: &'a [u8]) -> Result<(Self, usize)> {
        let (indexed, consumed) = GenericIndexed::from_bytes(data)?;
        Ok((BitmapIndex { indexed }, consumed))
    }

    pub fn size(&self) -> usize {
        self.indexed.size()
    }

    pub fn get(&self, id: usize) -> Result<F::Bitmap> {
        self.indexed.get(id)
    }

    /// Look up `s` in `dictionary`; return its bitmap on a hit, or the
    /// factory's empty bitmap on a miss.
    pub fn get_by_value(
        &self,
        s: &str,
        dictionary: &Dictionary<'a>,
        factory: &F,
    ) -> Result<F::Bitmap> {
        match dictionary.index_of(s)? {
            Some(id) => self.get(id as usize),
            None => Ok(factory.empty()),
        }
    }

    pub fn total_size(&self) -> usize {
        self.indexed.total_size()
    }
}

/// Builder used at write time; one bitmap per dictionary id, in dictionary
/// order, `sorted = false`.
pub struct BitmapIndexBuilder<F: BitmapFactory> {
    builder: GenericIndexedBuilder<F::Bitmap, BitmapStrategy<F>>,
}

impl<F: BitmapFactory> Default for BitmapIndexBuilder<F> {
    fn default() -> Self {
        Self {
            builder: GenericIndexedBuilder::new(false),
        }
    }
}

impl<'a, F: BitmapFactory + Default> BitmapIndexBuilder<F> {
    pub fn push(&mut self, bitmap: &F::Bitmap) {
        self.builder.push(bitmap);
    }

    pub fn len(&self) -> usize {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    pub fn serialized_size(&self) -> usize {
        self.builder.serialized_size()
    }

    pub fn write_to(&self, sink: &mut Vec<u8>) {
        self.builder.write_to(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::RoaringBitmapFactory;
    use crate::dictionary::DictionaryBuilder;

    #[test]
    fn parallels_the_dictionary_and_resolves_by_value() {
        let factory = RoaringBitmapFactory;
        let mut dict_builder = DictionaryBuilder::new();
        dict_builder.push("a");
        dict_builder.push("b");
        dict_builder.push("c");
        let mut dict_bytes = Vec::new();
        dict_builder.write_to(&mut dict_bytes);
        let (dictionary, _) = Dictionary::from_bytes(&dict_bytes).unwrap();

        // rows = [0, 2, 1, 2, 0] -> bitmap[0]={0,4} bitmap[1]={2} bitmap[2]={1,3}
        let mut b0 = factory.empty();
        b0.insert(0);
        b0.insert(4);
        let mut b1 = factory.empty();
        b1.insert(2);
        let mut b2 = factory.empty();
        b2.insert(1);
        b2.insert(3);

        let mut builder: BitmapIndexBuilder<RoaringBitmapFactory> = BitmapIndexBuilder::default();
        builder.push(&b0);
        builder.push(&b1);
        builder.push(&b2);
        let mut bytes = Vec::new();
        builder.write_to(&mut bytes);
        assert_eq!(bytes.len(), builder.serialized_size());

        let (index, consumed) = BitmapIndex::<RoaringBitmapFactory>::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(index.size(), dictionary.len());

        let bitmap_b = index.get_by_value("b", &dictionary, &factory).unwrap();
        assert_eq!(bitmap_b, b1);

        let bitmap_missing = index.get_by_value("z", &dictionary, &factory).unwrap();
        assert!(bitmap_missing.is_empty());
    }
}
