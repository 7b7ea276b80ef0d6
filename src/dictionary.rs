//! The column dictionary: a `GenericIndexed<str>` with `sorted = true`.
//! Position in the sequence is the dictionary id; sort order is
//! byte-lexicographic and is relied on by range filters.

use crate::error::Result;
use crate::generic_indexed::{GenericIndexed, GenericIndexedBuilder};
use crate::strategy::StringStrategy;

#[derive(Debug, Clone, Copy)]
pub struct Dictionary<'a> {
    indexed: GenericIndexed<'a, &'a str, StringStrategy>,
}

impl<'a> Dictionary<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<(Self, usize)> {
        let (indexed, consumed) = GenericIndexed::from_bytes(data)?;
        Ok((Dictionary { indexed }, consumed))
    }

    pub fn len(&self) -> usize {
        self.indexed.size()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.size() == 0
    }

    pub fn get(&self, id: u32) -> Result<&'a str> {
        self.indexed.get(id as usize)
    }

    pub fn min(&self) -> Result<Option<&'a str>> {
        if self.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.get(0)?))
        }
    }

    pub fn max(&self) -> Result<Option<&'a str>> {
        if self.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.get(self.len() as u32 - 1)?))
        }
    }

    /// `Some(id)` on an exact hit, `None` on a miss. The underlying
    /// `GenericIndexed` layer uses a signed `-(insertion_point)-1`
    /// convention for range filters; the dictionary's own lookup surface
    /// only needs hit/miss, so we expose [`Dictionary::insertion_point`]
    /// separately for callers that need the range-filter form.
    pub fn index_of(&self, key: &str) -> Result<Option<u32>> {
        Ok(self
            .indexed
            .index_of_raw(key.as_bytes())?
            .ok()
            .map(|i| i as u32))
    }

    /// Classic binary-search contract: `Ok(id)` on a hit, `Err(insertion
    /// point)` on a miss, where `insertion_point` is the index of the least
    /// element greater than `key` (or `len()` if none).
    pub fn insertion_point(&self, key: &str) -> Result<std::result::Result<u32, u32>> {
        Ok(self
            .indexed
            .index_of_raw(key.as_bytes())?
            .map(|i| i as u32)
            .map_err(|i| i as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<&'a str>> {
        self.indexed.iter()
    }
}

pub struct DictionaryBuilder<'a> {
    builder: GenericIndexedBuilder<&'a str, StringStrategy>,
}

impl<'a> Default for DictionaryBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DictionaryBuilder<'a> {
    pub fn new() -> Self {
        Self {
            builder: GenericIndexedBuilder::new(true),
        }
    }

    /// Caller is responsible for pushing entries in sorted order. The
    /// dictionary is materialized upstream of this crate and this crate
    /// does not re-sort on write.
    pub fn push(&mut self, s: &'a str) {
        self.builder.push(&s);
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

    fn build(strings: &[&'static str]) -> Vec<u8> {
        let mut builder = DictionaryBuilder::new();
        for s in strings {
            builder.push(s);
        }
        let mut out = Vec::new();
        builder.write_to(&mut out);
        out
    }

    #[test]
    fn exact_and_range_lookup() {
        let bytes = build(&["apple", "banana", "cherry"]);
        let (dict, _) = Dictionary::from_bytes(&bytes).unwrap();
        assert_eq!(dict.index_of("banana").unwrap(), Some(1));
        assert_eq!(dict.index_of("blueberry").unwrap(), None);
        assert_eq!(
            dict.insertion_point("blueberry").unwrap(),
            Err(2)
        );
        assert_eq!(dict.get(2).unwrap(), "cherry");
    }

    #[test]
    fn index_of_agrees_with_position_for_every_entry() {
        let entries = ["a", "b", "c", "d", "e"];
        let bytes = build(&entries);
        let (dict, _) = Dictionary::from_bytes(&bytes).unwrap();
        for (i, s) in entries.iter().enumerate() {
            assert_eq!(dict.index_of(s).unwrap(), Some(i as u32));
        }
    }

    #[test]
    fn min_max_on_empty_and_nonempty() {
        let bytes = build(&[]);
        let (dict, _) = Dictionary::from_bytes(&bytes).unwrap();
        assert_eq!(dict.min().unwrap(), None);
        assert_eq!(dict.max().unwrap(), None);

        let bytes = build(&["a", "m", "z"]);
        let (dict, _) = Dictionary::from_bytes(&bytes).unwrap();
        assert_eq!(dict.min().unwrap(), Some("a"));
        assert_eq!(dict.max().unwrap(), Some("z"));
    }
}
