//! The object-strategy capability: the small decoder/encoder/comparator
//! that lets [`crate::generic_indexed::GenericIndexed`] stay agnostic to
//! what it's an array *of*.
//!
//! `decode` is generic over the lifetime of the span it's handed so that
//! [`StringStrategy`] can return a borrowed `&str` tied to the backing
//! buffer, with no allocation on the read path. Strategies whose element
//! type doesn't borrow (bitmaps, R-trees) simply ignore that lifetime in
//! their output.

use std::cmp::Ordering;

use crate::error::{ColumnError, Result};

pub trait ObjectStrategy<'a, T> {
    /// Decode one element from its byte span within the payload.
    fn decode(span: &'a [u8]) -> Result<T>;

    /// Append the on-disk representation of `value` to `sink`.
    fn encode_into(value: &T, sink: &mut Vec<u8>);

    /// Byte-wise comparator used by [`GenericIndexed::index_of`] binary
    /// search. For `StringStrategy` this is exactly lexicographic string
    /// order, since UTF-8 byte order agrees with codepoint order.
    fn compare(a: &[u8], b: &[u8]) -> Ordering;
}

/// UTF-8 strings, the strategy used for the dictionary itself.
pub struct StringStrategy;

impl<'a> ObjectStrategy<'a, &'a str> for StringStrategy {
    fn decode(span: &'a [u8]) -> Result<&'a str> {
        std::str::from_utf8(span)
            .map_err(|e| ColumnError::corrupt(format!("dictionary entry is not valid UTF-8: {e}")))
    }

    fn encode_into(value: &&'a str, sink: &mut Vec<u8>) {
        sink.extend_from_slice(value.as_bytes());
    }

    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
