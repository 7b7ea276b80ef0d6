//! On-disk format and zero-copy accessor for a dictionary-encoded,
//! optionally multi-valued string column.
//!
//! A column of this kind replaces each string value of a row set with a
//! compact integer id drawn from a per-column dictionary, then augments that
//! encoding with a bitmap index (dictionary id -> set of matching row
//! ordinals) and an optional spatial index, so that equality, range, and
//! spatial predicates can be evaluated against a memory-mapped segment
//! without materializing rows.
//!
//! Module map:
//!
//! - [`vsize_ints`] / [`vsize_ragged`]: packed fixed-width integer storage
//!   for single- and multi-valued rows.
//! - [`generic_indexed`] / [`strategy`]: the length-prefixed indexed
//!   container and the pluggable byte-span decoder it delegates to.
//! - [`dictionary`]: the sorted string dictionary built on top of
//!   `GenericIndexed`.
//! - [`bitmap`] / [`bitmap_index`]: the bitmap collaborator contract and the
//!   per-dictionary-id inverted index built on top of it.
//! - [`spatial_index`]: the optional R-tree over (point, bitmap) pairs.
//! - [`column`]: the composite accessor and the write/read driver that ties
//!   all of the above into the on-disk `Column` format.
//! - [`error`]: the error taxonomy shared by every fallible operation.

pub mod bitmap;
pub mod bitmap_index;
pub mod column;
pub mod dictionary;
pub mod error;
pub mod generic_indexed;
pub mod spatial_index;
pub mod strategy;
pub mod vsize_ints;
pub mod vsize_ragged;

pub use bitmap::{BitmapFactory, RoaringBitmapFactory};
pub use column::{
    ColumnBuilder, ColumnSpec, DictionaryEncodedColumn, MaterializedRows, NullColumnBuilder,
    read_column, serialized_size, write_column,
};
pub use error::{ColumnError, Result};
