//! Property-based verification of the column format's quantified
//! invariants: round-trip fidelity (single- and multi-valued), dictionary
//! sort order, bitmap/dictionary parallelism, the byte budget, decode
//! idempotence, and spatial absence.

use std::collections::BTreeSet;

use dict_column::bitmap::BitmapFactory;
use dict_column::bitmap_index::BitmapIndexBuilder;
use dict_column::dictionary::DictionaryBuilder;
use dict_column::vsize_ints::VSizeIntsBuilder;
use dict_column::vsize_ragged::VSizeRaggedBuilder;
use dict_column::{ColumnSpec, MaterializedRows, NullColumnBuilder, RoaringBitmapFactory};
use proptest::prelude::*;

/// A sorted, deduplicated, non-empty set of short ASCII strings, standing
/// in for an already-built column dictionary (materialized upstream of
/// this crate and handed to it pre-sorted).
fn dictionary_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,6}", 1..12).prop_map(|set: BTreeSet<String>| {
        let mut v: Vec<String> = set.into_iter().collect();
        v.sort();
        v
    })
}

fn build_single_valued(
    dict: &[String],
    ids: &[u32],
    bitmaps: &[roaring::RoaringBitmap],
) -> ColumnSpec<'_, RoaringBitmapFactory> {
    let mut dict_builder = DictionaryBuilder::new();
    for s in dict {
        dict_builder.push(s);
    }
    let max_id = dict.len().saturating_sub(1) as u32;
    let mut ints = VSizeIntsBuilder::new(max_id);
    for &id in ids {
        ints.push(id);
    }
    let mut bitmap_index = BitmapIndexBuilder::default();
    for b in bitmaps {
        bitmap_index.push(b);
    }
    ColumnSpec::materialized(
        dict_builder,
        MaterializedRows::Single(ints),
        bitmap_index,
        None,
    )
}

fn build_multi_valued(
    dict: &[String],
    rows: &[Vec<u32>],
    bitmaps: &[roaring::RoaringBitmap],
) -> ColumnSpec<'_, RoaringBitmapFactory> {
    let mut dict_builder = DictionaryBuilder::new();
    for s in dict {
        dict_builder.push(s);
    }
    let max_id = dict.len().saturating_sub(1) as u32;
    let total_ids: usize = rows.iter().map(|r| r.len()).sum();
    let max_values_bytes = (total_ids as u32) * 4 + 4;
    let mut ragged = VSizeRaggedBuilder::new(max_id, max_values_bytes);
    for row in rows {
        ragged.push_row(row.iter().copied());
    }
    let mut bitmap_index = BitmapIndexBuilder::default();
    for b in bitmaps {
        bitmap_index.push(b);
    }
    ColumnSpec::materialized(
        dict_builder,
        MaterializedRows::Multi(ragged),
        bitmap_index,
        None,
    )
}

fn bitmaps_for_single(dict_len: usize, ids: &[u32], factory: &RoaringBitmapFactory) -> Vec<roaring::RoaringBitmap> {
    let mut bitmaps: Vec<_> = (0..dict_len).map(|_| factory.empty()).collect();
    for (row, &id) in ids.iter().enumerate() {
        bitmaps[id as usize].insert(row as u32);
    }
    bitmaps
}

fn bitmaps_for_multi(
    dict_len: usize,
    rows: &[Vec<u32>],
    factory: &RoaringBitmapFactory,
) -> Vec<roaring::RoaringBitmap> {
    let mut bitmaps: Vec<_> = (0..dict_len).map(|_| factory.empty()).collect();
    for (row, ids) in rows.iter().enumerate() {
        for &id in ids {
            bitmaps[id as usize].insert(row as u32);
        }
    }
    bitmaps
}

proptest! {
    /// Round-trip I + byte budget + bitmap/dictionary parallelism +
    /// idempotence, single-valued.
    #[test]
    fn round_trips_single_valued_columns(
        dict in dictionary_strategy(),
        raw_ids in prop::collection::vec(any::<u32>(), 0..30),
    ) {
        let factory = RoaringBitmapFactory;
        let ids: Vec<u32> = raw_ids.iter().map(|&v| v % dict.len() as u32).collect();
        let bitmaps = bitmaps_for_single(dict.len(), &ids, &factory);

        let spec = build_single_valued(&dict, &ids, &bitmaps);
        let expected_size = dict_column::serialized_size(&spec).unwrap();
        let mut bytes = Vec::new();
        dict_column::write_column(&spec, &mut bytes).unwrap();
        prop_assert_eq!(bytes.len(), expected_size);

        for _ in 0..2 {
            let mut builder = NullColumnBuilder::default();
            dict_column::read_column(&bytes, factory, 0, &mut builder).unwrap();
            let column = builder.column.unwrap();

            prop_assert_eq!(column.length(), ids.len());
            prop_assert!(!column.has_multiple_values());
            for (row, &id) in ids.iter().enumerate() {
                prop_assert_eq!(column.get_single(row).unwrap(), id);
            }

            // bitmap/dictionary parallelism: one bitmap per dictionary id,
            // and every row ordinal appears in exactly one bitmap.
            let mut covered = roaring::RoaringBitmap::new();
            for id in 0..dict.len() as u32 {
                let b = column.bitmap_at(id).unwrap();
                prop_assert!((&covered & &b).is_empty());
                covered |= b;
            }
            prop_assert_eq!(covered.len() as usize, ids.len());
        }
    }

    /// Round-trip II, multi-valued: per-row insertion order is preserved,
    /// never deduplicated, and bitmaps reflect every occurrence.
    #[test]
    fn round_trips_multi_valued_columns_preserving_row_order(
        dict in dictionary_strategy(),
        raw_rows in prop::collection::vec(prop::collection::vec(any::<u32>(), 0..5), 0..15),
    ) {
        let factory = RoaringBitmapFactory;
        let rows: Vec<Vec<u32>> = raw_rows
            .iter()
            .map(|row| row.iter().map(|&v| v % dict.len() as u32).collect())
            .collect();
        let bitmaps = bitmaps_for_multi(dict.len(), &rows, &factory);

        let spec = build_multi_valued(&dict, &rows, &bitmaps);
        let expected_size = dict_column::serialized_size(&spec).unwrap();
        let mut bytes = Vec::new();
        dict_column::write_column(&spec, &mut bytes).unwrap();
        prop_assert_eq!(bytes.len(), expected_size);

        let mut builder = NullColumnBuilder::default();
        dict_column::read_column(&bytes, factory, 0, &mut builder).unwrap();
        let column = builder.column.unwrap();

        prop_assert_eq!(column.length(), rows.len());
        prop_assert!(column.has_multiple_values() || rows.is_empty());
        for (row, expected) in rows.iter().enumerate() {
            let got: Vec<u32> = column.get_multi(row).unwrap().iter().collect();
            prop_assert_eq!(&got, expected);
        }

        for id in 0..dict.len() as u32 {
            let expected_count = rows.iter().filter(|r| r.contains(&id)).count();
            prop_assert_eq!(column.bitmap_at(id).unwrap().len() as usize, expected_count);
        }
    }

    /// Dictionary order: `index_of` agrees with position for every member,
    /// and the insertion-point convention holds for non-members.
    #[test]
    fn dictionary_index_of_matches_sorted_position(dict in dictionary_strategy()) {
        let spec: ColumnSpec<'_, RoaringBitmapFactory> =
            build_single_valued(&dict, &[], &bitmaps_for_single(dict.len(), &[], &RoaringBitmapFactory));
        let mut bytes = Vec::new();
        dict_column::write_column(&spec, &mut bytes).unwrap();

        let mut builder = NullColumnBuilder::default();
        dict_column::read_column(&bytes, RoaringBitmapFactory, 0, &mut builder).unwrap();
        let column = builder.column.unwrap();

        for (i, s) in dict.iter().enumerate() {
            prop_assert_eq!(column.lookup_id(s).unwrap(), Some(i as u32));
            prop_assert_eq!(column.lookup_name(i as u32).unwrap(), s.as_str());
        }
    }

    /// A column written without a spatial index has zero remaining bytes
    /// after the bitmap index, and no spatial index is registered on read.
    #[test]
    fn absent_spatial_index_leaves_no_trailing_bytes(
        dict in dictionary_strategy(),
        raw_ids in prop::collection::vec(any::<u32>(), 0..10),
    ) {
        let factory = RoaringBitmapFactory;
        let ids: Vec<u32> = raw_ids.iter().map(|&v| v % dict.len() as u32).collect();
        let bitmaps = bitmaps_for_single(dict.len(), &ids, &factory);
        let spec = build_single_valued(&dict, &ids, &bitmaps);

        let mut bytes = Vec::new();
        dict_column::write_column(&spec, &mut bytes).unwrap();
        prop_assert_eq!(bytes.len(), dict_column::serialized_size(&spec).unwrap());

        let mut builder = NullColumnBuilder::default();
        dict_column::read_column(&bytes, factory, 0, &mut builder).unwrap();
        prop_assert!(builder.spatial_index.is_none());
        prop_assert!(!builder.column.unwrap().has_spatial_index());
    }

    /// Truncating the buffer anywhere in the payload region must fail
    /// closed, never silently succeed with wrong data. `cut_seed` is
    /// reduced modulo the written length so the truncation point ranges
    /// over the whole buffer, not just the final byte.
    #[test]
    fn truncated_buffers_never_decode_successfully(
        dict in dictionary_strategy(),
        raw_ids in prop::collection::vec(any::<u32>(), 1..10),
        cut_seed in any::<usize>(),
    ) {
        let factory = RoaringBitmapFactory;
        let ids: Vec<u32> = raw_ids.iter().map(|&v| v % dict.len() as u32).collect();
        let bitmaps = bitmaps_for_single(dict.len(), &ids, &factory);
        let spec = build_single_valued(&dict, &ids, &bitmaps);

        let mut bytes = Vec::new();
        dict_column::write_column(&spec, &mut bytes).unwrap();
        if !bytes.is_empty() {
            let cut = cut_seed % bytes.len();
            let truncated = &bytes[..cut];
            let mut builder = NullColumnBuilder::default();
            let result = dict_column::read_column(truncated, factory, 0, &mut builder);
            prop_assert!(result.is_err());
        }
    }
}
