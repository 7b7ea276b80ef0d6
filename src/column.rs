//! `DictionaryEncodedColumn` and the column codec that serializes/
//! deserializes it: the composite artifact owning the dictionary, row
//! storage, bitmap index, and optional spatial index, plus the write/read
//! driver that stitches their wire formats together in this exact,
//! non-negotiable order:
//!
//! ```text
//! Column := u8 flag ; Dictionary ; (SingleIds | MultiIds) ; BitmapIndex ; [SpatialIndex]
//! ```

use parking_lot::Mutex;

use crate::bitmap::BitmapFactory;
use crate::bitmap_index::{BitmapIndex, BitmapIndexBuilder};
use crate::dictionary::{Dictionary, DictionaryBuilder};
use crate::error::{ColumnError, Result};
use crate::spatial_index::SpatialIndex;
use crate::vsize_ints::{VSizeInts, VSizeIntsBuilder};
use crate::vsize_ragged::{VSizeRagged, VSizeRaggedBuilder, VSizeRaggedRow};

const SINGLE_VALUED_FLAG: u8 = 0x00;
const MULTI_VALUED_FLAG: u8 = 0x01;

/// The tag persisted in the segment's higher-level metadata (outside this
/// crate) so a reader can reconstruct the same [`BitmapFactory`] a writer
/// used. A reader falls back to this default when no tag was recorded;
/// this crate ships a single factory, so `RoaringBitmapFactory` is
/// simultaneously the default and the only option (see DESIGN.md).
pub const DEFAULT_BITMAP_FACTORY_TAG: &str = "roaring";

/// Either a single id per row, or a ragged per-row list of ids, never both
/// and never neither. Modeling the choice as an enum makes the excluded
/// states unrepresentable instead of relying on a runtime check.
#[derive(Debug, Clone, Copy)]
pub enum RowStorage<'a> {
    Single(VSizeInts<'a>),
    Multi(VSizeRagged<'a>),
}

impl<'a> RowStorage<'a> {
    pub fn len(&self) -> usize {
        match self {
            RowStorage::Single(ints) => ints.size(),
            RowStorage::Multi(ragged) => ragged.num_rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, RowStorage::Multi(_))
    }
}

/// Write-side counterpart of [`RowStorage`]; exactly one variant is built,
/// matching the flag byte it will be serialized under.
pub enum MaterializedRows {
    Single(VSizeIntsBuilder),
    Multi(VSizeRaggedBuilder),
}

impl MaterializedRows {
    fn flag(&self) -> u8 {
        match self {
            MaterializedRows::Single(_) => SINGLE_VALUED_FLAG,
            MaterializedRows::Multi(_) => MULTI_VALUED_FLAG,
        }
    }

    fn serialized_size(&self) -> usize {
        match self {
            MaterializedRows::Single(b) => b.serialized_size(),
            MaterializedRows::Multi(b) => b.serialized_size(),
        }
    }

    fn write_to(&self, sink: &mut Vec<u8>) {
        match self {
            MaterializedRows::Single(b) => b.write_to(sink),
            MaterializedRows::Multi(b) => b.write_to(sink),
        }
    }
}

/// The codec's own configuration record has two life states: a bare
/// *descriptor* carrying only the metadata needed to recognize a column's
/// shape (used when deserializing column descriptors, upstream of this
/// crate's payload format), and a *materialized* spec carrying the actual
/// component builders. Calling [`write_column`] on a `Descriptor` is a
/// programmer error, never a silent no-op.
pub enum ColumnSpec<'a, F: BitmapFactory> {
    Descriptor {
        is_single_valued: bool,
        factory_tag: String,
    },
    Materialized {
        dictionary: DictionaryBuilder<'a>,
        rows: MaterializedRows,
        bitmap_index: BitmapIndexBuilder<F>,
        spatial_index: Option<(SpatialIndex<F>, F)>,
    },
}

impl<'a, F: BitmapFactory> ColumnSpec<'a, F> {
    pub fn descriptor(is_single_valued: bool, factory_tag: impl Into<String>) -> Self {
        ColumnSpec::Descriptor {
            is_single_valued,
            factory_tag: factory_tag.into(),
        }
    }

    pub fn materialized(
        dictionary: DictionaryBuilder<'a>,
        rows: MaterializedRows,
        bitmap_index: BitmapIndexBuilder<F>,
        spatial_index: Option<(SpatialIndex<F>, F)>,
    ) -> Self {
        ColumnSpec::Materialized {
            dictionary,
            rows,
            bitmap_index,
            spatial_index,
        }
    }

    pub fn is_single_valued(&self) -> bool {
        match self {
            ColumnSpec::Descriptor {
                is_single_valued, ..
            } => *is_single_valued,
            ColumnSpec::Materialized { rows, .. } => matches!(rows, MaterializedRows::Single(_)),
        }
    }
}

/// Serialize a materialized [`ColumnSpec`] in the field order fixed above.
/// Returns [`ColumnError::ProgrammerError`] for a descriptor-only spec
/// rather than panicking.
pub fn write_column<F: BitmapFactory>(spec: &ColumnSpec<'_, F>, sink: &mut Vec<u8>) -> Result<()> {
    let ColumnSpec::Materialized {
        dictionary,
        rows,
        bitmap_index,
        spatial_index,
    } = spec
    else {
        return Err(ColumnError::ProgrammerError(
            "write_column called on a descriptor-only ColumnSpec",
        ));
    };

    sink.push(rows.flag());
    dictionary.write_to(sink);
    rows.write_to(sink);
    bitmap_index.write_to(sink);
    if let Some((spatial, factory)) = spatial_index {
        spatial.write_to(factory, sink);
    }
    Ok(())
}

/// The exact byte count [`write_column`] will emit, reported in advance so
/// the surrounding segment writer can stitch a directory.
pub fn serialized_size<F: BitmapFactory>(spec: &ColumnSpec<'_, F>) -> Result<usize> {
    let ColumnSpec::Materialized {
        dictionary,
        rows,
        bitmap_index,
        spatial_index,
    } = spec
    else {
        return Err(ColumnError::ProgrammerError(
            "serialized_size called on a descriptor-only ColumnSpec",
        ));
    };

    let mut size = 1 + dictionary.serialized_size() + rows.serialized_size() + bitmap_index.serialized_size();
    if let Some((spatial, factory)) = spatial_index {
        size += spatial.serialized_size(factory);
    }
    Ok(size)
}

/// Sink for the type/multi-valued flag and supplier registrations a
/// surrounding segment loader makes as it decodes a column. The segment
/// loader itself lives outside this crate; this trait is the narrow seam
/// it is expected to implement.
pub trait ColumnBuilder<'a, F: BitmapFactory> {
    fn set_multi_valued(&mut self, multi_valued: bool);
    fn set_dictionary_encoded_column(&mut self, column: DictionaryEncodedColumn<'a, F>);
    fn set_bitmap_index(&mut self, bitmap_index: BitmapIndex<'a, F>);
    fn set_spatial_index(&mut self, spatial_index: SpatialIndex<F>);
}

/// A `ColumnBuilder` that simply remembers what it was handed. This is the
/// stand-in for a real segment loader: tests and callers with no segment of
/// their own construct one, pass it to [`read_column`], and then read
/// `column`/`bitmap_index`/`spatial_index` back off it.
#[derive(Default)]
pub struct NullColumnBuilder<'a, F: BitmapFactory> {
    pub multi_valued: bool,
    pub column: Option<DictionaryEncodedColumn<'a, F>>,
    pub bitmap_index: Option<BitmapIndex<'a, F>>,
    pub spatial_index: Option<SpatialIndex<F>>,
}

impl<'a, F: BitmapFactory> ColumnBuilder<'a, F> for NullColumnBuilder<'a, F> {
    fn set_multi_valued(&mut self, multi_valued: bool) {
        self.multi_valued = multi_valued;
    }

    fn set_dictionary_encoded_column(&mut self, column: DictionaryEncodedColumn<'a, F>) {
        self.column = Some(column);
    }

    fn set_bitmap_index(&mut self, bitmap_index: BitmapIndex<'a, F>) {
        self.bitmap_index = Some(bitmap_index);
    }

    fn set_spatial_index(&mut self, spatial_index: SpatialIndex<F>) {
        self.spatial_index = Some(spatial_index);
    }
}

struct StringCacheInner<'a> {
    cache: lru::LruCache<u32, &'a str>,
    used_bytes: usize,
}

/// Bounded LRU cache over decoded dictionary entries, sized by
/// `columnCacheSizeBytes`. Since `Dictionary::get` already returns a
/// borrowed, zero-copy `&str`, the cache here saves no allocation; it
/// exists to bound repeated lookup work under concurrent readers. A budget
/// of `0` disables caching entirely.
struct StringCache<'a> {
    budget_bytes: usize,
    inner: Mutex<StringCacheInner<'a>>,
}

impl<'a> StringCache<'a> {
    fn new(budget_bytes: usize) -> Self {
        StringCache {
            budget_bytes,
            inner: Mutex::new(StringCacheInner {
                cache: lru::LruCache::unbounded(),
                used_bytes: 0,
            }),
        }
    }

    /// Look up `id`, computing and caching it on a miss. `compute` is only
    /// invoked while the lock is *not* held, so a slow decode never blocks
    /// other readers beyond their own single lookup.
    fn get_or_insert_with(
        &self,
        id: u32,
        compute: impl FnOnce() -> Result<&'a str>,
    ) -> Result<&'a str> {
        if self.budget_bytes == 0 {
            return compute();
        }

        if let Some(hit) = self.inner.lock().cache.get(&id) {
            return Ok(*hit);
        }

        let value = compute()?;

        let mut guard = self.inner.lock();
        if guard.cache.get(&id).is_none() && value.len() <= self.budget_bytes {
            while guard.used_bytes + value.len() > self.budget_bytes {
                match guard.cache.pop_lru() {
                    Some((evicted_id, evicted)) => {
                        log::trace!("StringCache: evicting dictionary id {evicted_id} to stay under budget");
                        guard.used_bytes -= evicted.len();
                    }
                    None => break,
                }
            }
            guard.used_bytes += value.len();
            guard.cache.put(id, value);
        }
        Ok(value)
    }
}

/// The composite accessor over a fully-decoded column: owns the dictionary,
/// row storage, bitmap index, and optional spatial index, all as borrows
/// into the same backing buffer, plus the string-lookup cache.
pub struct DictionaryEncodedColumn<'a, F: BitmapFactory> {
    dictionary: Dictionary<'a>,
    rows: RowStorage<'a>,
    bitmap_index: BitmapIndex<'a, F>,
    spatial_index: Option<SpatialIndex<F>>,
    factory: F,
    cache: StringCache<'a>,
}

impl<'a, F: BitmapFactory + Default> DictionaryEncodedColumn<'a, F> {
    pub fn new(
        dictionary: Dictionary<'a>,
        rows: RowStorage<'a>,
        bitmap_index: BitmapIndex<'a, F>,
        spatial_index: Option<SpatialIndex<F>>,
        factory: F,
        column_cache_size_bytes: usize,
    ) -> Self {
        DictionaryEncodedColumn {
            dictionary,
            rows,
            bitmap_index,
            spatial_index,
            factory,
            cache: StringCache::new(column_cache_size_bytes),
        }
    }

    pub fn length(&self) -> usize {
        self.rows.len()
    }

    pub fn has_multiple_values(&self) -> bool {
        self.rows.is_multi_valued()
    }

    pub fn dictionary(&self) -> &Dictionary<'a> {
        &self.dictionary
    }

    /// Decode dictionary id `id`'s string, through the LRU cache.
    /// `CorruptFormat` if `id` is outside the dictionary: an out-of-range
    /// dictionary id is a corruption signal, the same way an out-of-range
    /// row ordinal is.
    pub fn lookup_name(&self, id: u32) -> Result<&'a str> {
        self.cache
            .get_or_insert_with(id, || self.dictionary.get(id))
    }

    /// `Some(id)` on a hit, `None` if `name` is not in the dictionary.
    pub fn lookup_id(&self, name: &str) -> Result<Option<u32>> {
        self.dictionary.index_of(name)
    }

    /// The single id stored at `row`. `InvalidArity` on a multi-valued
    /// column, returned as a deterministic `Result`, never a panic.
    pub fn get_single(&self, row: usize) -> Result<u32> {
        match &self.rows {
            RowStorage::Single(ints) => ints.get(row),
            RowStorage::Multi(_) => Err(ColumnError::InvalidArity(
                "get_single called on a multi-valued column",
            )),
        }
    }

    /// The ids stored at `row`, in insertion order. `InvalidArity` on a
    /// single-valued column.
    pub fn get_multi(&self, row: usize) -> Result<VSizeRaggedRow<'a>> {
        match &self.rows {
            RowStorage::Multi(ragged) => ragged.get(row),
            RowStorage::Single(_) => Err(ColumnError::InvalidArity(
                "get_multi called on a single-valued column",
            )),
        }
    }

    /// The bitmap of row ordinals whose value is `name`; the factory's
    /// empty bitmap if `name` is not in the dictionary.
    pub fn bitmap_for(&self, name: &str) -> Result<F::Bitmap> {
        self.bitmap_index
            .get_by_value(name, &self.dictionary, &self.factory)
    }

    /// The bitmap at dictionary id `id` directly, bypassing the dictionary
    /// lookup.
    pub fn bitmap_at(&self, id: u32) -> Result<F::Bitmap> {
        self.bitmap_index.get(id as usize)
    }

    /// All bitmaps whose indexed point falls within `[min, max]`.
    /// `ProgrammerError` when this column has no spatial index; callers
    /// are expected to check [`Self::has_spatial_index`] first.
    pub fn spatial_search(
        &self,
        min: [f64; 2],
        max: [f64; 2],
    ) -> Result<Box<dyn Iterator<Item = &F::Bitmap> + '_>> {
        match &self.spatial_index {
            Some(index) => Ok(Box::new(index.search(min, max))),
            None => Err(ColumnError::ProgrammerError(
                "spatial_search called on a column with no spatial index",
            )),
        }
    }

    pub fn has_spatial_index(&self) -> bool {
        self.spatial_index.is_some()
    }
}

/// Decode a column positioned at `data[0]`, registering suppliers on
/// `builder` in the same order fields are read. `factory` is the
/// `BitmapFactory` selected by the segment's persisted `BitmapSerdeFactory`
/// tag (or [`DEFAULT_BITMAP_FACTORY_TAG`] if none was recorded, for
/// backward compatibility with older segment metadata).
pub fn read_column<'a, F: BitmapFactory + Default + Clone>(
    data: &'a [u8],
    factory: F,
    column_cache_size_bytes: usize,
    builder: &mut impl ColumnBuilder<'a, F>,
) -> Result<()> {
    if data.is_empty() {
        log::warn!("Column: refusing to decode an empty buffer");
        return Err(ColumnError::corrupt(
            "Column: empty buffer, missing header byte",
        ));
    }
    let flag = data[0];
    let is_single_valued = match flag {
        SINGLE_VALUED_FLAG => true,
        MULTI_VALUED_FLAG => false,
        other => {
            log::warn!("Column: illegal header flag {other:#x}, expected 0x00 or 0x01");
            return Err(ColumnError::corrupt(format!(
                "Column: illegal header flag {other:#x}, expected 0x00 or 0x01"
            )));
        }
    };
    let mut pos = 1usize;

    let (dictionary, consumed) = Dictionary::from_bytes(&data[pos..])?;
    pos += consumed;

    let rows = if is_single_valued {
        let (ints, consumed) = VSizeInts::from_bytes(&data[pos..])?;
        pos += consumed;
        RowStorage::Single(ints)
    } else {
        let (ragged, consumed) = VSizeRagged::from_bytes(&data[pos..])?;
        pos += consumed;
        RowStorage::Multi(ragged)
    };
    builder.set_multi_valued(!is_single_valued);

    let (bitmap_index, consumed) = BitmapIndex::from_bytes(&data[pos..])?;
    pos += consumed;
    builder.set_bitmap_index(bitmap_index);

    let spatial_index = if pos < data.len() {
        let (spatial, _consumed) = SpatialIndex::from_bytes(&data[pos..], &factory)?;
        log::debug!("Column: decoded spatial index with {} entries", spatial.len());
        Some(spatial)
    } else {
        None
    };
    if let Some(spatial) = &spatial_index {
        builder.set_spatial_index(spatial.clone());
    }

    let column = DictionaryEncodedColumn::new(
        dictionary,
        rows,
        bitmap_index,
        spatial_index,
        factory,
        column_cache_size_bytes,
    );
    builder.set_dictionary_encoded_column(column);
    Ok(())
}
