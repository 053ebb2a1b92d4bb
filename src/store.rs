//! # Record Store
//!
//! In-memory multi-dimensional index over the fetched activity set.
//!
//! The store follows the crossfilter model: dimensions are derived, ordered
//! views keyed by a projection function, each holding at most one active
//! filter; groups are reductions (sum of distance, count) maintained per
//! dimension key. Record visibility is tracked with a per-record bitmask
//! (bit `d` set means the record fails dimension `d`'s filter), so aggregates
//! update incrementally on every add, remove, and filter change rather than
//! being recomputed from scratch.
//!
//! Filter semantics match crossfilter:
//! - a group on dimension `d` excludes `d`'s own filter and observes all others
//! - `group_all` observes every active filter
//! - `top`/`bottom` observe every active filter, the dimension's own included
//!
//! Each bin carries `(total, count, hidden, hidden_count)` where `total` only
//! changes on add/remove and `hidden` is snapped to exactly `0.0` whenever
//! `hidden_count` reaches zero. Clearing all filters therefore restores every
//! aggregate to its unfiltered value exactly, and removing then re-adding the
//! full record set reproduces a fresh store bit-for-bit.

use std::collections::BTreeMap;

use crate::error::{DashboardError, Result};
use crate::ActivityRecord;

/// Maximum number of concurrently registered dimensions (bitmask width).
pub const MAX_DIMENSIONS: usize = 32;

// ============================================================================
// Keys, Filters, Reducers
// ============================================================================

/// Ordered dimension key.
///
/// Dimensions over the same store may use different key kinds; a single
/// dimension always produces one kind (activity type keys are `Text`,
/// bucketed dates are `Stamp` epoch seconds).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DimKey {
    Text(String),
    Stamp(i64),
}

/// Projection from a record to its key on one dimension.
pub type KeyFn = Box<dyn Fn(&ActivityRecord) -> DimKey + Send + Sync>;

/// Filter predicate over a dimension's keys. At most one per dimension.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Key equals the given value
    Exact(DimKey),
    /// Key is one of the given values
    OneOf(Vec<DimKey>),
    /// Key falls in the half-open range `[start, end)`
    Range { start: DimKey, end: DimKey },
}

impl Filter {
    /// Check whether a key passes this filter.
    pub fn matches(&self, key: &DimKey) -> bool {
        match self {
            Filter::Exact(value) => key == value,
            Filter::OneOf(values) => values.contains(key),
            Filter::Range { start, end } => key >= start && key < end,
        }
    }
}

/// Reduction applied per dimension key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Sum of record distances
    SumDistance,
    /// Record count
    Count,
}

impl Reducer {
    fn value(self, record: &ActivityRecord) -> f64 {
        match self {
            Reducer::SumDistance => record.distance,
            Reducer::Count => 1.0,
        }
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Handle to a registered dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionId(pub(crate) usize);

/// Handle to a group registered on a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupId {
    dim: usize,
    slot: usize,
}

/// Handle to a store-wide reduction (observes all filters).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllGroupId(usize);

// ============================================================================
// Internal state
// ============================================================================

/// One aggregate bin. `total`/`count` track all records carrying the bin's
/// key; `hidden`/`hidden_count` track the subset currently filtered out.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Bin {
    total: f64,
    count: usize,
    hidden: f64,
    hidden_count: usize,
}

impl Bin {
    fn add(&mut self, value: f64, visible: bool) {
        self.total += value;
        self.count += 1;
        if !visible {
            self.hidden += value;
            self.hidden_count += 1;
        }
    }

    fn sub(&mut self, value: f64, visible: bool) {
        self.total -= value;
        self.count -= 1;
        if !visible {
            self.hidden -= value;
            self.hidden_count -= 1;
        }
        // Snap to exact zero so a full remove/re-add cycle leaves no residue
        if self.count == 0 {
            self.total = 0.0;
        }
        if self.hidden_count == 0 {
            self.hidden = 0.0;
        }
    }

    fn hide(&mut self, value: f64) {
        self.hidden += value;
        self.hidden_count += 1;
    }

    fn reveal(&mut self, value: f64) {
        self.hidden -= value;
        self.hidden_count -= 1;
        if self.hidden_count == 0 {
            self.hidden = 0.0;
        }
    }

    fn visible(&self) -> f64 {
        if self.hidden_count == 0 {
            self.total
        } else {
            self.total - self.hidden
        }
    }
}

struct GroupState {
    reducer: Reducer,
    bins: BTreeMap<DimKey, Bin>,
}

struct DimensionState {
    key_fn: KeyFn,
    /// Key per record, parallel to `RecordStore::records`
    keys: Vec<DimKey>,
    filter: Option<Filter>,
    groups: Vec<GroupState>,
}

// ============================================================================
// Record Store
// ============================================================================

/// Multi-dimensional index over the current activity set.
///
/// Records are owned exclusively by the store for the lifetime of one
/// dashboard session and replaced wholesale on refresh. All mutation happens
/// through `&mut self`, so no reader can observe an intermediate state of an
/// add or remove.
pub struct RecordStore {
    records: Vec<ActivityRecord>,
    /// Bit `d` set = record fails dimension `d`'s filter
    masks: Vec<u32>,
    dims: Vec<Option<DimensionState>>,
    all_groups: Vec<(Reducer, Bin)>,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            masks: Vec::new(),
            dims: Vec::new(),
            all_groups: Vec::new(),
        }
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Add records, updating every dimension and aggregate incrementally.
    pub fn add(&mut self, records: Vec<ActivityRecord>) {
        for record in records {
            let idx = self.records.len();

            // First pass: derive keys and this record's filter mask
            let mut mask = 0u32;
            for (d, slot) in self.dims.iter_mut().enumerate() {
                let Some(dim) = slot else { continue };
                let key = (dim.key_fn)(&record);
                if let Some(filter) = &dim.filter {
                    if !filter.matches(&key) {
                        mask |= 1 << d;
                    }
                }
                dim.keys.push(key);
            }

            // Second pass: fold into every aggregate
            for (d, slot) in self.dims.iter_mut().enumerate() {
                let Some(dim) = slot else { continue };
                let visible = mask & !(1u32 << d) == 0;
                let key = &dim.keys[idx];
                for group in &mut dim.groups {
                    let value = group.reducer.value(&record);
                    group.bins.entry(key.clone()).or_default().add(value, visible);
                }
            }
            for (reducer, bin) in &mut self.all_groups {
                bin.add(reducer.value(&record), mask == 0);
            }

            self.masks.push(mask);
            self.records.push(record);
        }
    }

    /// Remove all records matching the predicate from the store and from
    /// every derived dimension and aggregate. The removal is complete before
    /// any reader can run again.
    pub fn remove_where<P>(&mut self, predicate: P)
    where
        P: Fn(&ActivityRecord) -> bool,
    {
        let doomed: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| predicate(record))
            .map(|(idx, _)| idx)
            .collect();
        if doomed.is_empty() {
            return;
        }

        for &idx in &doomed {
            let mask = self.masks[idx];
            let record = &self.records[idx];

            for (d, slot) in self.dims.iter_mut().enumerate() {
                let Some(dim) = slot else { continue };
                let visible = mask & !(1u32 << d) == 0;
                let key = &dim.keys[idx];
                for group in &mut dim.groups {
                    let value = group.reducer.value(record);
                    let empty = match group.bins.get_mut(key) {
                        Some(bin) => {
                            bin.sub(value, visible);
                            bin.count == 0
                        }
                        None => false,
                    };
                    if empty {
                        group.bins.remove(key);
                    }
                }
            }
            for (reducer, bin) in &mut self.all_groups {
                bin.sub(reducer.value(record), mask == 0);
            }
        }

        let mut keep = vec![true; self.records.len()];
        for &idx in &doomed {
            keep[idx] = false;
        }
        retain_by(&mut self.records, &keep);
        retain_by(&mut self.masks, &keep);
        for dim in self.dims.iter_mut().flatten() {
            retain_by(&mut dim.keys, &keep);
        }
    }

    /// Remove every record. Dimensions, groups, and filters stay registered;
    /// group bins empty out and store-wide reductions return to zero.
    pub fn clear(&mut self) {
        self.remove_where(|_| true);
    }

    /// Number of records in the store (filtered or not).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records passing every active filter, in insertion order.
    pub fn filtered(&self) -> Vec<&ActivityRecord> {
        self.records
            .iter()
            .zip(&self.masks)
            .filter(|(_, &mask)| mask == 0)
            .map(|(record, _)| record)
            .collect()
    }

    /// Number of records passing every active filter.
    pub fn filtered_len(&self) -> usize {
        self.masks.iter().filter(|&&mask| mask == 0).count()
    }

    // ========================================================================
    // Dimensions
    // ========================================================================

    /// Register a dimension keyed by the given projection.
    ///
    /// Keys are derived immediately for every record already in the store.
    /// Slots freed by `dispose` are reused; at most [`MAX_DIMENSIONS`]
    /// dimensions can be live at once.
    pub fn dimension(&mut self, key_fn: KeyFn) -> Result<DimensionId> {
        let slot = match self.dims.iter().position(|slot| slot.is_none()) {
            Some(slot) => slot,
            None => {
                if self.dims.len() >= MAX_DIMENSIONS {
                    return Err(DashboardError::DimensionLimit {
                        limit: MAX_DIMENSIONS,
                    });
                }
                self.dims.push(None);
                self.dims.len() - 1
            }
        };

        let keys = self.records.iter().map(|record| key_fn(record)).collect();
        self.dims[slot] = Some(DimensionState {
            key_fn,
            keys,
            filter: None,
            groups: Vec::new(),
        });
        Ok(DimensionId(slot))
    }

    /// Destroy a dimension, lifting its filter and dropping its groups.
    /// The slot becomes available for a replacement dimension.
    pub fn dispose(&mut self, dim: DimensionId) -> Result<()> {
        self.set_filter(dim, None)?;
        self.dims[dim.0] = None;
        Ok(())
    }

    /// Replace the dimension's active filter (`None` clears it), applying
    /// visibility deltas to every other dimension's aggregates.
    pub fn set_filter(&mut self, dim: DimensionId, filter: Option<Filter>) -> Result<()> {
        let d = dim.0;
        let bit = 1u32 << d;

        // Records whose visibility bit flips under the new filter
        let flipped: Vec<usize> = {
            let Some(dim_state) = self.dims.get(d).and_then(|slot| slot.as_ref()) else {
                return Err(DashboardError::UnknownDimension { index: d });
            };
            dim_state
                .keys
                .iter()
                .enumerate()
                .filter(|(idx, key)| {
                    let fails = filter.as_ref().map_or(false, |f| !f.matches(key));
                    fails != (self.masks[*idx] & bit != 0)
                })
                .map(|(idx, _)| idx)
                .collect()
        };

        for idx in flipped {
            let old_mask = self.masks[idx];
            let new_mask = old_mask ^ bit;
            self.masks[idx] = new_mask;
            let record = &self.records[idx];

            for (d2, slot) in self.dims.iter_mut().enumerate() {
                let Some(other) = slot else { continue };
                let exclude = !(1u32 << d2);
                let was = old_mask & exclude == 0;
                let now = new_mask & exclude == 0;
                // A dimension's own groups exclude its own filter bit
                if was == now {
                    continue;
                }
                let key = &other.keys[idx];
                for group in &mut other.groups {
                    let value = group.reducer.value(record);
                    if let Some(bin) = group.bins.get_mut(key) {
                        if now {
                            bin.reveal(value);
                        } else {
                            bin.hide(value);
                        }
                    }
                }
            }
            for (reducer, bin) in &mut self.all_groups {
                let was = old_mask == 0;
                let now = new_mask == 0;
                if was == now {
                    continue;
                }
                let value = reducer.value(record);
                if now {
                    bin.reveal(value);
                } else {
                    bin.hide(value);
                }
            }
        }

        if let Some(dim_state) = self.dims.get_mut(d).and_then(|slot| slot.as_mut()) {
            dim_state.filter = filter;
        }
        Ok(())
    }

    /// The dimension's currently active filter, if any.
    pub fn filter_of(&self, dim: DimensionId) -> Result<Option<&Filter>> {
        self.dims
            .get(dim.0)
            .and_then(|slot| slot.as_ref())
            .map(|dim_state| dim_state.filter.as_ref())
            .ok_or(DashboardError::UnknownDimension { index: dim.0 })
    }

    /// Clear every active filter on every dimension.
    pub fn clear_all_filters(&mut self) -> Result<()> {
        let active: Vec<usize> = self
            .dims
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().map_or(false, |d| d.filter.is_some()))
            .map(|(idx, _)| idx)
            .collect();
        for d in active {
            self.set_filter(DimensionId(d), None)?;
        }
        Ok(())
    }

    // ========================================================================
    // Groups
    // ========================================================================

    /// Register a reduction on a dimension. Bins are seeded from the current
    /// record set and maintained incrementally afterwards.
    pub fn group(&mut self, dim: DimensionId, reducer: Reducer) -> Result<GroupId> {
        let d = dim.0;
        let mut bins: BTreeMap<DimKey, Bin> = BTreeMap::new();
        {
            let Some(dim_state) = self.dims.get(d).and_then(|slot| slot.as_ref()) else {
                return Err(DashboardError::UnknownDimension { index: d });
            };
            let exclude = !(1u32 << d);
            for (idx, key) in dim_state.keys.iter().enumerate() {
                let visible = self.masks[idx] & exclude == 0;
                let value = reducer.value(&self.records[idx]);
                bins.entry(key.clone()).or_default().add(value, visible);
            }
        }

        let Some(dim_state) = self.dims.get_mut(d).and_then(|slot| slot.as_mut()) else {
            return Err(DashboardError::UnknownDimension { index: d });
        };
        dim_state.groups.push(GroupState { reducer, bins });
        Ok(GroupId {
            dim: d,
            slot: dim_state.groups.len() - 1,
        })
    }

    /// Register a store-wide reduction observing all filters (the dashboard's
    /// running total).
    pub fn group_all(&mut self, reducer: Reducer) -> AllGroupId {
        let mut bin = Bin::default();
        for (record, &mask) in self.records.iter().zip(&self.masks) {
            bin.add(reducer.value(record), mask == 0);
        }
        self.all_groups.push((reducer, bin));
        AllGroupId(self.all_groups.len() - 1)
    }

    /// Current bins of a group as `(key, reduced value)`, in key order.
    /// Bins whose records are all filtered out report `0.0`.
    pub fn group_bins(&self, group: GroupId) -> Result<Vec<(DimKey, f64)>> {
        let state = self.group_state(group)?;
        Ok(state
            .bins
            .iter()
            .map(|(key, bin)| (key.clone(), bin.visible()))
            .collect())
    }

    /// Number of bins in a group (distinct keys among records in the store).
    pub fn group_bin_count(&self, group: GroupId) -> Result<usize> {
        Ok(self.group_state(group)?.bins.len())
    }

    /// Current value of a store-wide reduction.
    pub fn group_all_value(&self, group: AllGroupId) -> Result<f64> {
        self.all_groups
            .get(group.0)
            .map(|(_, bin)| bin.visible())
            .ok_or(DashboardError::UnknownGroup {
                dimension: 0,
                slot: group.0,
            })
    }

    fn group_state(&self, group: GroupId) -> Result<&GroupState> {
        self.dims
            .get(group.dim)
            .and_then(|slot| slot.as_ref())
            .and_then(|dim_state| dim_state.groups.get(group.slot))
            .ok_or(DashboardError::UnknownGroup {
                dimension: group.dim,
                slot: group.slot,
            })
    }

    // ========================================================================
    // Ordered access
    // ========================================================================

    /// The `n` records with the largest keys on this dimension under the
    /// currently filtered view, ordered by descending key.
    pub fn top(&self, dim: DimensionId, n: usize) -> Result<Vec<&ActivityRecord>> {
        let ordered = self.visible_by_key(dim)?;
        Ok(ordered
            .iter()
            .rev()
            .take(n)
            .map(|&(_, idx)| &self.records[idx])
            .collect())
    }

    /// The `n` records with the smallest keys on this dimension under the
    /// currently filtered view, ordered by ascending key.
    pub fn bottom(&self, dim: DimensionId, n: usize) -> Result<Vec<&ActivityRecord>> {
        let ordered = self.visible_by_key(dim)?;
        Ok(ordered
            .iter()
            .take(n)
            .map(|&(_, idx)| &self.records[idx])
            .collect())
    }

    fn visible_by_key(&self, dim: DimensionId) -> Result<Vec<(&DimKey, usize)>> {
        let Some(dim_state) = self.dims.get(dim.0).and_then(|slot| slot.as_ref()) else {
            return Err(DashboardError::UnknownDimension { index: dim.0 });
        };
        let mut visible: Vec<(&DimKey, usize)> = dim_state
            .keys
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.masks[*idx] == 0)
            .map(|(idx, key)| (key, idx))
            .collect();
        visible.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));
        Ok(visible)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Retain `items[i]` where `keep[i]` is true, preserving order.
fn retain_by<T>(items: &mut Vec<T>, keep: &[bool]) {
    let mut idx = 0;
    items.retain(|_| {
        let keeping = keep[idx];
        idx += 1;
        keeping
    });
}

// ============================================================================
// Tests
// ============================================================================
