//! Filter propagation between the visualizations sharing one record store.
//!
//! Rendering surfaces (pie chart, running total, bar chart, map) register as
//! [`RenderSink`]s and are notified explicitly whenever a filter changes or
//! the record set is replaced. This replaces the chart library's internal
//! clear-then-refilter redraw dance with a plain publish/subscribe: each sink
//! reads whatever it needs from the store when poked.

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::Result;
use crate::interval::IntervalUnit;
use crate::store::{DimensionId, Filter, RecordStore};
use crate::DateRange;

/// X-axis bounds for the time-series chart, padded by one interval on each
/// side of the data's actual min/max date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisDomain {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Observer interface for rendering surfaces.
///
/// Sinks are injected rather than discovered through globals; the engine
/// never knows what a sink draws, only that it wants poking.
pub trait RenderSink {
    /// A filter on `source` changed; re-render against the updated aggregates.
    fn on_filter_changed(&mut self, store: &RecordStore, source: DimensionId);

    /// The record set was replaced (user switch, date-range change, reset).
    fn on_data_refreshed(&mut self, store: &RecordStore);
}

/// Propagates filter and refresh events to every registered sink.
pub struct FilterCoordinator {
    sinks: Vec<Box<dyn RenderSink>>,
}

impl FilterCoordinator {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Register a rendering sink.
    pub fn register(&mut self, sink: Box<dyn RenderSink>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Set a dimension's filter and notify every registered sink. The
    /// triggering dimension's filter is touched exactly once, by the
    /// requested change itself.
    pub fn apply_filter(
        &mut self,
        store: &mut RecordStore,
        dim: DimensionId,
        filter: Option<Filter>,
    ) -> Result<()> {
        store.set_filter(dim, filter)?;
        self.notify_filter_changed(store, dim);
        Ok(())
    }

    /// Poke every sink after a filter change on `source`.
    pub fn notify_filter_changed(&mut self, store: &RecordStore, source: DimensionId) {
        debug!(
            "[FilterCoordinator] Filter changed on dimension {:?}, notifying {} sinks",
            source,
            self.sinks.len()
        );
        for sink in &mut self.sinks {
            sink.on_filter_changed(store, source);
        }
    }

    /// Poke every sink after the record set was replaced.
    pub fn notify_data_refreshed(&mut self, store: &RecordStore) {
        for sink in &mut self.sinks {
            sink.on_data_refreshed(store);
        }
    }

    /// Full-reset record replacement: clear all filters, remove every record,
    /// re-add the given set. Callers recompute the axis domain and notify
    /// dependents afterwards (see [`axis_domain`]).
    pub fn replace_records(
        &mut self,
        store: &mut RecordStore,
        records: &[crate::ActivityRecord],
    ) -> Result<()> {
        store.clear_all_filters()?;
        store.clear();
        store.add(records.to_vec());
        Ok(())
    }
}

impl Default for FilterCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the x-axis domain from the data's actual min/max date, falling
/// back to the requested date-range boundaries when the filtered set is
/// empty. Min comes from `bottom(1)` and max from `top(1)` — deliberately
/// not the same query for both.
pub fn axis_domain(
    store: &RecordStore,
    date_dim: DimensionId,
    unit: IntervalUnit,
    fallback: &DateRange,
) -> Result<AxisDomain> {
    let min = store
        .bottom(date_dim, 1)?
        .first()
        .map(|record| record.date)
        .unwrap_or_else(|| fallback.start_bound());
    let max = store
        .top(date_dim, 1)?
        .first()
        .map(|record| record.date)
        .unwrap_or_else(|| fallback.end_bound());

    Ok(AxisDomain {
        start: unit.offset(min, -1),
        end: unit.offset(max, 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DimKey, Reducer};
    use crate::ActivityRecord;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        filter_events: Arc<AtomicUsize>,
        refresh_events: Arc<AtomicUsize>,
    }

    impl RenderSink for CountingSink {
        fn on_filter_changed(&mut self, _store: &RecordStore, _source: DimensionId) {
            self.filter_events.fetch_add(1, Ordering::Relaxed);
        }

        fn on_data_refreshed(&mut self, _store: &RecordStore) {
            self.refresh_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record(day: u32, activity_type: &str, distance: f64) -> ActivityRecord {
        ActivityRecord {
            date: Utc.with_ymd_and_hms(2021, 1, day, 9, 0, 0).unwrap(),
            activity_type: activity_type.to_string(),
            distance,
            latitude_median: 51.5,
            longitude_median: -0.12,
            gpx: Vec::new(),
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 31).unwrap(),
        )
    }

    #[test]
    fn test_apply_filter_notifies_all_sinks() {
        let mut store = RecordStore::new();
        let types = store
            .dimension(Box::new(|r: &ActivityRecord| {
                DimKey::Text(r.activity_type.clone())
            }))
            .unwrap();
        store.add(vec![record(1, "Ride", 30.0), record(2, "Run", 10.0)]);

        let filters = Arc::new(AtomicUsize::new(0));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let mut coordinator = FilterCoordinator::new();
        for _ in 0..3 {
            coordinator.register(Box::new(CountingSink {
                filter_events: Arc::clone(&filters),
                refresh_events: Arc::clone(&refreshes),
            }));
        }

        coordinator
            .apply_filter(
                &mut store,
                types,
                Some(Filter::Exact(DimKey::Text("Ride".to_string()))),
            )
            .unwrap();

        assert_eq!(filters.load(Ordering::Relaxed), 3);
        assert_eq!(refreshes.load(Ordering::Relaxed), 0);
        // The triggering dimension's filter is exactly what was requested
        assert!(store.filter_of(types).unwrap().is_some());
    }

    #[test]
    fn test_replace_records_clears_filters_and_restores_aggregates() {
        let mut store = RecordStore::new();
        let types = store
            .dimension(Box::new(|r: &ActivityRecord| {
                DimKey::Text(r.activity_type.clone())
            }))
            .unwrap();
        let total = store.group_all(Reducer::SumDistance);
        let data = vec![record(1, "Ride", 30.0), record(2, "Run", 10.0)];
        store.add(data.clone());

        store
            .set_filter(types, Some(Filter::Exact(DimKey::Text("Run".to_string()))))
            .unwrap();
        assert_eq!(store.group_all_value(total).unwrap(), 10.0);

        let mut coordinator = FilterCoordinator::new();
        coordinator.replace_records(&mut store, &data).unwrap();

        assert!(store.filter_of(types).unwrap().is_none());
        assert_eq!(store.group_all_value(total).unwrap(), 40.0);
    }

    #[test]
    fn test_axis_domain_from_data() {
        let mut store = RecordStore::new();
        let dates = store
            .dimension(Box::new(|r: &ActivityRecord| DimKey::Stamp(r.date.timestamp())))
            .unwrap();
        store.add(vec![record(5, "Ride", 30.0), record(20, "Run", 10.0)]);

        let domain = axis_domain(&store, dates, IntervalUnit::Day, &range()).unwrap();
        assert_eq!(
            domain.start,
            Utc.with_ymd_and_hms(2021, 1, 4, 9, 0, 0).unwrap()
        );
        assert_eq!(
            domain.end,
            Utc.with_ymd_and_hms(2021, 1, 21, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_axis_domain_falls_back_to_requested_range_when_empty() {
        let mut store = RecordStore::new();
        let dates = store
            .dimension(Box::new(|r: &ActivityRecord| DimKey::Stamp(r.date.timestamp())))
            .unwrap();

        let domain = axis_domain(&store, dates, IntervalUnit::Day, &range()).unwrap();
        assert_eq!(
            domain.start,
            Utc.with_ymd_and_hms(2020, 12, 31, 0, 0, 0).unwrap()
        );
        assert_eq!(
            domain.end,
            Utc.with_ymd_and_hms(2021, 4, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_axis_domain_respects_active_filters() {
        let mut store = RecordStore::new();
        let types = store
            .dimension(Box::new(|r: &ActivityRecord| {
                DimKey::Text(r.activity_type.clone())
            }))
            .unwrap();
        let dates = store
            .dimension(Box::new(|r: &ActivityRecord| DimKey::Stamp(r.date.timestamp())))
            .unwrap();
        store.add(vec![
            record(5, "Ride", 30.0),
            record(10, "Run", 10.0),
            record(20, "Ride", 25.0),
        ]);
        store
            .set_filter(types, Some(Filter::Exact(DimKey::Text("Run".to_string()))))
            .unwrap();

        let domain = axis_domain(&store, dates, IntervalUnit::Day, &range()).unwrap();
        // Only the Run record on the 10th is visible
        assert_eq!(
            domain.start,
            Utc.with_ymd_and_hms(2021, 1, 9, 9, 0, 0).unwrap()
        );
        assert_eq!(
            domain.end,
            Utc.with_ymd_and_hms(2021, 1, 11, 9, 0, 0).unwrap()
        );
    }
}
