//! # Dashboard Engine
//!
//! Stateful owner of everything one dashboard session needs: the record
//! store, the standard dimensions and aggregates of the activity dashboard
//! (distance by activity type, volume by time bucket, running total), the
//! interval selector, the filter coordinator with its rendering sinks, the
//! refresh epoch, and the current heat-map input.
//!
//! ## Event flow
//!
//! A refresh populates the store → the interval selector derives the date
//! dimension → sinks render against the store's groups → a user interaction
//! filters a dimension → the coordinator pokes the other sinks → the heat-map
//! is recomputed from the filtered subset.
//!
//! All mutation happens on discrete event callbacks through `&mut self`;
//! concurrent refreshes resolve by epoch token (last-write-wins).

use chrono::{DateTime, Utc};
use log::info;

use crate::coordinator::{self, AxisDomain, FilterCoordinator, RenderSink};
use crate::error::Result;
use crate::heatmap::{self, HeatmapData};
use crate::interval::{IntervalSelector, IntervalUnit};
use crate::refresh::{DataRefresher, RefreshToken};
use crate::session::UserSession;
use crate::store::{AllGroupId, DimKey, DimensionId, Filter, GroupId, Reducer, RecordStore};
use crate::{ActivityRecord, DateRange};

/// The dashboard's shared state and event hub.
pub struct DashboardEngine {
    store: RecordStore,
    /// Retained full record set, re-added wholesale on reset
    data: Vec<ActivityRecord>,
    requested_range: DateRange,

    type_dim: DimensionId,
    distance_by_type: GroupId,
    total_distance: AllGroupId,
    selector: IntervalSelector,

    coordinator: FilterCoordinator,
    refresher: DataRefresher,
    heatmap: HeatmapData,
    axis: AxisDomain,
    session: Option<UserSession>,
}

impl DashboardEngine {
    /// Create an engine with an empty store, day bucketing, and the given
    /// requested date range (used as the axis-domain fallback until data
    /// arrives).
    pub fn new(range: DateRange) -> Result<Self> {
        let mut store = RecordStore::new();
        let type_dim = store.dimension(Box::new(|record: &ActivityRecord| {
            DimKey::Text(record.activity_type.clone())
        }))?;
        let distance_by_type = store.group(type_dim, Reducer::SumDistance)?;
        let total_distance = store.group_all(Reducer::SumDistance);
        let selector = IntervalSelector::new(&mut store, IntervalUnit::Day)?;
        let axis = coordinator::axis_domain(&store, selector.date_dim(), selector.unit(), &range)?;

        Ok(Self {
            store,
            data: Vec::new(),
            requested_range: range,
            type_dim,
            distance_by_type,
            total_distance,
            selector,
            coordinator: FilterCoordinator::new(),
            refresher: DataRefresher::new(),
            heatmap: HeatmapData::default(),
            axis,
            session: None,
        })
    }

    /// Register a rendering sink with the coordinator.
    pub fn register_sink(&mut self, sink: Box<dyn RenderSink>) {
        self.coordinator.register(sink);
    }

    // ========================================================================
    // Refresh (user switch / date-range change)
    // ========================================================================

    /// Start a refresh attempt; earlier in-flight fetches become stale.
    pub fn begin_refresh(&mut self) -> RefreshToken {
        self.refresher.begin()
    }

    /// Apply a completed fetch. Returns `Ok(false)` without touching any
    /// state when the token is stale (a newer refresh began meanwhile) —
    /// last-write-wins. On a fetch error the caller simply never gets here,
    /// leaving the previously rendered data in place.
    pub fn complete_refresh(
        &mut self,
        token: RefreshToken,
        records: Vec<ActivityRecord>,
        range: DateRange,
    ) -> Result<bool> {
        if !self.refresher.is_current(token) {
            return Ok(false);
        }
        info!("[DashboardEngine] Applying refresh: {} records", records.len());
        self.data = records;
        self.requested_range = range;
        self.rebuild_from_data(true)?;
        Ok(true)
    }

    /// Full reset back to the unfiltered record set: clear all filters,
    /// remove all records, re-add the retained set, recompute the axis
    /// domain and heat-map, notify every sink.
    pub fn reset_all(&mut self) -> Result<()> {
        self.rebuild_from_data(false)
    }

    fn rebuild_from_data(&mut self, rebuild_date_dim: bool) -> Result<()> {
        self.coordinator.replace_records(&mut self.store, &self.data)?;
        if rebuild_date_dim {
            self.selector.rebuild(&mut self.store)?;
        }
        self.axis = coordinator::axis_domain(
            &self.store,
            self.selector.date_dim(),
            self.selector.unit(),
            &self.requested_range,
        )?;
        // Heat-map over the full unfiltered set (all filters were cleared)
        self.heatmap = heatmap::recompute(&self.store.filtered());
        self.coordinator.notify_data_refreshed(&self.store);
        Ok(())
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    /// Filter the pie chart's dimension to the given activity types
    /// (`None` clears).
    pub fn filter_activity_types(&mut self, types: Option<Vec<String>>) -> Result<()> {
        let filter =
            types.map(|names| Filter::OneOf(names.into_iter().map(DimKey::Text).collect()));
        self.apply_filter(self.type_dim, filter)
    }

    /// Filter the time chart's dimension to the half-open window
    /// `[start, end)` over bucketed dates (`None` clears).
    pub fn filter_date_window(
        &mut self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<()> {
        let filter = window.map(|(start, end)| Filter::Range {
            start: DimKey::Stamp(start.timestamp()),
            end: DimKey::Stamp(end.timestamp()),
        });
        self.apply_filter(self.selector.date_dim(), filter)
    }

    /// Set any dimension's filter, recompute the heat-map from the filtered
    /// subset, and notify every sink.
    pub fn apply_filter(&mut self, dim: DimensionId, filter: Option<Filter>) -> Result<()> {
        self.store.set_filter(dim, filter)?;
        self.heatmap = heatmap::recompute(&self.store.filtered());
        self.coordinator.notify_filter_changed(&self.store, dim);
        Ok(())
    }

    // ========================================================================
    // Interval selection
    // ========================================================================

    /// Switch the time-bucketing unit. The date dimension is rebuilt (its own
    /// filter is lifted with it); every other dimension's filter survives.
    pub fn set_interval_unit(&mut self, unit: IntervalUnit) -> Result<()> {
        self.selector.set_unit(&mut self.store, unit)?;
        self.axis = coordinator::axis_domain(
            &self.store,
            self.selector.date_dim(),
            self.selector.unit(),
            &self.requested_range,
        )?;
        self.heatmap = heatmap::recompute(&self.store.filtered());
        self.coordinator.notify_data_refreshed(&self.store);
        Ok(())
    }

    /// Currently selected bucketing unit.
    pub fn interval_unit(&self) -> IntervalUnit {
        self.selector.unit()
    }

    /// Tick granularity the time chart should render (day buckets past the
    /// threshold display weekly ticks).
    pub fn display_tick_unit(&self) -> Result<IntervalUnit> {
        self.selector.display_tick_unit(&self.store)
    }

    // ========================================================================
    // Queries for the rendering sinks
    // ========================================================================

    /// Running total of distance over the filtered set.
    pub fn total_distance(&self) -> Result<f64> {
        self.store.group_all_value(self.total_distance)
    }

    /// Distance summed per activity type (the pie chart's group). Includes
    /// every type present in the store; the type dimension's own filter is
    /// excluded, other filters apply.
    pub fn distance_by_type(&self) -> Result<Vec<(String, f64)>> {
        Ok(self
            .store
            .group_bins(self.distance_by_type)?
            .into_iter()
            .filter_map(|(key, value)| match key {
                DimKey::Text(name) => Some((name, value)),
                DimKey::Stamp(_) => None,
            })
            .collect())
    }

    /// Distance summed per time bucket (the bar chart's group), in bucket
    /// order.
    pub fn volume_by_interval(&self) -> Result<Vec<(DateTime<Utc>, f64)>> {
        Ok(self
            .store
            .group_bins(self.selector.volume_group())?
            .into_iter()
            .filter_map(|(key, value)| match key {
                DimKey::Stamp(seconds) => {
                    DateTime::from_timestamp(seconds, 0).map(|bucket| (bucket, value))
                }
                DimKey::Text(_) => None,
            })
            .collect())
    }

    /// Current x-axis domain (recomputed on refresh, reset, and interval
    /// change).
    pub fn axis_domain(&self) -> AxisDomain {
        self.axis
    }

    /// Current heat-map input, derived from the filtered subset.
    pub fn heatmap(&self) -> &HeatmapData {
        &self.heatmap
    }

    /// Records passing every active filter, in insertion order.
    pub fn filtered_records(&self) -> Vec<&ActivityRecord> {
        self.store.filtered()
    }

    /// Total records in the store.
    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    /// Handle of the activity-type dimension.
    pub fn type_dim(&self) -> DimensionId {
        self.type_dim
    }

    /// Handle of the current date dimension.
    pub fn date_dim(&self) -> DimensionId {
        self.selector.date_dim()
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Select a user (90-day session, like the original cookie).
    pub fn set_user(&mut self, user_id: &str, now: DateTime<Utc>) {
        self.session = Some(UserSession::new(user_id, now));
    }

    /// Selected user id, if the session has not expired.
    pub fn session_user(&self, now: DateTime<Utc>) -> Option<&str> {
        self.session
            .as_ref()
            .filter(|session| !session.is_expired(now))
            .map(|session| session.user_id.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
