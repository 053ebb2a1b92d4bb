//! Time-bucketing granularity for the time-series view.
//!
//! [`IntervalUnit`] maps raw activity timestamps to day/week/month buckets;
//! [`IntervalSelector`] owns the date dimension derived with the current unit
//! and rebuilds it (plus its sum-of-distance group) when the unit changes.

use chrono::{DateTime, Datelike, Days, Months, NaiveTime, Utc};
use log::debug;

use crate::error::Result;
use crate::store::{DimKey, DimensionId, GroupId, Reducer, RecordStore};

/// Day-granularity bar charts get unreadable past this many buckets; the
/// x-axis tick labels downgrade to weekly while bucketing stays per-day.
pub const MAX_DAY_TICKS: usize = 21;

/// Time-bucketing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
}

impl IntervalUnit {
    /// Floor a timestamp to the start of its bucket (midnight UTC).
    /// Weeks start on Sunday.
    pub fn bucket(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let floored = match self {
            IntervalUnit::Day => date,
            IntervalUnit::Week => {
                let back = u64::from(date.weekday().num_days_from_sunday());
                date.checked_sub_days(Days::new(back)).unwrap_or(date)
            }
            IntervalUnit::Month => date.with_day(1).unwrap_or(date),
        };
        floored.and_time(NaiveTime::MIN).and_utc()
    }

    /// Shift a timestamp by a whole number of intervals (used to pad the
    /// axis domain by one bucket on each side).
    pub fn offset(self, ts: DateTime<Utc>, amount: i32) -> DateTime<Utc> {
        match self {
            IntervalUnit::Day => ts + chrono::Duration::days(i64::from(amount)),
            IntervalUnit::Week => ts + chrono::Duration::weeks(i64::from(amount)),
            IntervalUnit::Month => {
                let months = Months::new(amount.unsigned_abs());
                if amount >= 0 {
                    ts.checked_add_months(months).unwrap_or(ts)
                } else {
                    ts.checked_sub_months(months).unwrap_or(ts)
                }
            }
        }
    }

    /// Tick granularity to render for the given number of distinct buckets.
    /// Day buckets past [`MAX_DAY_TICKS`] display weekly ticks; bucketing
    /// itself is unaffected.
    pub fn display_ticks(self, distinct_buckets: usize) -> IntervalUnit {
        if self == IntervalUnit::Day && distinct_buckets > MAX_DAY_TICKS {
            IntervalUnit::Week
        } else {
            self
        }
    }
}

/// Owner of the date dimension and its volume group.
///
/// The date dimension is the only dimension destroyed and recreated during a
/// session: switching the unit disposes it and derives a fresh one with the
/// new bucketing. Filters on every other dimension survive the rebuild; the
/// date dimension's own filter is lifted with it.
pub struct IntervalSelector {
    unit: IntervalUnit,
    date_dim: DimensionId,
    volume_group: GroupId,
}

impl IntervalSelector {
    /// Derive the date dimension on the store with the given unit.
    pub fn new(store: &mut RecordStore, unit: IntervalUnit) -> Result<Self> {
        let (date_dim, volume_group) = Self::derive(store, unit)?;
        Ok(Self {
            unit,
            date_dim,
            volume_group,
        })
    }

    fn derive(store: &mut RecordStore, unit: IntervalUnit) -> Result<(DimensionId, GroupId)> {
        let dim = store.dimension(Box::new(move |record| {
            DimKey::Stamp(unit.bucket(record.date).timestamp())
        }))?;
        let group = store.group(dim, Reducer::SumDistance)?;
        Ok((dim, group))
    }

    /// Switch the bucketing unit, rebuilding the date dimension and its
    /// sum-of-distance group.
    pub fn set_unit(&mut self, store: &mut RecordStore, unit: IntervalUnit) -> Result<()> {
        debug!("[IntervalSelector] Rebuilding date dimension at {:?}", unit);
        store.dispose(self.date_dim)?;
        let (date_dim, volume_group) = Self::derive(store, unit)?;
        self.unit = unit;
        self.date_dim = date_dim;
        self.volume_group = volume_group;
        Ok(())
    }

    /// Re-derive the date dimension at the currently selected unit
    /// (used after the record set is replaced).
    pub fn rebuild(&mut self, store: &mut RecordStore) -> Result<()> {
        self.set_unit(store, self.unit)
    }

    /// Currently selected unit.
    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Handle of the current date dimension.
    pub fn date_dim(&self) -> DimensionId {
        self.date_dim
    }

    /// Handle of the current volume-by-interval group.
    pub fn volume_group(&self) -> GroupId {
        self.volume_group
    }

    /// Tick granularity for the current bucket count.
    pub fn display_tick_unit(&self, store: &RecordStore) -> Result<IntervalUnit> {
        let buckets = store.group_bin_count(self.volume_group)?;
        Ok(self.unit.display_ticks(buckets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Filter;
    use crate::ActivityRecord;
    use chrono::TimeZone;

    fn record(day: u32, activity_type: &str, distance: f64) -> ActivityRecord {
        ActivityRecord {
            date: Utc.with_ymd_and_hms(2021, 1, day, 14, 15, 0).unwrap(),
            activity_type: activity_type.to_string(),
            distance,
            latitude_median: 51.5,
            longitude_median: -0.12,
            gpx: Vec::new(),
        }
    }

    #[test]
    fn test_day_bucket_floors_to_midnight() {
        let ts = Utc.with_ymd_and_hms(2021, 1, 5, 23, 59, 59).unwrap();
        let bucket = IntervalUnit::Day.bucket(ts);
        assert_eq!(bucket, Utc.with_ymd_and_hms(2021, 1, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_week_bucket_starts_sunday() {
        // 2021-01-05 is a Tuesday; its week starts Sunday 2021-01-03
        let ts = Utc.with_ymd_and_hms(2021, 1, 5, 12, 0, 0).unwrap();
        let bucket = IntervalUnit::Week.bucket(ts);
        assert_eq!(bucket, Utc.with_ymd_and_hms(2021, 1, 3, 0, 0, 0).unwrap());

        // A Sunday stays put
        let sunday = Utc.with_ymd_and_hms(2021, 1, 3, 6, 0, 0).unwrap();
        assert_eq!(
            IntervalUnit::Week.bucket(sunday),
            Utc.with_ymd_and_hms(2021, 1, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_month_bucket_and_offset() {
        let ts = Utc.with_ymd_and_hms(2021, 3, 17, 9, 0, 0).unwrap();
        assert_eq!(
            IntervalUnit::Month.bucket(ts),
            Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap()
        );
        let padded = IntervalUnit::Month.offset(IntervalUnit::Month.bucket(ts), -1);
        assert_eq!(padded, Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_tick_downgrade_threshold() {
        assert_eq!(IntervalUnit::Day.display_ticks(25), IntervalUnit::Week);
        assert_eq!(IntervalUnit::Day.display_ticks(20), IntervalUnit::Day);
        assert_eq!(IntervalUnit::Day.display_ticks(21), IntervalUnit::Day);
        // Only day granularity downgrades
        assert_eq!(IntervalUnit::Month.display_ticks(100), IntervalUnit::Month);
    }

    #[test]
    fn test_set_unit_regroups_and_preserves_total() {
        let mut store = RecordStore::new();
        let mut selector = IntervalSelector::new(&mut store, IntervalUnit::Day).unwrap();

        // 40 daily records starting on a Sunday (2021-01-03 is a Sunday)
        let records: Vec<ActivityRecord> = (0..40)
            .map(|i| {
                let date = Utc.with_ymd_and_hms(2021, 1, 3, 10, 0, 0).unwrap()
                    + chrono::Duration::days(i);
                ActivityRecord {
                    date,
                    activity_type: "Ride".to_string(),
                    distance: 10.0,
                    latitude_median: 51.5,
                    longitude_median: -0.12,
                    gpx: Vec::new(),
                }
            })
            .collect();
        store.add(records);

        assert_eq!(store.group_bin_count(selector.volume_group()).unwrap(), 40);
        let daily_total: f64 = store
            .group_bins(selector.volume_group())
            .unwrap()
            .iter()
            .map(|(_, v)| v)
            .sum();

        selector.set_unit(&mut store, IntervalUnit::Week).unwrap();
        let weekly_buckets = store.group_bin_count(selector.volume_group()).unwrap();
        assert!(weekly_buckets <= 6, "expected <= 6 weekly buckets, got {}", weekly_buckets);

        let weekly_total: f64 = store
            .group_bins(selector.volume_group())
            .unwrap()
            .iter()
            .map(|(_, v)| v)
            .sum();
        assert_eq!(weekly_total, daily_total);
    }

    #[test]
    fn test_set_unit_preserves_other_dimension_filters() {
        let mut store = RecordStore::new();
        let types = store
            .dimension(Box::new(|r: &ActivityRecord| {
                DimKey::Text(r.activity_type.clone())
            }))
            .unwrap();
        let mut selector = IntervalSelector::new(&mut store, IntervalUnit::Day).unwrap();
        store.add(vec![
            record(1, "Ride", 30.0),
            record(2, "Run", 10.0),
            record(3, "Ride", 25.0),
        ]);

        store
            .set_filter(types, Some(Filter::Exact(DimKey::Text("Ride".to_string()))))
            .unwrap();
        selector.set_unit(&mut store, IntervalUnit::Month).unwrap();

        // The type filter survived the rebuild
        assert!(store.filter_of(types).unwrap().is_some());
        let volume: f64 = store
            .group_bins(selector.volume_group())
            .unwrap()
            .iter()
            .map(|(_, v)| v)
            .sum();
        assert_eq!(volume, 55.0);
    }
}
