//! Heat-map input derived from the currently filtered record subset.
//!
//! The map view centers on the element-wise median of the filtered records'
//! median coordinates and renders a heat overlay from every track point they
//! carry. An empty subset yields no center, and the caller must leave the
//! viewport where it is.

use serde::Serialize;

use crate::ActivityRecord;

/// Everything the map sink needs to redraw the heat overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatmapData {
    /// `[lat, lon]` to center the viewport on; `None` when the filtered set
    /// is empty (no viewport move)
    pub center: Option<[f64; 2]>,
    /// Flattened `[lat, lon]` track points across all filtered records,
    /// in filtered-record order
    pub points: Vec<[f64; 2]>,
}

/// Recompute the heat-map input from the filtered record subset.
pub fn recompute(records: &[&ActivityRecord]) -> HeatmapData {
    let mut latitudes: Vec<f64> = records.iter().map(|r| r.latitude_median).collect();
    let mut longitudes: Vec<f64> = records.iter().map(|r| r.longitude_median).collect();

    let center = match (median(&mut latitudes), median(&mut longitudes)) {
        (Some(lat), Some(lon)) => Some([lat, lon]),
        _ => None,
    };

    let points = records
        .iter()
        .flat_map(|r| r.gpx.iter().copied())
        .collect();

    HeatmapData { center, points }
}

/// Median of a sequence: the middle element of the sorted values, or the
/// mean of the two middle elements when the count is even. Sorts in place.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let half = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[half])
    } else {
        Some((values[half - 1] + values[half]) / 2.0)
    }
}
