//! Query circle → candidate bucket keys.
//!
//! The search area is over-approximated by a rectangle of whole geohash cells
//! around the cell containing the center. Cell counts per axis come from the
//! local size of that cell in meters and are capped at [`MAX_CELL_SPAN`], which
//! bounds a query to at most `(2·32+1)²` candidate keys regardless of radius or
//! latitude.

use crate::geohash;
use crate::types::Location;
use rustc_hash::FxHashSet;

/// Upper bound on cells walked in each direction along one axis.
pub const MAX_CELL_SPAN: u32 = 32;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Computes the geohash keys at `precision` that may hold records within
/// `radius_meters` of `center`.
///
/// Keys come back sorted and unique. An invalid center yields no keys; a
/// non-positive or non-finite radius yields just the center cell.
///
/// # Examples
///
/// ```
/// use festa::{expansion::candidate_keys, Location};
///
/// let keys = candidate_keys(Location::new(35.6812, 139.7671), 3_000.0, 5);
/// assert!(keys.contains(&"xn76u".to_string()));
/// assert_eq!(keys.len(), 9);
/// ```
pub fn candidate_keys(center: Location, radius_meters: f64, precision: u8) -> Vec<String> {
    let center_hash = geohash::encode(center.latitude, center.longitude, precision);
    if center_hash.is_empty() {
        return Vec::new();
    }

    let cell = geohash::bounding_box(&center_hash);
    let (cell_lat, cell_lng) = cell.center();
    let (height_m, width_m) = cell_size_meters(cell.lat_span(), cell.lng_span(), cell_lat);

    let radius = if radius_meters.is_finite() {
        radius_meters.max(0.0)
    } else {
        0.0
    };
    let lat_cells = cells_needed(radius, height_m);
    let lng_cells = cells_needed(radius, width_m);

    let mut keys = FxHashSet::default();
    keys.insert(center_hash);
    for dy in -lat_cells..=lat_cells {
        let lat = cell_lat + dy as f64 * cell.lat_span();
        if !(-90.0..=90.0).contains(&lat) {
            continue;
        }
        for dx in -lng_cells..=lng_cells {
            let lng = wrap_longitude(cell_lng + dx as f64 * cell.lng_span());
            let key = geohash::encode(lat, lng, precision);
            if !key.is_empty() {
                keys.insert(key);
            }
        }
    }

    let mut keys: Vec<String> = keys.into_iter().collect();
    keys.sort_unstable();
    tracing::debug!(
        precision,
        radius_m = radius,
        lat_cells,
        lng_cells,
        candidates = keys.len(),
        "expanded query circle"
    );
    keys
}

/// Cell height and width in meters, small-angle approximation at `lat`.
fn cell_size_meters(lat_span: f64, lng_span: f64, lat: f64) -> (f64, f64) {
    let height = lat_span * METERS_PER_DEGREE;
    let width = lng_span * METERS_PER_DEGREE * lat.to_radians().cos().abs();
    (height, width)
}

fn cells_needed(radius_m: f64, cell_m: f64) -> i64 {
    if cell_m <= f64::EPSILON {
        return MAX_CELL_SPAN as i64;
    }
    ((radius_m / cell_m).ceil() as i64).clamp(0, MAX_CELL_SPAN as i64)
}

fn wrap_longitude(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}
