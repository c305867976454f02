//! Base32 geohash encoding and decoding.
//!
//! A geohash interleaves longitude and latitude bisection bits (longitude
//! first) and spells them five at a time in the alphabet below. Longer hashes
//! name smaller cells; at precision 5 a cell is roughly 4.9 km × 4.9 km at the
//! equator, at precision 6 roughly 1.2 km × 0.6 km.

use serde::{Deserialize, Serialize};

/// Geohash alphabet (no `a`, `i`, `l`, `o`).
pub const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest hash this crate will produce.
pub const MAX_PRECISION: u8 = 12;

/// A latitude/longitude rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl GeoBox {
    /// Center point as `(lat, lng)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) / 2.0,
            (self.lng_min + self.lng_max) / 2.0,
        )
    }

    /// Latitude extent in degrees.
    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Longitude extent in degrees.
    pub fn lng_span(&self) -> f64 {
        self.lng_max - self.lng_min
    }

    /// True for the zero-area box returned for invalid hashes.
    pub fn is_degenerate(&self) -> bool {
        self.lat_span() <= 0.0 || self.lng_span() <= 0.0
    }
}

/// Encodes a coordinate as a geohash of `precision` characters.
///
/// Returns an empty string for NaN/infinite or out-of-range coordinates and
/// for a precision of zero. Precision is capped at [`MAX_PRECISION`].
///
/// # Examples
///
/// ```
/// assert_eq!(festa::geohash::encode(35.6812, 139.7671, 5), "xn76u");
/// assert_eq!(festa::geohash::encode(f64::NAN, 0.0, 5), "");
/// ```
pub fn encode(lat: f64, lng: f64, precision: u8) -> String {
    if !is_valid_coordinate(lat, lng) || precision == 0 {
        return String::new();
    }
    let precision = precision.min(MAX_PRECISION) as usize;

    let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
    let (mut lng_lo, mut lng_hi) = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bits = 0u8;
    let mut idx = 0usize;

    while hash.len() < precision {
        if even {
            let mid = (lng_lo + lng_hi) / 2.0;
            if lng >= mid {
                idx = (idx << 1) | 1;
                lng_lo = mid;
            } else {
                idx <<= 1;
                lng_hi = mid;
            }
        } else {
            let mid = (lat_lo + lat_hi) / 2.0;
            if lat >= mid {
                idx = (idx << 1) | 1;
                lat_lo = mid;
            } else {
                idx <<= 1;
                lat_hi = mid;
            }
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            hash.push(BASE32[idx] as char);
            bits = 0;
            idx = 0;
        }
    }
    hash
}

/// Decodes a geohash into the cell it names.
///
/// Empty hashes or hashes containing characters outside [`BASE32`] yield a
/// zero-area box at the origin. Case is ignored.
///
/// # Examples
///
/// ```
/// let cell = festa::geohash::bounding_box("xn76u");
/// assert!(cell.lat_min <= 35.6812 && 35.6812 <= cell.lat_max);
/// assert!(festa::geohash::bounding_box("ai!").is_degenerate());
/// ```
pub fn bounding_box(hash: &str) -> GeoBox {
    if hash.is_empty() {
        return GeoBox::default();
    }

    let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
    let (mut lng_lo, mut lng_hi) = (-180.0_f64, 180.0_f64);
    let mut even = true;

    for c in hash.bytes() {
        let Some(value) = char_value(c) else {
            return GeoBox::default();
        };
        for shift in (0..5).rev() {
            let bit = (value >> shift) & 1;
            if even {
                let mid = (lng_lo + lng_hi) / 2.0;
                if bit == 1 {
                    lng_lo = mid;
                } else {
                    lng_hi = mid;
                }
            } else {
                let mid = (lat_lo + lat_hi) / 2.0;
                if bit == 1 {
                    lat_lo = mid;
                } else {
                    lat_hi = mid;
                }
            }
            even = !even;
        }
    }

    GeoBox {
        lat_min: lat_lo,
        lat_max: lat_hi,
        lng_min: lng_lo,
        lng_max: lng_hi,
    }
}

/// True when `hash` is non-empty and spelled only with [`BASE32`] characters.
pub fn is_valid_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.bytes().all(|c| char_value(c).is_some())
}

pub(crate) fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

fn char_value(c: u8) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    BASE32.iter().position(|&b| b == c).map(|p| p as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_hashes() {
        assert_eq!(encode(57.64911, 10.40744, 11), "u4pruydqqvj");
        assert_eq!(encode(35.6812, 139.7671, 5), "xn76u");
        assert_eq!(encode(0.0, 0.0, 1), "s");
    }

    #[test]
    fn test_invalid_inputs_return_sentinel() {
        assert_eq!(encode(f64::NAN, 10.0, 6), "");
        assert_eq!(encode(10.0, f64::INFINITY, 6), "");
        assert_eq!(encode(91.0, 0.0, 6), "");
        assert_eq!(encode(0.0, -180.5, 6), "");
        assert_eq!(encode(10.0, 10.0, 0), "");
    }

    #[test]
    fn test_extreme_corners_encode() {
        assert_eq!(encode(90.0, 180.0, 4), "zzzz");
        assert_eq!(encode(-90.0, -180.0, 4), "0000");
    }

    #[test]
    fn test_bounding_box_contains_point() {
        let (lat, lng) = (34.6937, 135.5023);
        for precision in 1..=8 {
            let cell = bounding_box(&encode(lat, lng, precision));
            assert!(cell.lat_min <= lat && lat <= cell.lat_max);
            assert!(cell.lng_min <= lng && lng <= cell.lng_max);
            assert!(!cell.is_degenerate());
        }
    }

    #[test]
    fn test_center_reencodes_to_same_hash() {
        let hash = encode(43.0618, 141.3545, 6);
        let (lat, lng) = bounding_box(&hash).center();
        assert_eq!(encode(lat, lng, 6), hash);
    }

    #[test]
    fn test_invalid_hash_degenerate() {
        assert!(bounding_box("").is_degenerate());
        assert!(bounding_box("xn7a").is_degenerate());
        assert!(!is_valid_hash("_unknown"));
        assert!(is_valid_hash("XN76U"));
    }

    #[test]
    fn test_cell_size_halves_by_axis() {
        let p5 = bounding_box("xn76u");
        let p6 = bounding_box("xn76ur");
        assert!((p5.lng_span() / p6.lng_span() - 4.0).abs() < 1e-9);
        assert!((p5.lat_span() / p6.lat_span() - 8.0).abs() < 1e-9);
    }
}
