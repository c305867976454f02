//! Core data structures for encoded records and mapped places.
//!
//! - [`EncodedRecordItem`] - One record as stored inside a bucket frame
//! - [`DomainPlace`] - The mapped, query-time view handed to hosts
//! - [`Location`] - Coordinate pair with great-circle distance
//! - [`Category`] - Fixed event vocabulary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coordinate provenance tags whose positions are only approximate.
pub const LOW_CONFIDENCE_SOURCES: &[&str] = &[
    "prefecture_centroid",
    "city_centroid",
    "geocode_fallback",
    "approximate",
];

/// Event category. Unrecognized tags decode as [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Fireworks display
    Hanabi,
    /// Festival
    Matsuri,
    /// Seasonal nature viewing (blossoms, foliage)
    Nature,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    /// Maps a free-form tag to a category, case-insensitively.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "hanabi" | "fireworks" => Self::Hanabi,
            "matsuri" | "festival" => Self::Matsuri,
            "nature" => Self::Nature,
            _ => Self::Other,
        }
    }

    /// Tag written into frames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hanabi => "hanabi",
            Self::Matsuri => "matsuri",
            Self::Nature => "nature",
            Self::Other => "other",
        }
    }
}

/// A coordinate pair with distance calculation capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180)
    pub longitude: f64,
}

impl Location {
    /// Earth radius used for all distance math, in kilometers.
    pub const EARTH_RADIUS_KM: f64 = 6371.0;

    /// Constructs a new Location from coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use festa::Location;
    ///
    /// let loc = Location::new(35.6812, 139.7671);
    /// assert_eq!(loc.latitude, 35.6812);
    /// ```
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and in range.
    pub fn is_valid(&self) -> bool {
        crate::geohash::is_valid_coordinate(self.latitude, self.longitude)
    }

    /// Great-circle distance to another location in kilometers (haversine).
    ///
    /// # Examples
    ///
    /// ```
    /// use festa::Location;
    ///
    /// let tokyo = Location::new(35.6812, 139.7671);
    /// let osaka = Location::new(34.7025, 135.4959);
    /// let distance = tokyo.distance_to(&osaka);
    /// assert!(distance > 395.0 && distance < 410.0);
    /// ```
    pub fn distance_to(&self, other: &Location) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        Self::EARTH_RADIUS_KM * c
    }

    /// Great-circle distance in meters.
    pub fn distance_meters_to(&self, other: &Location) -> f64 {
        self.distance_to(other) * 1000.0
    }
}

/// One record as stored inside a bucket frame.
///
/// Every field tolerates a missing or wrongly typed JSON value by falling back
/// to its default, so one sloppy upstream field never costs the whole record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedRecordItem {
    #[serde(default, deserialize_with = "lenient::category")]
    pub category: Category,
    #[serde(default, deserialize_with = "lenient::string")]
    pub primary_key: String,
    /// Build-time placeholder; query time recomputes the real distance.
    #[serde(default, deserialize_with = "lenient::float")]
    pub distance_meters_hint: f64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub scale_score: i32,
    #[serde(default, deserialize_with = "lenient::int")]
    pub heat_score: i32,
    #[serde(default, deserialize_with = "lenient::int")]
    pub surprise_score: i32,
    /// `YYYY-MM-DD`
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub normalized_start_date: Option<String>,
    /// `HH:MM`
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub normalized_start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub normalized_end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub normalized_end_time: Option<String>,
    /// Bucket key at build time, `"_unknown"` when coordinates were invalid.
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub geohash: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub raw_fields: Map<String, Value>,
}

impl EncodedRecordItem {
    /// First present raw field among `keys`, as text. Numbers are stringified.
    pub fn raw_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.raw_fields.get(*k))
            .find_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    /// First present raw field among `keys`, as a number. Numeric strings parse.
    pub fn raw_number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .filter_map(|k| self.raw_fields.get(*k))
            .find_map(lenient::value_as_f64)
    }

    /// Coordinate from `lat`/`latitude` and `lng`/`lon`/`longitude`.
    pub fn raw_coordinate(&self) -> Option<(f64, f64)> {
        let lat = self.raw_number(&["lat", "latitude"])?;
        let lng = self.raw_number(&["lng", "lon", "longitude"])?;
        Some((lat, lng))
    }
}

/// A mapped event, rebuilt fresh for every query and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainPlace {
    /// Stable primary key from the build
    pub id: String,
    pub category: Category,
    pub name: String,
    pub location: Location,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// Great-circle distance from the query center, in meters
    pub distance_meters: f64,
    pub scale_score: i32,
    pub heat_score: i32,
    pub surprise_score: i32,
    pub venue: Option<String>,
    pub address: Option<String>,
    pub prefecture: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub image_url: Option<String>,
    pub geohash: Option<String>,
    /// Provenance tag of the coordinate, see [`LOW_CONFIDENCE_SOURCES`]
    pub coordinate_source: Option<String>,
}

impl DomainPlace {
    /// True when the coordinate came from a coarse fallback.
    pub fn has_low_confidence_coordinate(&self) -> bool {
        self.coordinate_source
            .as_deref()
            .is_some_and(|tag| {
                LOW_CONFIDENCE_SOURCES
                    .iter()
                    .any(|low| low.eq_ignore_ascii_case(tag.trim()))
            })
    }

    /// Distance from the query center in kilometers.
    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }
}

mod lenient {
    use super::Category;
    use serde::{Deserialize, Deserializer};
    use serde_json::{Map, Value};

    pub fn value_as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|f| f.is_finite())
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(value_as_f64(&Value::deserialize(d)?).unwrap_or(0.0))
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
        Ok(value_as_f64(&Value::deserialize(d)?)
            .map(|f| f.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32)
            .unwrap_or(0))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
    }

    pub fn category<'de, D: Deserializer<'de>>(d: D) -> Result<Category, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Category::from_tag(&s),
            _ => Category::Other,
        })
    }

    pub fn object<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Object(map) => map,
            _ => Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_category_maps_to_other() {
        let item: EncodedRecordItem =
            serde_json::from_value(json!({"category": "concert", "primaryKey": "c1"})).unwrap();
        assert_eq!(item.category, Category::Other);

        let item: EncodedRecordItem =
            serde_json::from_value(json!({"category": 7, "primaryKey": "c2"})).unwrap();
        assert_eq!(item.category, Category::Other);
    }

    #[test]
    fn test_wrong_types_fall_back_to_defaults() {
        let item: EncodedRecordItem = serde_json::from_value(json!({
            "category": "hanabi",
            "primaryKey": 1234,
            "scaleScore": "88",
            "heatScore": {"nested": true},
            "surpriseScore": 41.6,
            "normalizedStartDate": 20250801,
            "rawFields": ["not", "an", "object"]
        }))
        .unwrap();

        assert_eq!(item.primary_key, "1234");
        assert_eq!(item.scale_score, 88);
        assert_eq!(item.heat_score, 0);
        assert_eq!(item.surprise_score, 42);
        assert_eq!(item.normalized_start_date, None);
        assert!(item.raw_fields.is_empty());
    }

    #[test]
    fn test_raw_coordinate_accepts_strings_and_aliases() {
        let item: EncodedRecordItem = serde_json::from_value(json!({
            "rawFields": {"latitude": "35.5", "lon": 139.25}
        }))
        .unwrap();
        assert_eq!(item.raw_coordinate(), Some((35.5, 139.25)));
    }

    #[test]
    fn test_distance_meters() {
        let a = Location::new(35.0, 139.0);
        let b = Location::new(35.01, 139.0);
        let d = a.distance_meters_to(&b);
        assert!(d > 1100.0 && d < 1120.0);
    }

    #[test]
    fn test_low_confidence_sources() {
        let mut place = DomainPlace {
            id: "x".into(),
            category: Category::Hanabi,
            name: "x".into(),
            location: Location::new(0.0, 0.0),
            start_at: None,
            end_at: None,
            distance_meters: 0.0,
            scale_score: 0,
            heat_score: 0,
            surprise_score: 0,
            venue: None,
            address: None,
            prefecture: None,
            city: None,
            description: None,
            source_url: None,
            image_url: None,
            geohash: None,
            coordinate_source: Some("city_centroid".into()),
        };
        assert!(place.has_low_confidence_coordinate());
        place.coordinate_source = Some("venue_exact".into());
        assert!(!place.has_low_confidence_coordinate());
    }
}
