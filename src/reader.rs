//! Reads one bucket out of the payload blob and maps its records to places.

use crate::config::CatalogConfig;
use crate::envelope::SpatialIndex;
use crate::error::{BucketError, MappingError};
use crate::frame::{check_codec, FrameCodec};
use crate::types::{DomainPlace, EncodedRecordItem, Location};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Places recovered from one bucket and how many records were dropped.
#[derive(Debug, Clone, Default)]
pub struct BucketRead {
    pub places: Vec<DomainPlace>,
    /// Malformed frame elements plus records that failed mapping.
    pub skipped: usize,
}

/// Borrowed view over a loaded index and its payload.
pub struct BucketReader<'a> {
    index: &'a SpatialIndex,
    payload: &'a [u8],
    codec: &'a FrameCodec,
    config: &'a CatalogConfig,
}

impl<'a> BucketReader<'a> {
    pub fn new(
        index: &'a SpatialIndex,
        payload: &'a [u8],
        codec: &'a FrameCodec,
        config: &'a CatalogConfig,
    ) -> Self {
        Self {
            index,
            payload,
            codec,
            config,
        }
    }

    /// Decodes bucket `key`, measuring each place's distance from `center`.
    ///
    /// A key absent from the index reads as an empty bucket.
    pub fn read_bucket(&self, key: &str, center: Location) -> Result<BucketRead, BucketError> {
        let Some(meta) = self.index.bucket(key) else {
            return Ok(BucketRead::default());
        };
        check_codec(self.index.codec())?;

        let size = self.payload.len() as u64;
        if meta.end() > size {
            return Err(BucketError::OutOfBounds {
                key: key.to_string(),
                offset: meta.payload_offset,
                length: meta.payload_length,
                size,
            });
        }

        let frame = &self.payload[meta.payload_offset as usize..meta.end() as usize];
        let expected = if self.config.verify_checksums {
            meta.payload_sha256.as_deref()
        } else {
            None
        };
        let decoded = self.codec.decode(key, frame, expected)?;

        let mut read = BucketRead {
            places: Vec::with_capacity(decoded.records.len()),
            skipped: decoded.skipped,
        };
        for item in &decoded.records {
            match map_record(item, center, self.config) {
                Ok(place) => read.places.push(place),
                Err(e) => {
                    read.skipped += 1;
                    tracing::debug!(bucket = key, record = %item.primary_key, error = %e, "dropped record");
                }
            }
        }
        Ok(read)
    }
}

/// Maps one encoded record to a place measured from `center`.
pub fn map_record(
    item: &EncodedRecordItem,
    center: Location,
    config: &CatalogConfig,
) -> Result<DomainPlace, MappingError> {
    let (lat, lng) = item
        .raw_coordinate()
        .ok_or(MappingError::MissingCoordinate)?;
    let location = Location::new(lat, lng);
    if !location.is_valid() {
        return Err(MappingError::InvalidCoordinate { lat, lng });
    }

    let name = match item.raw_text(&["name", "title"]) {
        Some(name) => name,
        None if !item.primary_key.trim().is_empty() => item.primary_key.clone(),
        None => return Err(MappingError::MissingName),
    };

    let (start_at, end_at) = event_window(item, config.timezone, config.default_event_hours);

    Ok(DomainPlace {
        id: item.primary_key.clone(),
        category: item.category,
        name,
        location,
        start_at,
        end_at,
        distance_meters: center.distance_meters_to(&location),
        scale_score: item.scale_score,
        heat_score: item.heat_score,
        surprise_score: item.surprise_score,
        venue: item.raw_text(&["venue", "location"]),
        address: item.raw_text(&["address"]),
        prefecture: item.raw_text(&["prefecture"]),
        city: item.raw_text(&["city"]),
        description: item.raw_text(&["description"]),
        source_url: item.raw_text(&["sourceUrl", "url"]),
        image_url: item.raw_text(&["imageUrl"]),
        geohash: item.geohash.clone().filter(|g| g != "_unknown"),
        coordinate_source: item.raw_text(&["coordSource", "geoSource"]),
    })
}

/// Start and end instants from the normalized local date/time fields.
///
/// - no start date → neither instant
/// - start date only → local midnight until the end of the end (or start) day
/// - start time without any end → `default_hours` long
/// - end time without end date → same day as start, next day if that precedes start
/// - end date without end time → end of that day
/// - an end still before the start is dropped
pub fn event_window(
    item: &EncodedRecordItem,
    tz: Tz,
    default_hours: i64,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let Some(start_date) = item.normalized_start_date.as_deref().and_then(parse_date) else {
        return (None, None);
    };
    let start_time = item.normalized_start_time.as_deref().and_then(parse_time);
    let Some(start) = local_instant(tz, start_date, start_time.unwrap_or_default()) else {
        return (None, None);
    };

    let end_date = item.normalized_end_date.as_deref().and_then(parse_date);
    let end_time = item.normalized_end_time.as_deref().and_then(parse_time);

    let end = match (end_date, end_time) {
        (Some(date), Some(time)) => local_instant(tz, date, time),
        (Some(date), None) => local_instant(tz, date, end_of_day()),
        (None, Some(time)) => match local_instant(tz, start_date, time) {
            Some(end) if end < start => start_date
                .succ_opt()
                .and_then(|next| local_instant(tz, next, time)),
            other => other,
        },
        (None, None) if start_time.is_some() => Some(start + Duration::hours(default_hours)),
        (None, None) => local_instant(tz, start_date, end_of_day()),
    };

    (Some(start), end.filter(|end| *end >= start))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

/// Earliest UTC instant for a local wall-clock time; `None` inside a DST gap.
fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
