//! Offline construction of an envelope and its payload blob.
//!
//! The production catalogue is built upstream, but the encode side lives here
//! too so that tooling and tests produce byte-for-byte the same format the
//! reader expects:
//!
//! 1. File each record under the geohash of its coordinate (or its own
//!    `geohash` field when the coordinate is missing)
//! 2. Drop duplicate primary keys, keeping the first seen
//! 3. Sort each bucket by primary key
//! 4. Encode buckets in key order and append them to one blob
//! 5. Record offsets, lengths and checksums in the envelope

use crate::envelope::{
    BucketMeta, CodecDescriptor, SpatialIndexEnvelope, SpatialIndexInfo, CURRENT_VERSION,
    MAX_PRECISION, MIN_PRECISION,
};
use crate::frame::FrameCodec;
use crate::geohash;
use crate::types::EncodedRecordItem;
use rustc_hash::{FxHashMap, FxHashSet};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Counters reported by [`IndexBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub records_processed: usize,
    pub records_indexed: usize,
    /// Neither a valid coordinate nor a usable geohash.
    pub records_unlocated: usize,
    pub duplicates: usize,
    pub buckets: usize,
}

/// Envelope plus payload, ready to ship.
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    pub envelope: SpatialIndexEnvelope,
    pub payload: Vec<u8>,
    pub stats: BuildStats,
}

impl BuiltIndex {
    /// Serialized envelope document.
    pub fn envelope_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.envelope)
    }

    /// Writes the envelope to `envelope_path` and the payload next to it
    /// under the envelope's `payloadFile` name. Returns the payload path.
    pub fn write(&self, envelope_path: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let envelope_path = envelope_path.as_ref();
        let payload_name = self
            .envelope
            .payload_file
            .clone()
            .unwrap_or_else(|| "payload.bin".to_string());
        let payload_path = envelope_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(payload_name);

        std::fs::write(envelope_path, self.envelope_json()?)?;
        std::fs::write(&payload_path, &self.payload)?;
        Ok(payload_path)
    }
}

/// Accumulates records and encodes them into geohash buckets.
pub struct IndexBuilder {
    precision: u8,
    codec: FrameCodec,
    payload_file: String,
    records: Vec<EncodedRecordItem>,
}

impl IndexBuilder {
    /// Precision is clamped to the envelope's supported range.
    pub fn new(precision: u8, key_seed: &str) -> Self {
        Self {
            precision: precision.clamp(MIN_PRECISION, MAX_PRECISION),
            codec: FrameCodec::new(key_seed),
            payload_file: "events.bin".to_string(),
            records: Vec::new(),
        }
    }

    /// Name recorded as `payloadFile`.
    pub fn with_payload_file(mut self, name: impl Into<String>) -> Self {
        self.payload_file = name.into();
        self
    }

    pub fn push(&mut self, record: EncodedRecordItem) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = EncodedRecordItem>) {
        self.records.extend(records);
    }

    pub fn build(self) -> std::io::Result<BuiltIndex> {
        let mut stats = BuildStats {
            records_processed: self.records.len(),
            ..BuildStats::default()
        };

        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut grid: BTreeMap<String, Vec<EncodedRecordItem>> = BTreeMap::new();

        for mut record in self.records {
            let Some(key) = bucket_key(&record, self.precision) else {
                stats.records_unlocated += 1;
                tracing::debug!(record = %record.primary_key, "record has no location, not indexed");
                continue;
            };
            if !seen.insert(record.primary_key.clone()) {
                stats.duplicates += 1;
                continue;
            }
            if record.geohash.is_none() {
                record.geohash = Some(key.clone());
            }
            grid.entry(key).or_default().push(record);
        }

        let mut payload = Vec::new();
        let mut buckets = FxHashMap::default();
        for (key, mut records) in grid {
            records.sort_by(|a, b| a.primary_key.cmp(&b.primary_key));
            let (frame, checksum) = self.codec.encode(&records)?;

            buckets.insert(
                key,
                BucketMeta {
                    record_count: records.len() as u64,
                    payload_offset: payload.len() as u64,
                    payload_length: frame.len() as u64,
                    payload_sha256: Some(checksum),
                },
            );
            stats.records_indexed += records.len();
            payload.extend_from_slice(&frame);
        }
        stats.buckets = buckets.len();

        let envelope = SpatialIndexEnvelope {
            version: CURRENT_VERSION,
            codec: CodecDescriptor::default(),
            spatial_index: SpatialIndexInfo {
                scheme: "geohash".to_string(),
                precision: self.precision,
                bucket_count: buckets.len(),
            },
            payload_file: Some(self.payload_file),
            payload_sha256: Some(hex::encode(Sha256::digest(&payload))),
            payload_size_bytes: Some(payload.len() as u64),
            payload_buckets: buckets,
        };

        tracing::info!(
            records = stats.records_indexed,
            buckets = stats.buckets,
            bytes = payload.len(),
            skipped = stats.records_unlocated + stats.duplicates,
            "built spatial index"
        );
        Ok(BuiltIndex {
            envelope,
            payload,
            stats,
        })
    }
}

/// Coordinate first; a record without one may still carry a build geohash.
fn bucket_key(record: &EncodedRecordItem, precision: u8) -> Option<String> {
    let from_coordinate = record
        .raw_coordinate()
        .map(|(lat, lng)| geohash::encode(lat, lng, precision))
        .filter(|hash| !hash.is_empty());

    from_coordinate.or_else(|| {
        record
            .geohash
            .as_deref()
            .filter(|hash| hash.len() >= precision as usize && geohash::is_valid_hash(hash))
            .map(|hash| hash[..precision as usize].to_ascii_lowercase())
    })
}
