//! The spatial index envelope: codec parameters and per-bucket byte ranges.
//!
//! The envelope is a small JSON document loaded once per session. It never
//! holds record data itself; each [`BucketMeta`] points at a frame inside the
//! companion payload blob.
//!
//! ```json
//! {
//!   "version": 2,
//!   "codec": {"compression": "zlib", "obfuscation": "xor-sha256-mix", "encoding": "json"},
//!   "spatialIndex": {"scheme": "geohash", "precision": 5, "bucketCount": 2},
//!   "payloadFile": "events.bin",
//!   "payloadSHA256": "…",
//!   "payloadSizeBytes": 5120,
//!   "payloadBuckets": {
//!     "xn76u": {"recordCount": 12, "payloadOffset": 0, "payloadLength": 3000, "payloadSHA256": "…"},
//!     "xn77h": {"recordCount": 9, "payloadOffset": 3000, "payloadLength": 2120, "payloadSHA256": "…"}
//!   }
//! }
//! ```

use crate::error::{IndexError, Result};
use crate::frame::{COMPRESSION_ZLIB, ENCODING_JSON, OBFUSCATION_XOR_MIX};
use crate::geohash;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Envelope protocol versions this build can read.
pub const SUPPORTED_VERSIONS: &[u32] = &[1, 2];

/// Version written by [`IndexBuilder`](crate::IndexBuilder).
pub const CURRENT_VERSION: u32 = 2;

/// Geohash precision bounds for bucket keys.
pub const MIN_PRECISION: u8 = 1;
pub const MAX_PRECISION: u8 = 8;

/// Root metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialIndexEnvelope {
    pub version: u32,
    pub codec: CodecDescriptor,
    pub spatial_index: SpatialIndexInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_file: Option<String>,
    #[serde(rename = "payloadSHA256", default, skip_serializing_if = "Option::is_none")]
    pub payload_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size_bytes: Option<u64>,
    pub payload_buckets: FxHashMap<String, BucketMeta>,
}

/// Identifiers for the three frame stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    pub compression: String,
    pub obfuscation: String,
    pub encoding: String,
}

impl Default for CodecDescriptor {
    fn default() -> Self {
        Self {
            compression: COMPRESSION_ZLIB.to_string(),
            obfuscation: OBFUSCATION_XOR_MIX.to_string(),
            encoding: ENCODING_JSON.to_string(),
        }
    }
}

/// Bucketing scheme. Precision is fixed for the whole index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialIndexInfo {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub precision: u8,
    #[serde(default)]
    pub bucket_count: usize,
}

fn default_scheme() -> String {
    "geohash".to_string()
}

/// One bucket's slice of the payload blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketMeta {
    /// Informational; decoding does not rely on it.
    #[serde(default)]
    pub record_count: u64,
    pub payload_offset: u64,
    pub payload_length: u64,
    /// SHA-256 of the bucket's JSON before compression.
    #[serde(rename = "payloadSHA256", default, skip_serializing_if = "Option::is_none")]
    pub payload_sha256: Option<String>,
}

impl BucketMeta {
    /// Exclusive end offset, saturating on overflow.
    pub fn end(&self) -> u64 {
        self.payload_offset.saturating_add(self.payload_length)
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// A validated, read-only envelope.
///
/// Built once through [`SpatialIndex::from_json`] or [`SpatialIndex::load`];
/// there is no way to mutate it afterwards, so it can be shared across
/// threads by reference.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    envelope: SpatialIndexEnvelope,
}

impl SpatialIndex {
    /// Parses and structurally validates an envelope document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        if !SUPPORTED_VERSIONS.contains(&probe.version) {
            return Err(IndexError::UnsupportedVersion(probe.version));
        }
        let envelope: SpatialIndexEnvelope = serde_json::from_slice(bytes)?;
        Self::from_envelope(envelope)
    }

    /// Validates an already-parsed envelope.
    pub fn from_envelope(envelope: SpatialIndexEnvelope) -> Result<Self> {
        if !SUPPORTED_VERSIONS.contains(&envelope.version) {
            return Err(IndexError::UnsupportedVersion(envelope.version));
        }

        let precision = envelope.spatial_index.precision;
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(IndexError::InvalidPrecision(precision));
        }

        for key in envelope.payload_buckets.keys() {
            if key.len() != precision as usize || !geohash::is_valid_hash(key) {
                return Err(IndexError::BucketKeyLength {
                    key: key.clone(),
                    precision,
                });
            }
        }

        check_overlaps(&envelope.payload_buckets)?;
        Ok(Self { envelope })
    }

    /// Parses the envelope and checks it against its payload blob.
    pub fn load(envelope_json: &[u8], payload: &[u8], verify_checksums: bool) -> Result<Self> {
        let index = Self::from_json(envelope_json)?;
        index.verify_payload(payload, verify_checksums)?;
        Ok(index)
    }

    /// Checks declared size and, when enabled, the whole-blob SHA-256.
    pub fn verify_payload(&self, payload: &[u8], verify_checksums: bool) -> Result<()> {
        let actual_size = payload.len() as u64;
        if let Some(declared) = self.envelope.payload_size_bytes {
            if declared != actual_size {
                return Err(IndexError::PayloadSize {
                    declared,
                    actual: actual_size,
                });
            }
        }

        if verify_checksums {
            if let Some(expected) = &self.envelope.payload_sha256 {
                let actual = hex::encode(Sha256::digest(payload));
                if !actual.eq_ignore_ascii_case(expected.trim()) {
                    return Err(IndexError::PayloadChecksum {
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
        }
        Ok(())
    }

    /// Every bucket key in the index.
    pub fn bucket_keys(&self) -> FxHashSet<&str> {
        self.envelope
            .payload_buckets
            .keys()
            .map(String::as_str)
            .collect()
    }

    /// Looks up a single bucket.
    pub fn bucket(&self, key: &str) -> Option<&BucketMeta> {
        self.envelope.payload_buckets.get(key)
    }

    /// Geohash length of every bucket key.
    pub fn precision(&self) -> u8 {
        self.envelope.spatial_index.precision
    }

    pub fn codec(&self) -> &CodecDescriptor {
        &self.envelope.codec
    }

    pub fn bucket_count(&self) -> usize {
        self.envelope.payload_buckets.len()
    }

    pub fn envelope(&self) -> &SpatialIndexEnvelope {
        &self.envelope
    }
}

/// Non-empty byte ranges must not share a byte.
fn check_overlaps(buckets: &FxHashMap<String, BucketMeta>) -> Result<()> {
    let mut ranges: Vec<(&String, &BucketMeta)> = buckets
        .iter()
        .filter(|(_, meta)| meta.payload_length > 0)
        .collect();
    ranges.sort_by(|a, b| {
        a.1.payload_offset
            .cmp(&b.1.payload_offset)
            .then_with(|| a.0.cmp(b.0))
    });

    for pair in ranges.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if first.1.end() > second.1.payload_offset {
            return Err(IndexError::OverlappingBuckets {
                first: first.0.clone(),
                second: second.0.clone(),
            });
        }
    }
    Ok(())
}
