//! Error types for index loading, bucket decoding and record mapping.
//!
//! None of these errors reach the host through the query API. Bucket and
//! record failures are absorbed by [`Catalog`](crate::Catalog) and degrade
//! into partial results; an [`IndexError`] turns the whole catalog into a
//! no-op that answers every query with an empty list.

use thiserror::Error;

/// The envelope (or its payload blob) cannot be used for queries.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Envelope declares a protocol version this build does not understand.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u32),

    /// Envelope JSON is not parseable or misses a required field.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Geohash precision outside 1..=8.
    #[error("invalid geohash precision {0}")]
    InvalidPrecision(u8),

    /// A bucket key that is not a geohash of the index precision.
    #[error("bucket key {key:?} is not a geohash of length {precision}")]
    BucketKeyLength { key: String, precision: u8 },

    /// Two buckets claim overlapping byte ranges of the payload.
    #[error("buckets {first:?} and {second:?} overlap in the payload")]
    OverlappingBuckets { first: String, second: String },

    /// Declared payload size disagrees with the blob handed to the loader.
    #[error("payload size mismatch: envelope declares {declared} bytes, blob has {actual}")]
    PayloadSize { declared: u64, actual: u64 },

    /// Whole-blob SHA-256 disagrees with the envelope.
    #[error("payload checksum mismatch: expected {expected}, got {actual}")]
    PayloadChecksum { expected: String, actual: String },

    /// Envelope or payload could not be read from disk.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One bucket could not be decoded; it contributes zero records.
#[derive(Error, Debug)]
pub enum BucketError {
    /// `offset + length` reaches past the end of the payload blob.
    #[error("bucket {key:?} range {offset}+{length} exceeds payload size {size}")]
    OutOfBounds {
        key: String,
        offset: u64,
        length: u64,
        size: u64,
    },

    /// The envelope names a codec stage identifier this build cannot invert.
    #[error("unsupported {stage} codec {value:?}")]
    UnsupportedCodec { stage: &'static str, value: String },

    /// Neither zlib nor raw deflate could inflate the frame.
    #[error("inflate failed: {0}")]
    Inflate(#[source] std::io::Error),

    /// Inflated bytes do not hash to the bucket's recorded SHA-256.
    #[error("bucket {key:?} checksum mismatch")]
    Checksum { key: String },

    /// The frame is not a JSON array, even under tolerant parsing.
    #[error("frame JSON unusable: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single record that cannot become a [`DomainPlace`](crate::DomainPlace).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("record has no coordinate")]
    MissingCoordinate,

    #[error("record coordinate ({lat}, {lng}) is out of range")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("record has neither a name nor a primary key")]
    MissingName,
}

/// Result type for index-level operations.
pub type Result<T, E = IndexError> = std::result::Result<T, E>;
