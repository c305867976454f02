//! Offline nearby-event index with compact geohash buckets and recommendation scoring.
//!
//! `festa` answers "what is on near me?" over a catalogue of geotagged events
//! (fireworks displays, festivals, seasonal viewing spots) that ships entirely
//! inside a client. The catalogue is never decoded as a whole: a small JSON
//! envelope is loaded once, and each query only inflates the buckets whose
//! geohash cells can intersect the query circle.
//!
//! # Features
//!
//! - **Bounded reads** - A query touches at most `(2·32+1)²` buckets, usually 9 to 25
//! - **Tolerant decoding** - A broken bucket or record costs only itself, never the query
//! - **Integrity checks** - Whole-payload and per-bucket SHA-256 verified when present
//! - **Recommendations** - Distance, timing, popularity and category folded into one score
//! - **Thread-Safe** - The loaded catalog is immutable; share it by reference
//! - **Offline** - Everything is local after the build
//!
//! # Quick Start
//!
//! ```no_run
//! use festa::{CatalogConfig, CatalogSources, Location};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sources = CatalogSources::from_paths("data/events.json", None)?;
//! festa::init(sources, CatalogConfig::from_env());
//!
//! let shibuya = Location::new(35.6580, 139.7016);
//! for place in festa::search(shibuya, 3_000.0, 10) {
//!     println!("{} ({:.0} m)", place.name, place.distance_meters);
//! }
//!
//! if let Some(best) = festa::top_pick(shibuya, chrono::Utc::now()) {
//!     println!("Go to: {}", best.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ## Data Layout
//!
//! - **Envelope** ([`SpatialIndexEnvelope`]) - codec identifiers, geohash
//!   precision, and for every bucket its record count, byte range and checksum
//! - **Payload** - one undelimited blob of frames, only addressable through the envelope
//! - **Frame** ([`frame`]) - a bucket's records as JSON, zlib-compressed, then
//!   XOR-obfuscated with a SHA-256 keystream and a positional mix
//!
//! ## Query Algorithm
//!
//! 1. Geohash the center at the index precision and measure that cell in meters
//! 2. Walk enough neighbouring cells to cover the radius (capped at 32 per side)
//! 3. Decode every candidate bucket present in the envelope
//! 4. Compute the great-circle distance of every record
//! 5. Keep records within `radius × 1.2`, nearest first, then truncate
//! 6. When nothing is that close, return the nearest decoded records instead
//!
//! ## Recommendation
//!
//! [`scoring`] combines `exp(-km/5)` proximity, a status-driven time factor
//! ([`status`]), normalized heat and a per-category weight, with a discount
//! for coarse coordinates. Equal scores fall back to a fixed tie-break chain
//! so rankings are reproducible.
//!
//! # Failure Model
//!
//! Nothing here panics or surfaces an error from a query:
//!
//! - Unusable envelope → every query returns an empty list ([`Catalog::unusable_reason`])
//! - Undecodable or out-of-range bucket → that bucket contributes nothing
//! - Unmappable record → that record is dropped and counted
//!
//! # Obfuscation Is Not Security
//!
//! The key seed ships with the client. The XOR stage only keeps the payload
//! from being casually readable; anyone with the seed can decode it.
//!
//! # Thread Safety
//!
//! [`Catalog`] holds no interior mutability. The global instance lives in a
//! `OnceLock` and concurrent searches need no locking. Searches cannot be
//! cancelled; hosts discard superseded results with [`generation::QueryGenerations`].
//!
//! # Modules
//!
//! - [`geohash`] - Base32 geohash encode/decode
//! - [`frame`] - Frame codec
//! - [`envelope`] - Envelope document and validated [`SpatialIndex`]
//! - [`expansion`] - Query circle to candidate bucket keys
//! - [`reader`] - Bucket decoding and record mapping
//! - [`scoring`] / [`status`] - Recommendation score and event lifecycle
//! - [`builder`] - Offline envelope + payload construction

pub mod builder;
mod catalog;
pub mod config;
pub mod envelope;
pub mod error;
pub mod expansion;
pub mod frame;
pub mod generation;
pub mod geohash;
pub mod reader;
pub mod scoring;
pub mod status;
pub mod types;

pub use builder::{BuildStats, BuiltIndex, IndexBuilder};
pub use catalog::{
    Catalog, SearchOutcome, DEFAULT_RECOMMEND_POOL, DEFAULT_RECOMMEND_RADIUS_M,
};
pub use config::{CatalogConfig, CatalogSources};
pub use envelope::{BucketMeta, CodecDescriptor, SpatialIndex, SpatialIndexEnvelope};
pub use error::{BucketError, IndexError, MappingError};
pub use status::{resolve_status, EventStatus, StatusStage};
pub use types::{Category, DomainPlace, EncodedRecordItem, Location};

use chrono::{DateTime, Utc};

/// Loads the process-wide catalog. Only the first call has any effect.
///
/// Returns `false` when the catalog could not be used; queries will then
/// return empty results.
pub fn init(sources: CatalogSources, config: CatalogConfig) -> bool {
    Catalog::init_global(sources, config).is_usable()
}

/// Places within `radius_meters` of `center`, nearest first.
///
/// Empty before [`init`] or when the catalog is unusable.
///
/// # Examples
///
/// ```no_run
/// # fn main() {
/// let osaka = festa::Location::new(34.7025, 135.4959);
/// for place in festa::search(osaka, 5_000.0, 20) {
///     println!("{} - {:.1} km", place.name, place.distance_km());
/// }
/// # }
/// ```
pub fn search(center: Location, radius_meters: f64, limit: usize) -> Vec<DomainPlace> {
    Catalog::global()
        .map(|catalog| catalog.search(center, radius_meters, limit))
        .unwrap_or_default()
}

/// Single best recommendation around `center` at `now`.
pub fn top_pick(center: Location, now: DateTime<Utc>) -> Option<DomainPlace> {
    Catalog::global().and_then(|catalog| catalog.top_pick(center, now))
}

/// Nearby places ordered by recommendation score.
pub fn ranked_nearby(center: Location, now: DateTime<Utc>, limit: usize) -> Vec<DomainPlace> {
    Catalog::global()
        .map(|catalog| catalog.ranked_nearby(center, now, limit))
        .unwrap_or_default()
}
