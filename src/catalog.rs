use crate::config::{CatalogConfig, CatalogSources};
use crate::envelope::SpatialIndex;
use crate::error::IndexError;
use crate::expansion::candidate_keys;
use crate::frame::FrameCodec;
use crate::reader::BucketReader;
use crate::scoring::{rank, ScoreBreakdown};
use crate::types::{DomainPlace, Location};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::OnceLock;

static CATALOG: OnceLock<Catalog> = OnceLock::new();

/// Search radius behind [`Catalog::ranked_nearby`] and [`Catalog::top_pick`].
pub const DEFAULT_RECOMMEND_RADIUS_M: f64 = 30_000.0;

/// Candidates pulled from the nearby search before scoring.
pub const DEFAULT_RECOMMEND_POOL: usize = 200;

/// Everything a search produced, including what it had to throw away.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub places: Vec<DomainPlace>,
    pub buckets_read: usize,
    pub buckets_failed: usize,
    pub records_skipped: usize,
    /// No place was inside the slack radius; `places` is the nearest overall.
    pub fell_back: bool,
}

struct Loaded {
    index: SpatialIndex,
    payload: Vec<u8>,
}

/// A loaded catalogue answering nearby and recommendation queries.
///
/// Opening never fails: an envelope that cannot be used leaves the catalog
/// answering every query with an empty list, and the reason stays available
/// through [`Catalog::unusable_reason`].
pub struct Catalog {
    state: Result<Loaded, IndexError>,
    codec: FrameCodec,
    config: CatalogConfig,
}

impl Catalog {
    /// Initializes the process-wide catalog once; later calls return the
    /// existing one and ignore their arguments.
    pub fn init_global(sources: CatalogSources, config: CatalogConfig) -> &'static Self {
        CATALOG.get_or_init(|| Self::open(sources, config))
    }

    /// The process-wide catalog, if [`Catalog::init_global`] has run.
    pub fn global() -> Option<&'static Self> {
        CATALOG.get()
    }

    pub fn open(sources: CatalogSources, config: CatalogConfig) -> Self {
        let state = SpatialIndex::load(&sources.envelope, &sources.payload, config.verify_checksums)
            .map(|index| Loaded {
                index,
                payload: sources.payload,
            });

        match &state {
            Ok(loaded) => tracing::info!(
                buckets = loaded.index.bucket_count(),
                precision = loaded.index.precision(),
                payload_bytes = loaded.payload.len(),
                "spatial index loaded"
            ),
            Err(e) => tracing::warn!(error = %e, "spatial index unusable, queries will return nothing"),
        }

        Self {
            state,
            codec: FrameCodec::new(&config.key_seed),
            config,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.state.is_ok()
    }

    pub fn unusable_reason(&self) -> Option<&IndexError> {
        self.state.as_ref().err()
    }

    pub fn index(&self) -> Option<&SpatialIndex> {
        self.state.as_ref().ok().map(|loaded| &loaded.index)
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Places near `center`, nearest first, at most `limit` of them.
    pub fn search(&self, center: Location, radius_meters: f64, limit: usize) -> Vec<DomainPlace> {
        self.search_detailed(center, radius_meters, limit).places
    }

    /// [`Catalog::search`] with decode statistics.
    ///
    /// Every candidate bucket is decoded in full before filtering, so the
    /// output does not depend on `limit` beyond truncation.
    pub fn search_detailed(
        &self,
        center: Location,
        radius_meters: f64,
        limit: usize,
    ) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let Ok(loaded) = &self.state else {
            return outcome;
        };
        if limit == 0 {
            return outcome;
        }

        let radius = if radius_meters.is_finite() {
            radius_meters.max(0.0)
        } else {
            0.0
        };
        let reader = BucketReader::new(&loaded.index, &loaded.payload, &self.codec, &self.config);

        let mut places = Vec::new();
        for key in candidate_keys(center, radius, loaded.index.precision()) {
            if loaded.index.bucket(&key).is_none() {
                continue;
            }
            match reader.read_bucket(&key, center) {
                Ok(read) => {
                    outcome.buckets_read += 1;
                    outcome.records_skipped += read.skipped;
                    places.extend(read.places);
                }
                Err(e) => {
                    outcome.buckets_failed += 1;
                    tracing::warn!(bucket = %key, error = %e, "skipping bucket");
                }
            }
        }

        places.sort_by(nearby_order);
        let max_distance = radius * self.config.radius_slack;
        let (within, beyond): (Vec<_>, Vec<_>) = places
            .into_iter()
            .partition(|p| p.distance_meters <= max_distance);

        outcome.places = if within.is_empty() && !beyond.is_empty() {
            outcome.fell_back = true;
            tracing::debug!(
                radius_m = radius,
                nearest_m = beyond[0].distance_meters,
                "nothing within radius, falling back to nearest decoded places"
            );
            beyond
        } else {
            within
        };
        outcome.places.truncate(limit);
        outcome
    }

    /// Best recommendation around `center` at `now`.
    pub fn top_pick(&self, center: Location, now: DateTime<Utc>) -> Option<DomainPlace> {
        self.ranked_nearby(center, now, 1).into_iter().next()
    }

    /// Nearby places ordered by recommendation score.
    pub fn ranked_nearby(
        &self,
        center: Location,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Vec<DomainPlace> {
        self.recommend(
            center,
            now,
            limit,
            DEFAULT_RECOMMEND_RADIUS_M,
            DEFAULT_RECOMMEND_POOL,
        )
        .into_iter()
        .map(|(place, _)| place)
        .collect()
    }

    /// Scores up to `pool` places within `radius_meters` and returns the best
    /// `limit` with their score breakdowns.
    pub fn recommend(
        &self,
        center: Location,
        now: DateTime<Utc>,
        limit: usize,
        radius_meters: f64,
        pool: usize,
    ) -> Vec<(DomainPlace, ScoreBreakdown)> {
        let candidates = self.search(center, radius_meters, pool.max(limit));
        let mut ranked = rank(candidates, now);
        ranked.truncate(limit);
        ranked
    }
}

/// Distance ascending, then scale descending, then name and id ascending.
fn nearby_order(a: &DomainPlace, b: &DomainPlace) -> Ordering {
    a.distance_meters
        .total_cmp(&b.distance_meters)
        .then_with(|| b.scale_score.cmp(&a.scale_score))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}
