//! Multi-factor recommendation score and the total order built on it.
//!
//! ```text
//! final = (0.45·space + 0.45·time + 0.10·heat) · category_weight · geo_penalty
//! ```
//!
//! `space` decays exponentially with distance, `time` comes from the event
//! status and how far away the start is, `heat` is the normalized popularity
//! score. Ties on `final` fall through a fixed chain of secondary keys so that
//! rankings are fully deterministic.

use crate::status::{resolve_status, EventStatus, StatusStage};
use crate::types::{Category, DomainPlace};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

const SPACE_WEIGHT: f64 = 0.45;
const TIME_WEIGHT: f64 = 0.45;
const HEAT_WEIGHT: f64 = 0.10;

/// Distance (km) over which `space` falls by a factor of e.
const SPACE_DECAY_KM: f64 = 5.0;

/// Multiplier for coordinates derived from a coarse fallback.
pub const LOW_CONFIDENCE_PENALTY: f64 = 0.85;

/// Scores closer than this are ordered by the tie-break chain.
pub const SCORE_EPSILON: f64 = 1e-9;

/// Every factor behind one place's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub space: f64,
    pub time: f64,
    pub heat: f64,
    pub category_weight: f64,
    pub geo_penalty: f64,
    pub total: f64,
    pub stage: StatusStage,
    /// Hours relevant to the stage: until start, since start, or since end.
    pub stage_delta_hours: f64,
}

/// Fixed per-category multiplier.
pub fn category_weight(category: Category) -> f64 {
    match category {
        Category::Hanabi => 1.2,
        Category::Matsuri => 1.0,
        Category::Nature => 0.8,
        Category::Other => 1.0,
    }
}

/// `exp(-km / 5)`, in `(0, 1]` for any finite non-negative distance.
pub fn space_score(distance_km: f64) -> f64 {
    (-distance_km.max(0.0) / SPACE_DECAY_KM).exp()
}

/// Time factor from status; upcoming events decay continuously past 24 hours.
pub fn time_score(status: &EventStatus) -> f64 {
    match status {
        EventStatus::Ongoing { .. } => 1.0,
        EventStatus::Upcoming { until_start } => {
            let hours = until_start.num_seconds() as f64 / 3600.0;
            if hours < 3.0 {
                0.8
            } else if hours < 12.0 {
                0.6
            } else if hours < 24.0 {
                0.3
            } else {
                let days = hours / 24.0;
                (0.3 / (1.0 + (days - 1.0) / 14.0)).max(0.03)
            }
        }
        EventStatus::Ended => 0.05,
        EventStatus::Unknown => 0.08,
    }
}

/// Normalized popularity.
pub fn heat_score(heat: i32) -> f64 {
    (heat as f64 / 100.0).clamp(0.0, 1.0)
}

/// Scores one place at `now`.
pub fn score(place: &DomainPlace, now: DateTime<Utc>) -> ScoreBreakdown {
    let status = resolve_status(place.start_at, place.end_at, now);
    let space = space_score(place.distance_km());
    let time = time_score(&status);
    let heat = heat_score(place.heat_score);
    let category_weight = category_weight(place.category);
    let geo_penalty = if place.has_low_confidence_coordinate() {
        LOW_CONFIDENCE_PENALTY
    } else {
        1.0
    };

    let total = (SPACE_WEIGHT * space + TIME_WEIGHT * time + HEAT_WEIGHT * heat)
        * category_weight
        * geo_penalty;

    ScoreBreakdown {
        space,
        time,
        heat,
        category_weight,
        geo_penalty,
        total,
        stage: status.stage(),
        stage_delta_hours: stage_delta_hours(place, &status, now),
    }
}

fn stage_delta_hours(place: &DomainPlace, status: &EventStatus, now: DateTime<Utc>) -> f64 {
    let since = |t: Option<DateTime<Utc>>| {
        t.map(|t| (now - t).num_seconds() as f64 / 3600.0)
            .unwrap_or(0.0)
    };
    match status {
        EventStatus::Upcoming { until_start } => until_start.num_seconds() as f64 / 3600.0,
        EventStatus::Ongoing { .. } => since(place.start_at),
        EventStatus::Ended => since(place.end_at.or(place.start_at)),
        EventStatus::Unknown => 0.0,
    }
}

/// Best-first ordering of two scored places.
pub fn compare(
    a: (&DomainPlace, &ScoreBreakdown),
    b: (&DomainPlace, &ScoreBreakdown),
) -> Ordering {
    let (pa, sa) = a;
    let (pb, sb) = b;

    let by_score = if (sa.total - sb.total).abs() <= SCORE_EPSILON {
        Ordering::Equal
    } else {
        sb.total.total_cmp(&sa.total)
    };

    by_score
        .then_with(|| hanabi_first(pa.category).cmp(&hanabi_first(pb.category)))
        .then_with(|| sa.stage.cmp(&sb.stage))
        .then_with(|| sa.stage_delta_hours.total_cmp(&sb.stage_delta_hours))
        .then_with(|| pa.distance_meters.total_cmp(&pb.distance_meters))
        .then_with(|| pb.scale_score.cmp(&pa.scale_score))
        .then_with(|| pa.name.cmp(&pb.name))
        .then_with(|| pa.id.cmp(&pb.id))
}

fn hanabi_first(category: Category) -> u8 {
    u8::from(category != Category::Hanabi)
}

/// Ranks places best-first at `now`.
pub fn rank(places: Vec<DomainPlace>, now: DateTime<Utc>) -> Vec<(DomainPlace, ScoreBreakdown)> {
    let mut scored: Vec<(DomainPlace, ScoreBreakdown)> = places
        .into_iter()
        .map(|p| {
            let s = score(&p, now);
            (p, s)
        })
        .collect();
    scored.sort_by(|a, b| compare((&a.0, &a.1), (&b.0, &b.1)));
    scored
}
