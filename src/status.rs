//! Event lifecycle derived from start, end and the current instant.
//!
//! ```text
//!            now < start          start ≤ now ≤ end        now > end
//! unknown    ───────────▶ upcoming ──────────────▶ ongoing ─────────▶ ended
//! (no start)
//! ```
//!
//! Both window bounds are inclusive. Without a usable end the event counts as
//! ended from its start onward; the mapping layer is responsible for filling
//! in a default duration before calling this resolver.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Countdown window over which `wait_progress` runs from 0 to 1.
pub const WAIT_PROGRESS_WINDOW_MINUTES: f64 = 180.0;

/// Stage ordering used by ranking tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusStage {
    Ongoing = 0,
    Upcoming = 1,
    Ended = 2,
    Unknown = 3,
}

/// Lifecycle state of one event at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventStatus {
    /// No start time known.
    Unknown,
    /// Starts in `until_start` (always positive).
    Upcoming { until_start: Duration },
    /// Running; `progress` is the elapsed fraction of the window.
    Ongoing { progress: f64 },
    Ended,
}

impl EventStatus {
    pub fn stage(&self) -> StatusStage {
        match self {
            Self::Ongoing { .. } => StatusStage::Ongoing,
            Self::Upcoming { .. } => StatusStage::Upcoming,
            Self::Ended => StatusStage::Ended,
            Self::Unknown => StatusStage::Unknown,
        }
    }

    /// Time left until start, for upcoming events.
    pub fn countdown(&self) -> Option<Duration> {
        match self {
            Self::Upcoming { until_start } => Some(*until_start),
            _ => None,
        }
    }

    /// Fill level for a "starting soon" bar, only within 24 hours of start.
    pub fn wait_progress(&self) -> Option<f64> {
        match self {
            Self::Upcoming { until_start } if *until_start <= Duration::hours(24) => {
                let minutes = until_start.num_seconds() as f64 / 60.0;
                Some((1.0 - minutes / WAIT_PROGRESS_WINDOW_MINUTES).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }

    /// Elapsed fraction: ongoing → `[0, 1]`, ended → 1.
    pub fn progress(&self) -> Option<f64> {
        match self {
            Self::Ongoing { progress } => Some(*progress),
            Self::Ended => Some(1.0),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Upcoming { .. } => "upcoming",
            Self::Ongoing { .. } => "ongoing",
            Self::Ended => "ended",
        }
    }
}

/// Resolves the status of an event window at `now`.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use festa::status::{resolve_status, StatusStage};
///
/// let start = Utc.with_ymd_and_hms(2025, 8, 2, 10, 30, 0).unwrap();
/// let end = start + Duration::hours(2);
/// assert_eq!(resolve_status(Some(start), Some(end), start).stage(), StatusStage::Ongoing);
/// assert_eq!(resolve_status(Some(start), Some(end), end).stage(), StatusStage::Ongoing);
/// assert_eq!(
///     resolve_status(Some(start), Some(end), end + Duration::seconds(1)).stage(),
///     StatusStage::Ended
/// );
/// ```
pub fn resolve_status(
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> EventStatus {
    let Some(start) = start_at else {
        return EventStatus::Unknown;
    };

    if now < start {
        return EventStatus::Upcoming {
            until_start: start - now,
        };
    }

    match end_at.filter(|end| *end >= start) {
        Some(end) if now <= end => {
            let window = (end - start).num_milliseconds();
            let progress = if window <= 0 {
                1.0
            } else {
                ((now - start).num_milliseconds() as f64 / window as f64).clamp(0.0, 1.0)
            };
            EventStatus::Ongoing { progress }
        }
        _ => EventStatus::Ended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 26, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_no_start_is_unknown() {
        assert_eq!(resolve_status(None, Some(start()), start()), EventStatus::Unknown);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let end = start() + Duration::hours(2);
        assert_eq!(
            resolve_status(Some(start()), Some(end), start()),
            EventStatus::Ongoing { progress: 0.0 }
        );
        assert_eq!(
            resolve_status(Some(start()), Some(end), end),
            EventStatus::Ongoing { progress: 1.0 }
        );
        assert_eq!(
            resolve_status(Some(start()), Some(end), end + Duration::seconds(1)),
            EventStatus::Ended
        );
    }

    #[test]
    fn test_missing_or_inverted_end_ends_at_start() {
        assert_eq!(resolve_status(Some(start()), None, start()), EventStatus::Ended);
        let inverted = start() - Duration::hours(1);
        assert_eq!(
            resolve_status(Some(start()), Some(inverted), start() + Duration::minutes(1)),
            EventStatus::Ended
        );
    }

    #[test]
    fn test_zero_length_window() {
        assert_eq!(
            resolve_status(Some(start()), Some(start()), start()),
            EventStatus::Ongoing { progress: 1.0 }
        );
    }

    #[test]
    fn test_ongoing_progress_midpoint() {
        let end = start() + Duration::hours(4);
        let status = resolve_status(Some(start()), Some(end), start() + Duration::hours(1));
        assert_eq!(status.progress(), Some(0.25));
    }

    #[test]
    fn test_wait_progress_only_within_a_day() {
        let now = start() - Duration::minutes(90);
        let status = resolve_status(Some(start()), None, now);
        assert_eq!(status.wait_progress(), Some(0.5));
        assert_eq!(status.countdown(), Some(Duration::minutes(90)));

        let far = resolve_status(Some(start()), None, start() - Duration::hours(25));
        assert_eq!(far.wait_progress(), None);

        let day = resolve_status(Some(start()), None, start() - Duration::hours(24));
        assert_eq!(day.wait_progress(), Some(0.0));
    }

    #[test]
    fn test_stage_never_moves_backwards() {
        let end = start() + Duration::hours(3);
        let mut now = start() - Duration::hours(2);
        let mut last = resolve_status(Some(start()), Some(end), now).stage();
        let rank = |s: StatusStage| match s {
            StatusStage::Unknown => 0,
            StatusStage::Upcoming => 1,
            StatusStage::Ongoing => 2,
            StatusStage::Ended => 3,
        };
        while now < end + Duration::hours(2) {
            now += Duration::minutes(7);
            let stage = resolve_status(Some(start()), Some(end), now).stage();
            assert!(rank(stage) >= rank(last));
            last = stage;
        }
        assert_eq!(last, StatusStage::Ended);
    }
}
