//! Host-side staleness tokens for superseded queries.
//!
//! Searches cannot be cancelled mid-read. A host that fires a newer query
//! before an older one returns takes a token for each and drops any result
//! whose token is no longer current.
//!
//! ```
//! use festa::generation::QueryGenerations;
//!
//! let generations = QueryGenerations::new();
//! let first = generations.begin();
//! let second = generations.begin();
//! assert!(!generations.is_current(&first));
//! assert!(generations.is_current(&second));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque marker for one issued query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryToken(u64);

/// Monotonic generation counter shared by a host's query issuers.
#[derive(Debug, Default)]
pub struct QueryGenerations {
    current: AtomicU64,
}

impl QueryGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation, superseding every earlier token.
    pub fn begin(&self) -> QueryToken {
        QueryToken(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, token: &QueryToken) -> bool {
        self.current.load(Ordering::Acquire) == token.0
    }
}
