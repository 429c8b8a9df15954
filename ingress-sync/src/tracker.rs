//! Dedup / change tracker.
//!
//! Maps each record identity to the freshness marker of its last successful
//! write. The provider re-sends unchanged records on every poll; the tracker
//! is what keeps those from turning into store writes.
//!
//! Policy:
//! - unknown identity → publish
//! - known identity → publish only if the new marker is strictly newer
//! - missing or ambiguous markers → publish (a redundant merge is harmless,
//!   a missed update is not)

use std::cmp::Ordering;
use std::collections::HashMap;

use ingress_core::{FreshnessMarker, RecordIdentity};

/// In-memory identity → marker map, owned by a single stream.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    markers: HashMap<RecordIdentity, Option<FreshnessMarker>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a record with `marker` merits a write this cycle.
    pub fn should_publish(
        &self,
        identity: &RecordIdentity,
        marker: Option<&FreshnessMarker>,
    ) -> bool {
        let Some(stored) = self.markers.get(identity) else {
            return true;
        };
        let (Some(stored), Some(marker)) = (stored.as_ref(), marker) else {
            return true;
        };
        match marker.compare(stored) {
            Some(Ordering::Greater) | None => true,
            Some(Ordering::Equal | Ordering::Less) => false,
        }
    }

    /// Remember `marker` for `identity`. Call only after a successful write.
    pub fn record(&mut self, identity: RecordIdentity, marker: Option<FreshnessMarker>) {
        self.markers.insert(identity, marker);
    }

    /// Whether a write for `identity` has ever succeeded in this process.
    pub fn contains(&self, identity: &RecordIdentity) -> bool {
        self.markers.contains_key(identity)
    }

    pub fn marker(&self, identity: &RecordIdentity) -> Option<&FreshnessMarker> {
        self.markers.get(identity).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
