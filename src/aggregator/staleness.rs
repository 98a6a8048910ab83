use time::{Duration, OffsetDateTime};

pub const DEFAULT_MAX_AGE: Duration = Duration::minutes(5);

/// True when `last_updated` is more than `max_age` behind `now`
pub fn is_stale(last_updated: OffsetDateTime, now: OffsetDateTime, max_age: Duration) -> bool {
    now - last_updated > max_age
}

/// Decides whether a snapshot is fresh enough to publish
#[derive(Debug, Clone, Copy)]
pub struct StalenessGuard {
    max_age: Duration,
}

impl StalenessGuard {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// A record that has never been updated is always stale.
    pub fn check(&self, last_updated: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
        match last_updated {
            Some(last_updated) => is_stale(last_updated, now, self.max_age),
            None => true,
        }
    }
}

impl Default for StalenessGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}
