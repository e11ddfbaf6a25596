use std::time::{Duration, Instant};

use crate::task::Job;

/// Latency budgets beyond what `Instant` can represent are clamped to this.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Sort key of a queue entry: earliest deadline first, then insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct EntryKey {
    pub deadline: Instant,
    pub seq: u64,
}

pub(crate) struct Entry {
    pub key: EntryKey,
    pub job: Job,
}

/// `now + latency`, saturating at a far-future instant.
pub(crate) fn deadline_after(now: Instant, latency: Duration) -> Instant {
    now.checked_add(latency)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
