use chrono::{DateTime, Utc};

use crate::sqltime::truncate_to_seconds;
use crate::store::SeqNum;

/// Volatile mirror of a session row's mutable fields.
///
/// Owners write through to storage first and only then update the cache,
/// so the cache is never ahead of what is durable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceCache {
    creation_time: DateTime<Utc>,
    next_sender_seq: SeqNum,
    next_target_seq: SeqNum,
}

impl SequenceCache {
    /// A brand-new session: both counters at 1.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            creation_time: truncate_to_seconds(now),
            next_sender_seq: 1,
            next_target_seq: 1,
        }
    }

    /// Rebuild from a persisted session row.
    pub fn from_parts(
        creation_time: DateTime<Utc>,
        next_sender_seq: SeqNum,
        next_target_seq: SeqNum,
    ) -> Self {
        Self {
            creation_time: truncate_to_seconds(creation_time),
            next_sender_seq,
            next_target_seq,
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn next_sender_seq(&self) -> SeqNum {
        self.next_sender_seq
    }

    pub fn next_target_seq(&self) -> SeqNum {
        self.next_target_seq
    }

    pub fn set_next_sender_seq(&mut self, seq: SeqNum) {
        self.next_sender_seq = seq;
    }

    pub fn set_next_target_seq(&mut self, seq: SeqNum) {
        self.next_target_seq = seq;
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_starts_at_one() {
        let cache = SequenceCache::new(noon());
        assert_eq!(cache.next_sender_seq(), 1);
        assert_eq!(cache.next_target_seq(), 1);
        assert_eq!(cache.creation_time(), noon());
    }

    #[test]
    fn creation_time_truncated() {
        let cache = SequenceCache::new(noon() + chrono::Duration::milliseconds(750));
        assert_eq!(cache.creation_time(), noon());
    }

    #[test]
    fn setters_are_independent() {
        let mut cache = SequenceCache::new(noon());
        cache.set_next_sender_seq(10);
        assert_eq!(cache.next_sender_seq(), 10);
        assert_eq!(cache.next_target_seq(), 1);
        cache.set_next_target_seq(7);
        assert_eq!(cache.next_sender_seq(), 10);
        assert_eq!(cache.next_target_seq(), 7);
    }

    #[test]
    fn reset_restores_fresh_state() {
        let mut cache = SequenceCache::from_parts(noon(), 42, 17);
        let later = noon() + chrono::Duration::hours(3);
        cache.reset(later);
        assert_eq!(cache, SequenceCache::new(later));
    }
}
