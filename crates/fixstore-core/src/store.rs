use chrono::{DateTime, Utc};

/// FIX message sequence number. Counters start at 1.
pub type SeqNum = u64;

/// Sequence-number bookkeeping plus the per-session message archive used
/// for resend requests.
///
/// Reads come from an in-memory cache and never fail. Every mutation is
/// persisted before the cache moves, so an error leaves the cache where it
/// was. Implementations assume a single writer per session.
pub trait MessageStore {
    type Error: std::error::Error;

    fn next_sender_seq(&self) -> SeqNum;
    fn next_target_seq(&self) -> SeqNum;

    fn set_next_sender_seq(&mut self, seq: SeqNum) -> Result<(), Self::Error>;
    fn set_next_target_seq(&mut self, seq: SeqNum) -> Result<(), Self::Error>;

    fn incr_next_sender_seq(&mut self) -> Result<(), Self::Error> {
        let next = self.next_sender_seq().saturating_add(1);
        self.set_next_sender_seq(next)
    }

    fn incr_next_target_seq(&mut self) -> Result<(), Self::Error> {
        let next = self.next_target_seq().saturating_add(1);
        self.set_next_target_seq(next)
    }

    fn creation_time(&self) -> DateTime<Utc>;

    /// Store `message` under `seq`, replacing any body already there.
    fn put_message(&mut self, seq: SeqNum, message: &[u8]) -> Result<(), Self::Error>;

    /// Messages with `begin <= seq <= end`, ascending. Empty when nothing matches.
    fn get_messages(&self, begin: SeqNum, end: SeqNum) -> Result<Vec<Vec<u8>>, Self::Error>;

    /// Drop every archived message and restart both counters at 1.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Discard the cache and reload it from storage.
    fn refresh(&mut self) -> Result<(), Self::Error>;
}
