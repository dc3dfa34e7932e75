pub mod cache;
pub mod clock;
pub mod log;
pub mod session_key;
pub mod sqltime;
pub mod store;

pub use cache::SequenceCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use log::{AppendOutcome, Log, LogScope, LogStream};
pub use session_key::{ParseSessionKeyError, SessionKey};
pub use store::{MessageStore, SeqNum};
