//! Capabilities defined in `postdate-core` and implemented by other crates.

pub mod clock;
pub mod sender;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sender::{MessageSender, OutboundMessage, SendError};
