//! Wire protocol: registration messages, status notifications, and the
//! registration error taxonomy.
//!
//! The protocol is deliberately small.  Registration messages are JSON so
//! that clients in any language can produce them with a one-liner; status
//! notifications are colon-delimited plain text so that even the most
//! constrained device firmware can match on a prefix.

pub mod error;
pub mod messages;
pub mod status;
