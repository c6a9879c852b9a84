pub mod errors;
pub mod ids;
pub mod messages;

pub use errors::{DecodeError, LedgerError, SendError};
pub use ids::{ConnectionId, PlayerId};
pub use messages::{PlayerState, ServerMessage, Snapshot};
