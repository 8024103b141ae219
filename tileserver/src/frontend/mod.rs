//! Request front ends
//!
//! Three independent ways to receive a tile request, all resolved through
//! the same [`TileService`](crate::service::TileService):
//!
//! - [`http`]: `GET /{z}/{x}/{y}.png`
//! - [`socket`]: one `z;x;y` line per connection, raw PNG back
//! - [`queue`]: `{z}-{x}-{y}.request` marker files claimed by lock

pub mod http;
mod lock;
pub mod queue;
pub mod socket;

pub use lock::{LockError, MarkerClaim};
pub use queue::{
    marker_name, parse_marker_name, FileQueueWorker, MarkerScanner, QueueOutcome, QueueStats,
    MARKER_EXTENSION,
};
pub use socket::{parse_request_line, SocketFrontEnd};
