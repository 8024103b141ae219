//! CLI command implementations.

pub mod cache;
pub mod prerender;
pub mod queue;
pub mod serve;
pub mod socket;
