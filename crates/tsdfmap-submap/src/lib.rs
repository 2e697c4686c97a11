//! Submap lifecycle: fixed wall-clock interval rotation, the per-submap
//! deintegration window, registration point caching, and block pruning.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod collection;
mod queue;
mod submap;

pub use collection::SubmapCollection;
pub use queue::{DeintegrationPacket, DeintegrationQueue};
pub use submap::Submap;
