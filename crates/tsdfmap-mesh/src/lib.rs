//! The mesh-extraction trait boundary, dirty-block tracking, and the
//! message format consumers receive.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod dirty;
mod extractor;
mod message;

pub use dirty::MeshTracker;
pub use extractor::{MeshError, MeshExtractor, NullMeshExtractor};
pub use message::{select_trailing_poses, BlockMesh, MeshHistoryConfig, MeshUpdate};
