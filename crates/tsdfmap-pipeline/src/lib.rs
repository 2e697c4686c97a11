//! The pointcloud ingestion pipeline: admission throttling, queued
//! transform resolution, ICP refinement, submap-aware integration, and
//! the periodic maintenance (mesh/publish timers, submap rotation,
//! distance-based eviction) that a running map session needs between
//! pointcloud arrivals.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod colormap;
mod icp;
mod oracle;
mod pipeline;
mod publisher;
mod queue;
mod timer;

pub use colormap::{ColorMap, GrayColorMap};
pub use icp::{IcpCorrection, IcpHook, IdentityIcp};
pub use oracle::{IdentityOracle, TransformOracle};
pub use pipeline::Pipeline;
pub use publisher::{
    isosurface_pointcloud, occupancy_block_markers, reprojected_pointcloud, slice_pointcloud,
    updated_voxel_pointcloud, IntensityPoint, LayerPublisher, OccupancyMarker,
};
pub use queue::{PendingQueue, RawPointcloud, MAX_QUEUE_SIZE};
pub use timer::PeriodicTimer;
