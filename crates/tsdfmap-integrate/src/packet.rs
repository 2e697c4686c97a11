//! The unit of work an integrator consumes: one pointcloud observation and
//! the statistics it produces.

use tsdfmap_core::{Position, Transform};

/// One pointcloud observation, already transformed into the world frame by
/// the caller (`tsdfmap-pipeline` resolves `T_G_C` before constructing
/// this).
#[derive(Clone, Debug)]
pub struct PointcloudPacket {
    /// Sensor origin in the world frame.
    pub origin: Position,
    /// Observed endpoints, in the world frame.
    pub points: Vec<Position>,
    /// Per-point color, if the sensor provided one. Same length as
    /// `points` when present.
    pub colors: Option<Vec<[u8; 3]>>,
    /// Whether this packet is a freespace-only observation (carves rays
    /// out to each endpoint but contributes no surface observation —
    /// `tsdfmap-pipeline`'s separate freespace ingestion path produces
    /// these).
    pub is_freespace: bool,
    /// The transform this packet was integrated under, recorded so a later
    /// `Submap` deintegration can re-derive `origin`/`points` without
    /// resolving the transform oracle a second time.
    pub transform_used: Transform,
}

impl PointcloudPacket {
    #[must_use]
    pub fn color_for(&self, index: usize) -> Option<[u8; 3]> {
        self.colors.as_ref().map(|c| c[index])
    }
}

/// Outcome of one `integrate`/`deintegrate` call, used for logging and for
/// the pipeline's verbose timing diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IntegrationStats {
    pub points_processed: usize,
    pub rays_cast: usize,
    pub voxels_updated: usize,
    pub blocks_touched: usize,
}

impl std::ops::Add for IntegrationStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            points_processed: self.points_processed + rhs.points_processed,
            rays_cast: self.rays_cast + rhs.rays_cast,
            voxels_updated: self.voxels_updated + rhs.voxels_updated,
            blocks_touched: self.blocks_touched + rhs.blocks_touched,
        }
    }
}
