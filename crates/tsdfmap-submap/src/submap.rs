//! A single submap: its own TSDF layer, pose history, and deintegration
//! window, finalized once and then immutable.

use tracing::{debug, info};
use tsdfmap_core::{BlockIndex, Config, Layer, Position, Transform, WEIGHT_EPSILON};
use tsdfmap_integrate::Integrator;

use crate::queue::{DeintegrationPacket, DeintegrationQueue};

/// A submap under construction or already finalized.
pub struct Submap {
    pub id: u64,
    pub layer: Layer,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub pose_history: Vec<(f64, Transform)>,
    pub finished: bool,
    deintegration_queue: DeintegrationQueue,
    registration_points: Option<Vec<Position>>,
}

impl Submap {
    #[must_use]
    pub fn new(id: u64, start_time: f64, config: &Config) -> Self {
        Self {
            id,
            layer: Layer::new(config.voxel_size, config.voxels_per_side),
            start_time,
            end_time: None,
            pose_history: Vec::new(),
            finished: false,
            deintegration_queue: DeintegrationQueue::new(config.pointcloud_deintegration_queue_length),
            registration_points: None,
        }
    }

    pub fn record_pose(&mut self, timestamp: f64, pose: Transform) {
        self.pose_history.push((timestamp, pose));
    }

    /// Enqueue a just-integrated packet into this submap's sliding
    /// deintegration window. If the window is at capacity, deintegrates
    /// and returns the evicted (oldest) entry's stats.
    pub fn enqueue_and_maybe_deintegrate(
        &mut self,
        entry: DeintegrationPacket,
        integrator: &dyn Integrator,
        config: &Config,
    ) {
        if let Some(evicted) = self.deintegration_queue.push(entry) {
            if let Some(packet) = evicted.packet {
                let stats = integrator.deintegrate(&self.layer, &packet, config);
                debug!(submap = self.id, voxels = stats.voxels_updated, "evicted oldest frame from deintegration window");
            }
        }
    }

    /// Roll back every packet still sitting in the deintegration window.
    /// Called when a submap closes (in continuous mode its trailing
    /// window should not silently persist into the next submap) and when
    /// a collection is cleared.
    pub fn flush_deintegration_queue(&mut self, integrator: &dyn Integrator, config: &Config) {
        for entry in self.deintegration_queue.drain() {
            if let Some(packet) = entry.packet {
                integrator.deintegrate(&self.layer, &packet, config);
            }
        }
    }

    /// Finalize this submap: flush its deintegration window, cache its
    /// registration points, and mark it immutable.
    pub fn finalize(&mut self, end_time: f64, integrator: &dyn Integrator, config: &Config) {
        self.flush_deintegration_queue(integrator, config);
        self.registration_points = Some(self.generate_registration_points());
        self.end_time = Some(end_time);
        self.finished = true;
        info!(submap = self.id, blocks = self.layer.block_count(), "submap finalized");
    }

    /// Registration points sampled near the zero crossing of the TSDF
    /// surface, for use as a `Registration` constraint's correspondence
    /// set in the pose graph back end. Computed once and cached at
    /// finalize time since a finished submap's layer never changes again.
    #[must_use]
    pub fn registration_points(&self) -> &[Position] {
        self.registration_points.as_deref().unwrap_or(&[])
    }

    fn generate_registration_points(&self) -> Vec<Position> {
        let mut points = Vec::new();
        let voxel_size = self.layer.voxel_size();
        for index in self.layer.iterate_all() {
            let Some(block) = self.layer.get(index) else {
                continue;
            };
            let side = block.voxels_per_side();
            for linear in 0..block.voxels().len() {
                let voxel = block.voxel_by_linear_index(linear);
                if !voxel.is_observed() {
                    continue;
                }
                if voxel.distance.abs() > voxel_size as f32 {
                    continue;
                }
                let local = tsdfmap_core::LocalVoxel::from_linear_index(linear, side);
                let center = Position::new(
                    block.origin.x + (f64::from(local.x) + 0.5) * voxel_size,
                    block.origin.y + (f64::from(local.y) + 0.5) * voxel_size,
                    block.origin.z + (f64::from(local.z) + 0.5) * voxel_size,
                );
                points.push(center);
            }
        }
        points
    }

    /// Remove and return every block that has fully decayed back to zero
    /// weight (a pruning candidate left behind by the deintegration
    /// window or by `flush_deintegration_queue`).
    pub fn prune_deintegrated_blocks(&mut self) -> Vec<BlockIndex> {
        let mut pruned = Vec::new();
        for index in self.layer.iterate_all() {
            let fully_gone = self
                .layer
                .with_block(index, |b| b.is_fully_deintegrated(WEIGHT_EPSILON))
                .unwrap_or(false);
            if fully_gone {
                self.layer.remove(index);
                pruned.push(index);
            }
        }
        pruned
    }

    /// Axis-aligned bounding box `(min, max)` over every allocated block's
    /// origin-to-far-corner extent, or `None` if the submap holds no
    /// blocks yet.
    #[must_use]
    pub fn bounding_box(&self) -> Option<(Position, Position)> {
        let block_size = self.layer.block_size();
        let indices = self.layer.iterate_all();
        let mut iter = indices.into_iter();
        let first = iter.next()?;
        let first_origin = first.origin(block_size);
        let mut min = first_origin;
        let mut max = Position::new(
            first_origin.x + block_size,
            first_origin.y + block_size,
            first_origin.z + block_size,
        );
        for index in iter {
            let origin = index.origin(block_size);
            min.x = min.x.min(origin.x);
            min.y = min.y.min(origin.y);
            min.z = min.z.min(origin.z);
            max.x = max.x.max(origin.x + block_size);
            max.y = max.y.max(origin.y + block_size);
            max.z = max.z.max(origin.z + block_size);
        }
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdfmap_integrate::SimpleIntegrator;

    #[test]
    fn fresh_submap_has_no_bounding_box() {
        let config = Config::default();
        let submap = Submap::new(0, 0.0, &config);
        assert!(submap.bounding_box().is_none());
    }

    #[test]
    fn finalize_marks_submap_finished_and_caches_registration_points() {
        let config = Config::default();
        let mut submap = Submap::new(0, 0.0, &config);
        let integrator = SimpleIntegrator::new();
        submap.layer.allocate_or_get(BlockIndex::new(0, 0, 0));

        submap.finalize(10.0, &integrator, &config);

        assert!(submap.finished);
        assert_eq!(submap.end_time, Some(10.0));
        // No observed voxels were ever written, so no registration points.
        assert!(submap.registration_points().is_empty());
    }

    #[test]
    fn prune_removes_fully_deintegrated_blocks_only() {
        let config = Config::default();
        let mut submap = Submap::new(0, 0.0, &config);
        let integrator = SimpleIntegrator::new();

        let pkt = tsdfmap_integrate::PointcloudPacket {
            origin: Position::new(0.0, 0.0, 0.0),
            points: vec![Position::new(1.0, 0.0, 0.0)],
            colors: None,
            is_freespace: false,
            transform_used: Transform::identity(),
        };
        integrator.integrate(&submap.layer, &pkt, &config);
        integrator.deintegrate(&submap.layer, &pkt, &config);

        let pruned = submap.prune_deintegrated_blocks();
        assert!(!pruned.is_empty());
        assert_eq!(submap.layer.block_count(), 0);
    }
}
