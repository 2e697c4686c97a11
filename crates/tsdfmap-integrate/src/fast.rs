//! The fast integrator: points are round-robined across a fixed set of
//! workers, each of which skips rays/voxels it has touched very recently.
//! This trades determinism and a little recall for throughput — two
//! workers racing on adjacent rays may each integrate a voxel the other
//! just touched, and a worker may skip a ray whose endpoint voxel it
//! visited moments ago even though a different, unseen point shares that
//! voxel. Both are acceptable approximations for a real-time front end.

use std::collections::{HashSet, VecDeque};

use tracing::debug;
use tsdfmap_core::{voxel_containing, Config, GlobalVoxel, Layer, Position};

use crate::packet::{IntegrationStats, PointcloudPacket};
use crate::pool::WorkerPool;
use crate::Integrator;

/// A bounded, approximate "have I seen this recently" set: a ring buffer
/// of the last `capacity` keys backed by a `HashSet` for O(1) membership.
/// Reset at the start of every `integrate`/`deintegrate` call.
struct RecentSet<T: std::hash::Hash + Eq + Copy> {
    capacity: usize,
    order: VecDeque<T>,
    set: HashSet<T>,
}

impl<T: std::hash::Hash + Eq + Copy> RecentSet<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            set: HashSet::new(),
        }
    }

    /// Returns `true` if `key` was already present (caller should skip),
    /// and records it as seen either way.
    fn check_and_insert(&mut self, key: T) -> bool {
        if self.set.contains(&key) {
            return true;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.order.push_back(key);
        self.set.insert(key);
        false
    }
}

pub struct FastIntegrator {
    pool: WorkerPool,
    recent_ray_capacity: usize,
    recent_voxel_capacity: usize,
}

impl FastIntegrator {
    #[must_use]
    pub fn new(threads: usize, config: &Config) -> Self {
        Self {
            pool: WorkerPool::new(threads),
            recent_ray_capacity: config.fast_recent_ray_capacity,
            recent_voxel_capacity: config.fast_recent_voxel_capacity,
        }
    }

    fn run(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config, sign: f32) -> IntegrationStats {
        let workers = self.pool.size();
        let mut lanes: Vec<Vec<usize>> = vec![Vec::new(); workers];
        for i in 0..packet.points.len() {
            lanes[i % workers].push(i);
        }

        let origin = packet.origin;
        let is_freespace = packet.is_freespace;
        let recent_ray_capacity = self.recent_ray_capacity;
        let recent_voxel_capacity = self.recent_voxel_capacity;

        let jobs: Vec<_> = lanes
            .into_iter()
            .map(|indices| {
                move || {
                    let mut seen_rays: RecentSet<GlobalVoxel> = RecentSet::new(recent_ray_capacity);
                    let mut seen_voxels: RecentSet<GlobalVoxel> = RecentSet::new(recent_voxel_capacity);
                    let mut lane_stats = IntegrationStats::default();
                    let mut blocks_seen = HashSet::new();

                    for i in indices {
                        let point = packet.points[i];
                        let endpoint_voxel =
                            voxel_containing(point, layer.voxel_size(), layer.voxels_per_side());
                        if seen_rays.check_and_insert(endpoint_voxel) {
                            continue;
                        }

                        let color = packet.color_for(i);
                        let (touched, blocks) = integrate_ray_with_voxel_filter(
                            layer,
                            origin,
                            point,
                            color,
                            config,
                            sign,
                            is_freespace,
                            &mut seen_voxels,
                        );
                        lane_stats.rays_cast += 1;
                        lane_stats.voxels_updated += touched;
                        blocks_seen.extend(blocks);
                    }
                    lane_stats.blocks_touched = blocks_seen.len();
                    lane_stats
                }
            })
            .collect();

        let results = self.pool.map(jobs);
        let mut stats = IntegrationStats {
            points_processed: packet.points.len(),
            ..IntegrationStats::default()
        };
        for lane in results {
            stats = stats + lane;
        }
        debug!(rays = stats.rays_cast, voxels = stats.voxels_updated, "fast integrator pass complete");
        stats
    }
}

/// Like `common::integrate_ray`, but skips any voxel this worker has
/// touched within its own recent-voxel window — the approximation that
/// gives the fast integrator its name.
fn integrate_ray_with_voxel_filter(
    layer: &Layer,
    origin: Position,
    endpoint: Position,
    color: Option<[u8; 3]>,
    config: &Config,
    sign: f32,
    is_freespace: bool,
    seen_voxels: &mut RecentSet<GlobalVoxel>,
) -> (usize, HashSet<tsdfmap_core::BlockIndex>) {
    // Delegate ray tracing and weighting to the shared core, then filter
    // which voxels actually got written by re-deriving the visited set.
    // `integrate_ray` already performs the write; here we only need the
    // bookkeeping, so for the fast path we inline a filtered variant.
    let ray_cfg = tsdfmap_core::RayCastConfig {
        truncation: config.truncation_distance,
        start_from_origin: is_freespace,
        min_range: config.min_ray_length_m,
        max_range: config.max_ray_length_m,
    };
    let voxels = tsdfmap_core::cast_ray(
        origin,
        endpoint,
        layer.voxel_size(),
        layer.voxels_per_side(),
        ray_cfg,
    );
    if voxels.is_empty() {
        return (0, HashSet::new());
    }

    let range = (endpoint - origin).norm() as f32;
    let direction = (endpoint - origin) / f64::from(range.max(f32::EPSILON));
    let policy = config.weighting_policy();
    let mut blocks_touched = HashSet::new();
    let mut touched = 0;

    for gv in &voxels {
        if seen_voxels.check_and_insert(*gv) {
            continue;
        }

        let block_origin = gv.block.origin(layer.block_size());
        let vs = layer.voxel_size();
        let center = Position::new(
            block_origin.x + (f64::from(gv.local.x) + 0.5) * vs,
            block_origin.y + (f64::from(gv.local.y) + 0.5) * vs,
            block_origin.z + (f64::from(gv.local.z) + 0.5) * vs,
        );
        let distance_along_ray = (center - origin).dot(&direction) as f32;
        let sdf = range - distance_along_ray;

        if is_freespace && sdf <= 0.0 {
            continue;
        }

        let weight = policy.weight_for(sdf, range, config.truncation_distance as f32);
        if weight <= 0.0 {
            continue;
        }

        layer.with_block_mut(gv.block, |block| {
            tsdfmap_core::apply_update(
                block.voxel_mut(gv.local),
                sdf,
                weight * sign,
                if is_freespace { None } else { color },
                config.max_weight,
                config.truncation_distance as f32,
            );
            block.mark_updated(tsdfmap_core::UpdatedFlags::MAP);
            block.mark_updated(tsdfmap_core::UpdatedFlags::MESH);
        });
        blocks_touched.insert(gv.block);
        touched += 1;
    }

    (touched, blocks_touched)
}

impl Integrator for FastIntegrator {
    fn integrate(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config) -> IntegrationStats {
        self.run(layer, packet, config, 1.0)
    }

    fn deintegrate(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config) -> IntegrationStats {
        self.run(layer, packet, config, -1.0)
    }
}
