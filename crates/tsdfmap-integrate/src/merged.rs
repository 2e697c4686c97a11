//! The merged integrator: bins points by the voxel their endpoint falls
//! in, casts a single ray per bin through the weighted centroid of that
//! bin's points, and distributes the per-bin work across the worker pool.
//! Trades a little endpoint precision for far fewer, coarser-grained rays
//! and embarrassingly parallel map-reduce across bins.

use std::collections::HashMap;

use tracing::debug;
use tsdfmap_core::{voxel_containing, Config, GlobalVoxel, Layer, Position};

use crate::common::integrate_ray;
use crate::packet::{IntegrationStats, PointcloudPacket};
use crate::pool::WorkerPool;
use crate::Integrator;

pub struct MergedIntegrator {
    pool: WorkerPool,
}

impl MergedIntegrator {
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self {
            pool: WorkerPool::new(threads),
        }
    }

    fn run(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config, sign: f32) -> IntegrationStats {
        let mut bins: HashMap<GlobalVoxel, Bin> = HashMap::new();

        for (i, point) in packet.points.iter().enumerate() {
            let key = voxel_containing(*point, layer.voxel_size(), layer.voxels_per_side());
            let bin = bins.entry(key).or_default();
            bin.sum += point.coords;
            bin.count += 1;
            if let Some(color) = packet.color_for(i) {
                bin.color_sum[0] += u32::from(color[0]);
                bin.color_sum[1] += u32::from(color[1]);
                bin.color_sum[2] += u32::from(color[2]);
                bin.colored_count += 1;
            }
        }

        let origin = packet.origin;
        let is_freespace = packet.is_freespace;
        let n_bins = bins.len();

        let jobs: Vec<_> = bins
            .into_values()
            .map(|bin| {
                move || {
                    let centroid = Position::from(bin.sum / f64::from(bin.count));
                    let color = if bin.colored_count > 0 {
                        Some([
                            (bin.color_sum[0] / bin.colored_count) as u8,
                            (bin.color_sum[1] / bin.colored_count) as u8,
                            (bin.color_sum[2] / bin.colored_count) as u8,
                        ])
                    } else {
                        None
                    };
                    // One ray cast through the centroid, carrying the
                    // combined weight of every point the bin absorbed, so a
                    // bin of N points contributes the confidence of N
                    // observations rather than just one.
                    integrate_ray(
                        layer,
                        origin,
                        centroid,
                        color,
                        config,
                        sign,
                        is_freespace,
                        bin.count as f32,
                    )
                }
            })
            .collect();

        let results = self.pool.map(jobs);

        let mut stats = IntegrationStats {
            points_processed: packet.points.len(),
            rays_cast: n_bins,
            ..IntegrationStats::default()
        };
        let mut blocks_seen = std::collections::HashSet::new();
        for (voxel_count, blocks) in results {
            stats.voxels_updated += voxel_count;
            blocks_seen.extend(blocks);
        }
        stats.blocks_touched = blocks_seen.len();
        debug!(bins = n_bins, voxels = stats.voxels_updated, "merged integrator pass complete");
        stats
    }
}

#[derive(Default)]
struct Bin {
    sum: nalgebra::Vector3<f64>,
    count: u32,
    color_sum: [u32; 3],
    colored_count: u32,
}

impl Integrator for MergedIntegrator {
    fn integrate(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config) -> IntegrationStats {
        self.run(layer, packet, config, 1.0)
    }

    fn deintegrate(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config) -> IntegrationStats {
        self.run(layer, packet, config, -1.0)
    }
}
