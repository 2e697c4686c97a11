//! The simple integrator: one ray cast per point, processed serially in
//! observation order. No parallelism, no approximation — used as the
//! reference strategy and in tests that need deterministic results.

use tracing::debug;
use tsdfmap_core::{Config, Layer};

use crate::common::integrate_ray;
use crate::packet::{IntegrationStats, PointcloudPacket};
use crate::Integrator;

#[derive(Default)]
pub struct SimpleIntegrator;

impl SimpleIntegrator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn run(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config, sign: f32) -> IntegrationStats {
        let mut stats = IntegrationStats::default();
        let mut blocks_seen = std::collections::HashSet::new();

        for (i, point) in packet.points.iter().enumerate() {
            let color = packet.color_for(i);
            let (voxel_count, blocks) = integrate_ray(
                layer,
                packet.origin,
                *point,
                color,
                config,
                sign,
                packet.is_freespace,
                1.0,
            );
            stats.rays_cast += 1;
            stats.voxels_updated += voxel_count;
            blocks_seen.extend(blocks);
        }
        stats.points_processed = packet.points.len();
        stats.blocks_touched = blocks_seen.len();
        debug!(rays = stats.rays_cast, voxels = stats.voxels_updated, "simple integrator pass complete");
        stats
    }
}

impl Integrator for SimpleIntegrator {
    fn integrate(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config) -> IntegrationStats {
        self.run(layer, packet, config, 1.0)
    }

    fn deintegrate(&self, layer: &Layer, packet: &PointcloudPacket, config: &Config) -> IntegrationStats {
        self.run(layer, packet, config, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdfmap_core::Position;

    fn packet(points: Vec<Position>) -> PointcloudPacket {
        PointcloudPacket {
            origin: Position::new(0.0, 0.0, 0.0),
            points,
            colors: None,
            is_freespace: false,
            transform_used: tsdfmap_core::Transform::identity(),
        }
    }

    #[test]
    fn integrate_processes_every_point() {
        let layer = Layer::new(0.1, 8);
        let cfg = Config::default();
        let integrator = SimpleIntegrator::new();
        let pkt = packet(vec![
            Position::new(1.0, 0.0, 0.0),
            Position::new(0.0, 1.0, 0.0),
        ]);
        let stats = integrator.integrate(&layer, &pkt, &cfg);
        assert_eq!(stats.points_processed, 2);
        assert_eq!(stats.rays_cast, 2);
        assert!(stats.voxels_updated > 0);
    }

    #[test]
    fn deintegrate_is_inverse_of_integrate() {
        let layer = Layer::new(0.1, 8);
        let cfg = Config::default();
        let integrator = SimpleIntegrator::new();
        let pkt = packet(vec![Position::new(1.0, 0.0, 0.0)]);

        integrator.integrate(&layer, &pkt, &cfg);
        integrator.deintegrate(&layer, &pkt, &cfg);

        for idx in layer.iterate_all() {
            let gone = layer
                .with_block(idx, |b| b.is_fully_deintegrated(tsdfmap_core::WEIGHT_EPSILON))
                .unwrap_or(true);
            assert!(gone);
        }
    }
}
