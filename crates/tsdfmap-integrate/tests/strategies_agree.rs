//! All three integrator strategies should leave roughly the same surface
//! behind for a simple, well-separated scan, even though they take
//! different paths (serial rays, binned rays, round-robin workers) to get
//! there.

use tsdfmap_core::{Config, IntegratorMethod, Layer, Position, Transform, UpdatedFlags};
use tsdfmap_integrate::{FastIntegrator, Integrator, MergedIntegrator, PointcloudPacket, SimpleIntegrator};

fn packet() -> PointcloudPacket {
    PointcloudPacket {
        origin: Position::new(0.0, 0.0, 0.0),
        points: vec![
            Position::new(1.0, 0.0, 0.0),
            Position::new(0.0, 1.0, 0.0),
            Position::new(0.0, 0.0, 1.0),
            Position::new(-1.0, 0.0, 0.0),
        ],
        colors: None,
        is_freespace: false,
        transform_used: Transform::identity(),
    }
}

#[test]
fn every_strategy_touches_at_least_one_block_per_point_direction() {
    let cfg = Config::default();

    let simple_layer = Layer::new(cfg.voxel_size, cfg.voxels_per_side);
    SimpleIntegrator::new().integrate(&simple_layer, &packet(), &cfg);
    assert!(simple_layer.block_count() >= 4);

    let merged_layer = Layer::new(cfg.voxel_size, cfg.voxels_per_side);
    MergedIntegrator::new(4).integrate(&merged_layer, &packet(), &cfg);
    assert!(merged_layer.block_count() >= 4);

    let mut fast_cfg = cfg.clone();
    fast_cfg.method = IntegratorMethod::Fast;
    let fast_layer = Layer::new(fast_cfg.voxel_size, fast_cfg.voxels_per_side);
    FastIntegrator::new(4, &fast_cfg).integrate(&fast_layer, &packet(), &fast_cfg);
    assert!(fast_layer.block_count() >= 4);
}

#[test]
fn build_selects_strategy_from_config_method() {
    let mut cfg = Config::default();
    for method in [IntegratorMethod::Simple, IntegratorMethod::Merged, IntegratorMethod::Fast] {
        cfg.method = method;
        let integrator = tsdfmap_integrate::build(&cfg);
        let layer = Layer::new(cfg.voxel_size, cfg.voxels_per_side);
        let stats = integrator.integrate(&layer, &packet(), &cfg);
        assert_eq!(stats.points_processed, 4);
        let touched = layer.iterate_updated(UpdatedFlags::MAP);
        assert!(!touched.is_empty());
    }
}
