//! Shared ray-integration core used by every strategy in this crate.

use std::collections::HashSet;

use tsdfmap_core::{
    apply_update, cast_ray, BlockIndex, Config, GlobalVoxel, Layer, Position, RayCastConfig,
    UpdatedFlags,
};

/// Cast one ray from `origin` to `endpoint` and fold the observation into
/// every voxel it passes through. `sign` is `1.0` to integrate and `-1.0`
/// to deintegrate (an exact inverse, see [`tsdfmap_core::deintegrate`]).
/// `weight_scale` multiplies the per-voxel observation weight before it
/// reaches `apply_update`; pass `1.0` for a single-point ray (simple/fast)
/// or the combined weight of a merged bin's points.
///
/// Returns the number of voxels touched and the set of blocks touched
/// (for the caller's `blocks_touched` bookkeeping).
pub fn integrate_ray(
    layer: &Layer,
    origin: Position,
    endpoint: Position,
    color: Option<[u8; 3]>,
    config: &Config,
    sign: f32,
    is_freespace: bool,
    weight_scale: f32,
) -> (usize, HashSet<BlockIndex>) {
    let ray_cfg = RayCastConfig {
        truncation: config.truncation_distance,
        start_from_origin: is_freespace,
        min_range: config.min_ray_length_m,
        max_range: config.max_ray_length_m,
    };

    let voxels = cast_ray(
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
    let direction = (endpoint - origin) / f64::from(range.max(f32::EPSILON as f32));
    let policy = config.weighting_policy();
    let mut blocks_touched = HashSet::new();

    for gv in &voxels {
        let center = voxel_center(layer, *gv);
        let distance_along_ray = (center - origin).dot(&direction) as f32;
        let sdf = range - distance_along_ray;

        if is_freespace && sdf <= 0.0 {
            // Freespace carving never writes a surface crossing, only the
            // empty space in front of it.
            continue;
        }

        let weight = policy.weight_for(sdf, range, config.truncation_distance as f32) * weight_scale;
        if weight <= 0.0 {
            continue;
        }

        layer.with_block_mut(gv.block, |block| {
            apply_update(
                block.voxel_mut(gv.local),
                sdf,
                weight * sign,
                if is_freespace { None } else { color },
                config.max_weight,
                config.truncation_distance as f32,
            );
            block.mark_updated(UpdatedFlags::MAP);
            block.mark_updated(UpdatedFlags::MESH);
        });
        blocks_touched.insert(gv.block);
    }

    (voxels.len(), blocks_touched)
}

fn voxel_center(layer: &Layer, gv: GlobalVoxel) -> Position {
    let block_origin = gv.block.origin(layer.block_size());
    let vs = layer.voxel_size();
    Position::new(
        block_origin.x + (f64::from(gv.local.x) + 0.5) * vs,
        block_origin.y + (f64::from(gv.local.y) + 0.5) * vs,
        block_origin.z + (f64::from(gv.local.z) + 0.5) * vs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrate_ray_touches_at_least_one_block() {
        let layer = Layer::new(0.1, 8);
        let cfg = Config::default();
        let (voxel_count, blocks) = integrate_ray(
            &layer,
            Position::new(0.0, 0.0, 0.0),
            Position::new(1.0, 0.0, 0.0),
            Some([1, 2, 3]),
            &cfg,
            1.0,
            false,
            1.0,
        );
        assert!(voxel_count > 0);
        assert!(!blocks.is_empty());
    }

    #[test]
    fn surface_ray_stores_negative_distance_behind_the_surface() {
        let layer = Layer::new(0.1, 8);
        let cfg = Config::default();
        let origin = Position::new(0.0, 0.0, 0.0);
        let endpoint = Position::new(1.0, 0.0, 0.0);

        integrate_ray(&layer, origin, endpoint, None, &cfg, 1.0, false, 1.0);

        // A point just behind the measured surface, inside the truncation
        // band, must have been visited and observed with a negative
        // distance (behind-surface per the sensor's view direction).
        let behind = tsdfmap_core::voxel_containing(
            Position::new(1.1, 0.0, 0.0),
            layer.voxel_size(),
            layer.voxels_per_side(),
        );
        let voxel = layer
            .with_block(behind.block, |b| *b.voxel(behind.local))
            .expect("behind-surface voxel should have been allocated");
        assert!(voxel.weight > 0.0);
        assert!(voxel.distance < 0.0, "expected negative distance, got {}", voxel.distance);
    }

    #[test]
    fn integrate_then_deintegrate_clears_the_ray() {
        let layer = Layer::new(0.1, 8);
        let cfg = Config::default();
        let origin = Position::new(0.0, 0.0, 0.0);
        let endpoint = Position::new(1.0, 0.0, 0.0);

        integrate_ray(&layer, origin, endpoint, Some([1, 2, 3]), &cfg, 1.0, false, 1.0);
        integrate_ray(&layer, origin, endpoint, Some([1, 2, 3]), &cfg, -1.0, false, 1.0);

        for idx in layer.iterate_all() {
            let fully_gone = layer
                .with_block(idx, |b| b.is_fully_deintegrated(tsdfmap_core::WEIGHT_EPSILON))
                .unwrap_or(true);
            assert!(fully_gone);
        }
    }
}
