//! Trilinear interpolation of the TSDF's distance field at arbitrary
//! (non-voxel-aligned) positions, used by the pose graph's registration
//! constraint residuals.

use crate::block_store::Layer;
use crate::types::{BlockIndex, LocalVoxel, Position};

/// Interpolate the signed distance at `position` from the eight voxel
/// centers surrounding it. Unobserved neighbors are excluded from the
/// weighted sum rather than treated as zero, so a registration residual
/// never gets pulled toward a surface that was never actually observed.
/// Returns `None` if every neighbor is unobserved.
#[must_use]
pub fn interpolate_distance(layer: &Layer, position: Position) -> Option<f32> {
    let voxel_size = layer.voxel_size();
    let half = voxel_size * 0.5;

    // Continuous grid coordinate, shifted so integer coordinates line up
    // with voxel centers rather than voxel corners.
    let gx = (position.x - half) / voxel_size;
    let gy = (position.y - half) / voxel_size;
    let gz = (position.z - half) / voxel_size;

    let fx = gx.floor();
    let fy = gy.floor();
    let fz = gz.floor();
    let tx = gx - fx;
    let ty = gy - fy;
    let tz = gz - fz;

    let mut total_weight = 0.0f64;
    let mut total_value = 0.0f64;

    for dz in 0..2 {
        for dy in 0..2 {
            for dx in 0..2 {
                let gx_i = fx as i64 + dx;
                let gy_i = fy as i64 + dy;
                let gz_i = fz as i64 + dz;

                let Some(distance) = sample(layer, gx_i, gy_i, gz_i) else {
                    continue;
                };

                let wx = if dx == 0 { 1.0 - tx } else { tx };
                let wy = if dy == 0 { 1.0 - ty } else { ty };
                let wz = if dz == 0 { 1.0 - tz } else { tz };
                let weight = wx * wy * wz;

                total_weight += weight;
                total_value += weight * f64::from(distance);
            }
        }
    }

    if total_weight <= f64::EPSILON {
        None
    } else {
        Some((total_value / total_weight) as f32)
    }
}

fn sample(layer: &Layer, gx: i64, gy: i64, gz: i64) -> Option<f32> {
    let side = i64::from(layer.voxels_per_side());
    let block = BlockIndex::new(
        gx.div_euclid(side) as i32,
        gy.div_euclid(side) as i32,
        gz.div_euclid(side) as i32,
    );
    let local = LocalVoxel::new(
        gx.rem_euclid(side) as u32,
        gy.rem_euclid(side) as u32,
        gz.rem_euclid(side) as u32,
    );
    layer.with_block(block, |b| {
        let voxel = b.voxel(local);
        voxel.is_observed().then_some(voxel.distance)
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::apply_update;

    #[test]
    fn interpolate_returns_none_when_nothing_observed() {
        let layer = Layer::new(0.1, 8);
        assert!(interpolate_distance(&layer, Position::new(0.05, 0.05, 0.05)).is_none());
    }

    #[test]
    fn interpolate_matches_single_observed_neighbor_when_only_one_present() {
        let layer = Layer::new(0.1, 8);
        let idx = BlockIndex::new(0, 0, 0);
        layer.with_block_mut(idx, |b| {
            apply_update(b.voxel_mut(LocalVoxel::new(0, 0, 0)), 0.07, 1.0, None, 1e4, 0.2);
        });
        // Position exactly at that voxel's center.
        let value = interpolate_distance(&layer, Position::new(0.05, 0.05, 0.05));
        assert!(value.is_some());
        assert!((value.unwrap() - 0.07).abs() < 1e-4);
    }
}
