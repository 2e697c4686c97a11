//! 3D DDA (Amanatides & Woo) ray casting over the voxel grid.

use crate::types::{BlockIndex, LocalVoxel, Position};

/// A single global voxel address: which block, and which voxel within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobalVoxel {
    pub block: BlockIndex,
    pub local: LocalVoxel,
}

/// Parameters governing how far along a ray voxels are visited.
#[derive(Clone, Copy, Debug)]
pub struct RayCastConfig {
    /// Truncation distance; voxels are visited from `range - truncation` to
    /// `range` (or to `range + truncation` when `allow_carving_behind` is
    /// set — not exposed here, callers clamp `max_range` instead).
    pub truncation: f64,
    /// If true, traversal starts at the sensor origin rather than at
    /// `range - truncation`, visiting every voxel along the full ray
    /// (used for freespace-carving ray casts).
    pub start_from_origin: bool,
    pub min_range: f64,
    pub max_range: f64,
}

/// Trace the voxel grid from `origin` to `endpoint`, yielding each
/// `GlobalVoxel` the ray passes through, ordered from near to far and never
/// repeating an index.
///
/// Implements the Amanatides & Woo fast voxel traversal algorithm, advanced
/// to the truncation-band start offset unless `start_from_origin` is set.
/// Returns an empty vector if the observed range falls outside
/// `[min_range, max_range]`.
#[must_use]
pub fn cast_ray(
    origin: Position,
    endpoint: Position,
    voxel_size: f64,
    voxels_per_side: u32,
    config: RayCastConfig,
) -> Vec<GlobalVoxel> {
    let direction = endpoint - origin;
    let range = direction.norm();

    if range < config.min_range || range > config.max_range || range <= f64::EPSILON {
        return Vec::new();
    }

    let unit = direction / range;

    let start_distance = if config.start_from_origin {
        0.0
    } else {
        (range - config.truncation).max(0.0)
    };
    // For a surface cast (not `start_from_origin`/freespace), extend the
    // visited segment `truncation` past the measured endpoint so the
    // behind-surface truncation band (negative-distance voxels) is
    // visited too, per the ray caster's "o to p + tau*u" contract.
    // Freespace carving has no surface to extend past, so it stops at the
    // observed range.
    let end_distance = if config.start_from_origin {
        range
    } else {
        (range + config.truncation).min(config.max_range)
    };

    let start = origin + unit * start_distance;

    let mut voxels = Vec::new();

    // Current voxel, in global (continuous-index) coordinates.
    let global_of = |p: Position| -> (i64, i64, i64) {
        (
            (p.x / voxel_size).floor() as i64,
            (p.y / voxel_size).floor() as i64,
            (p.z / voxel_size).floor() as i64,
        )
    };

    let (mut gx, mut gy, mut gz) = global_of(start);
    let (gex, gey, gez) = global_of(origin + unit * end_distance);

    let step = |d: f64| -> i64 {
        if d > 0.0 {
            1
        } else if d < 0.0 {
            -1
        } else {
            0
        }
    };
    let step_x = step(unit.x);
    let step_y = step(unit.y);
    let step_z = step(unit.z);

    let voxel_boundary = |g: i64, s: i64, vs: f64| -> f64 {
        if s > 0 {
            (g as f64 + 1.0) * vs
        } else {
            g as f64 * vs
        }
    };

    let t_max_axis = |pos: f64, g: i64, s: i64, dir: f64, vs: f64| -> f64 {
        if s == 0 {
            f64::INFINITY
        } else {
            (voxel_boundary(g, s, vs) - pos) / dir
        }
    };
    let t_delta_axis = |s: i64, dir: f64, vs: f64| -> f64 {
        if s == 0 {
            f64::INFINITY
        } else {
            vs / dir.abs()
        }
    };

    let mut t_max_x = t_max_axis(start.x, gx, step_x, unit.x, voxel_size);
    let mut t_max_y = t_max_axis(start.y, gy, step_y, unit.y, voxel_size);
    let mut t_max_z = t_max_axis(start.z, gz, step_z, unit.z, voxel_size);
    let t_delta_x = t_delta_axis(step_x, unit.x, voxel_size);
    let t_delta_y = t_delta_axis(step_y, unit.y, voxel_size);
    let t_delta_z = t_delta_axis(step_z, unit.z, voxel_size);

    let max_steps = ((end_distance - start_distance) / voxel_size).ceil() as usize + 2;

    for _ in 0..max_steps.max(1) {
        voxels.push(global_voxel_at(gx, gy, gz, voxels_per_side));

        if gx == gex && gy == gey && gz == gez {
            break;
        }

        if t_max_x < t_max_y {
            if t_max_x < t_max_z {
                gx += step_x;
                t_max_x += t_delta_x;
            } else {
                gz += step_z;
                t_max_z += t_delta_z;
            }
        } else if t_max_y < t_max_z {
            gy += step_y;
            t_max_y += t_delta_y;
        } else {
            gz += step_z;
            t_max_z += t_delta_z;
        }
    }

    voxels
}

/// The `GlobalVoxel` containing `position`, independent of any ray cast.
/// Used by callers that need to bucket points by the voxel they fall in
/// (e.g. the merged integrator's per-endpoint-voxel binning) without
/// tracing a full ray.
#[must_use]
pub fn voxel_containing(position: Position, voxel_size: f64, voxels_per_side: u32) -> GlobalVoxel {
    let gx = (position.x / voxel_size).floor() as i64;
    let gy = (position.y / voxel_size).floor() as i64;
    let gz = (position.z / voxel_size).floor() as i64;
    global_voxel_at(gx, gy, gz, voxels_per_side)
}

fn global_voxel_at(gx: i64, gy: i64, gz: i64, voxels_per_side: u32) -> GlobalVoxel {
    let side = i64::from(voxels_per_side);
    let rem_euclid = |g: i64| -> (i64, u32) {
        let block = g.div_euclid(side);
        let local = g.rem_euclid(side) as u32;
        (block, local)
    };
    let (bx, lx) = rem_euclid(gx);
    let (by, ly) = rem_euclid(gy);
    let (bz, lz) = rem_euclid(gz);
    GlobalVoxel {
        block: BlockIndex::new(bx as i32, by as i32, bz as i32),
        local: LocalVoxel::new(lx, ly, lz),
    }
}
