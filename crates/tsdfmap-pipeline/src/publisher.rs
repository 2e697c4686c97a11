//! Output message builders for the handful of debug/visualization
//! pointclouds the original server exposes, and the `LayerPublisher`
//! state machine that decides whether a remote map consumer needs a full
//! reset or can keep receiving incremental updates.

use tsdfmap_core::{Layer, LocalVoxel, MergeAction, Position, UpdatedFlags};

/// One voxel's contribution to an intensity-colored debug pointcloud:
/// its world position and a scalar value (signed distance, typically).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntensityPoint {
    pub position: Position,
    pub intensity: f32,
}

/// One occupied block rendered as a cube marker: its world-frame center
/// and edge length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OccupancyMarker {
    pub center: Position,
    pub size: f64,
}

fn voxel_center(block_origin: Position, local: LocalVoxel, voxel_size: f64) -> Position {
    Position::new(
        block_origin.x + (f64::from(local.x) + 0.5) * voxel_size,
        block_origin.y + (f64::from(local.y) + 0.5) * voxel_size,
        block_origin.z + (f64::from(local.z) + 0.5) * voxel_size,
    )
}

/// Every currently-observed voxel in blocks the map consumer hasn't yet
/// seen (carrying the `MAP` dirty flag): world position plus signed
/// distance as intensity. Does not clear the flag — the caller decides
/// when a consumer's view has been fully served.
#[must_use]
pub fn updated_voxel_pointcloud(layer: &Layer) -> Vec<IntensityPoint> {
    let voxel_size = layer.voxel_size();
    let mut out = Vec::new();
    for index in layer.iterate_updated(UpdatedFlags::MAP) {
        let Some(block) = layer.get(index) else {
            continue;
        };
        let side = block.voxels_per_side();
        for linear in 0..block.voxels().len() {
            let voxel = block.voxel_by_linear_index(linear);
            if !voxel.is_observed() {
                continue;
            }
            let local = LocalVoxel::from_linear_index(linear, side);
            out.push(IntensityPoint {
                position: voxel_center(block.origin, local, voxel_size),
                intensity: voxel.distance,
            });
        }
    }
    out
}

/// Voxel centers within half a voxel of the zero crossing, across every
/// allocated block: the same "near-surface" sampling `tsdfmap-submap`
/// uses for registration points, exposed here as a debug isosurface
/// pointcloud independent of the registration-constraint pipeline.
#[must_use]
pub fn isosurface_pointcloud(layer: &Layer) -> Vec<Position> {
    let voxel_size = layer.voxel_size();
    let mut out = Vec::new();
    for index in layer.iterate_all() {
        let Some(block) = layer.get(index) else {
            continue;
        };
        let side = block.voxels_per_side();
        for linear in 0..block.voxels().len() {
            let voxel = block.voxel_by_linear_index(linear);
            if !voxel.is_observed() || voxel.distance.abs() as f64 > voxel_size * 0.5 {
                continue;
            }
            let local = LocalVoxel::from_linear_index(linear, side);
            out.push(voxel_center(block.origin, local, voxel_size));
        }
    }
    out
}

/// One cube marker per currently-allocated block, for a coarse
/// "where has the map seen anything" occupancy visualization.
#[must_use]
pub fn occupancy_block_markers(layer: &Layer) -> Vec<OccupancyMarker> {
    let block_size = layer.block_size();
    layer
        .iterate_all()
        .into_iter()
        .map(|index| OccupancyMarker {
            center: index.center(block_size),
            size: block_size,
        })
        .collect()
}

/// Observed voxel centers whose world-frame Z falls within half a voxel
/// of `slice_z`, with distance as intensity: a 2D horizontal-plane debug
/// view through an otherwise 3D map.
#[must_use]
pub fn slice_pointcloud(layer: &Layer, slice_z: f64) -> Vec<IntensityPoint> {
    let voxel_size = layer.voxel_size();
    let half = voxel_size * 0.5;
    let mut out = Vec::new();
    for index in layer.iterate_all() {
        let Some(block) = layer.get(index) else {
            continue;
        };
        let side = block.voxels_per_side();
        for linear in 0..block.voxels().len() {
            let voxel = block.voxel_by_linear_index(linear);
            if !voxel.is_observed() {
                continue;
            }
            let local = LocalVoxel::from_linear_index(linear, side);
            let center = voxel_center(block.origin, local, voxel_size);
            if (center.z - slice_z).abs() <= half {
                out.push(IntensityPoint {
                    position: center,
                    intensity: voxel.distance,
                });
            }
        }
    }
    out
}

/// Debug pointcloud for a projective integrator's reprojected endpoints.
/// The projective strategy itself is out of scope (only Simple/Merged/
/// Fast are implemented here), so this always returns empty; kept as a
/// named seam so a future projective integrator has somewhere to report
/// through without changing this crate's public surface.
#[must_use]
pub fn reprojected_pointcloud() -> Vec<Position> {
    Vec::new()
}

/// Decides, on each publish pass, whether a remote consumer needs a
/// wholesale [`MergeAction::Reset`] or can keep receiving incremental
/// [`MergeAction::Update`]s. The first publish after a consumer count
/// increases forces a reset, since a newly-attached consumer has no
/// state to apply an incremental update against.
#[derive(Default)]
pub struct LayerPublisher {
    last_subscriber_count: usize,
}

impl LayerPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action_for(&mut self, current_subscribers: usize) -> MergeAction {
        let action = if current_subscribers > self.last_subscriber_count {
            MergeAction::Reset
        } else {
            MergeAction::Update
        };
        self.last_subscriber_count = current_subscribers;
        action
    }
}
