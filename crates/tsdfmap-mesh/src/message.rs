//! The mesh update message handed to consumers (a remote viewer, a saved
//! mesh file) and the config governing how much pose history rides along
//! with it.

use serde::{Deserialize, Serialize};
use tsdfmap_core::{BlockIndex, Position, Transform};

/// One block's extracted triangle mesh, in the block's local voxel
/// coordinates (vertex positions are already in the world frame).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockMesh {
    pub block: BlockIndex,
    pub vertices: Vec<Position>,
    /// Flat triple-indexed triangle list into `vertices`.
    pub triangle_indices: Vec<u32>,
}

impl BlockMesh {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangle_indices.len() / 3
    }

    /// `true` for a block that has been pruned from the layer: still
    /// named so consumers can retire it, but carrying zero triangles.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.triangle_indices.is_empty() && self.vertices.is_empty()
    }
}

/// Controls how many trailing pose-history samples accompany a
/// mesh-with-history message, and the minimum contiguous run length
/// accepted before history is attached at all.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MeshHistoryConfig {
    pub max_gap: u32,
    pub min_n: u32,
}

impl Default for MeshHistoryConfig {
    fn default() -> Self {
        Self {
            max_gap: 0,
            min_n: 1,
        }
    }
}

/// A batch of mesh updates, one entry per dirty or pruned block, plus an
/// optional trailing run of recent poses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshUpdate {
    pub blocks: Vec<BlockMesh>,
    pub trailing_poses: Vec<(f64, Transform)>,
}

/// Given the full pose history and a [`MeshHistoryConfig`], select the
/// trailing run to attach to a mesh update: at most `max_gap` of the most
/// recent samples (0 means unbounded), as long as the available history
/// has at least `min_n` entries; otherwise no history is attached at all.
#[must_use]
pub fn select_trailing_poses(
    pose_history: &[(f64, Transform)],
    config: MeshHistoryConfig,
) -> Vec<(f64, Transform)> {
    if pose_history.len() < config.min_n as usize {
        return Vec::new();
    }
    let take = if config.max_gap == 0 {
        pose_history.len()
    } else {
        pose_history.len().min(config.max_gap as usize)
    };
    pose_history[pose_history.len() - take..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_mesh_with_no_geometry_is_a_removal() {
        let mesh = BlockMesh {
            block: BlockIndex::new(0, 0, 0),
            vertices: Vec::new(),
            triangle_indices: Vec::new(),
        };
        assert!(mesh.is_removal());
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn triangle_count_divides_index_list_by_three() {
        let mesh = BlockMesh {
            block: BlockIndex::new(0, 0, 0),
            vertices: vec![Position::origin(); 6],
            triangle_indices: vec![0, 1, 2, 3, 4, 5],
        };
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn short_history_below_min_n_is_dropped() {
        let history = vec![(0.0, Transform::identity())];
        let config = MeshHistoryConfig { max_gap: 0, min_n: 3 };
        assert!(select_trailing_poses(&history, config).is_empty());
    }

    #[test]
    fn max_gap_bounds_the_trailing_window() {
        let history: Vec<_> = (0..10).map(|i| (f64::from(i), Transform::identity())).collect();
        let config = MeshHistoryConfig { max_gap: 3, min_n: 1 };
        let trailing = select_trailing_poses(&history, config);
        assert_eq!(trailing.len(), 3);
        assert_eq!(trailing.first().unwrap().0, 7.0);
        assert_eq!(trailing.last().unwrap().0, 9.0);
    }

    #[test]
    fn zero_max_gap_means_unbounded() {
        let history: Vec<_> = (0..5).map(|i| (f64::from(i), Transform::identity())).collect();
        let config = MeshHistoryConfig { max_gap: 0, min_n: 1 };
        assert_eq!(select_trailing_poses(&history, config).len(), 5);
    }
}
