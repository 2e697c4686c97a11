//! Drives a [`MeshExtractor`] off the layer's `MESH` updated-flag bitset,
//! and emits removal records for blocks that have vanished since the
//! last pass (pruned by the submap/pipeline layer for being fully
//! deintegrated).

use std::collections::HashSet;

use tracing::debug;
use tsdfmap_core::{BlockIndex, Layer, UpdatedFlags};

use crate::extractor::{MeshError, MeshExtractor};
use crate::message::{BlockMesh, MeshUpdate};

/// Tracks which blocks this consumer has seen, so it can tell a genuinely
/// new block apart from one that has simply been re-touched, and so it
/// can notice when a previously-seen block disappears entirely.
#[derive(Default)]
pub struct MeshTracker {
    known_blocks: HashSet<BlockIndex>,
}

impl MeshTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract meshes for every block carrying the `MESH` dirty flag,
    /// clear that flag on each (mesh is the only consumer of this bit),
    /// and append a zero-triangle removal record for every previously-seen
    /// block that no longer exists in the layer.
    ///
    /// # Errors
    ///
    /// Propagates the first [`MeshError`] the extractor returns. Callers
    /// that want partial progress on failure should catch per-block
    /// errors inside their own `MeshExtractor` implementation instead.
    pub fn update(
        &mut self,
        layer: &Layer,
        extractor: &dyn MeshExtractor,
    ) -> Result<MeshUpdate, MeshError> {
        let dirty = layer.iterate_updated(UpdatedFlags::MESH);
        let mut blocks = Vec::with_capacity(dirty.len());
        let mut still_present = HashSet::with_capacity(dirty.len());

        for index in &dirty {
            let mesh = extractor.extract_block(*index, layer)?;
            layer.with_block_mut(*index, |b| b.clear_updated(UpdatedFlags::MESH));
            still_present.insert(*index);
            blocks.push(mesh);
        }

        // Anything live in the layer counts as "still present" even if it
        // wasn't dirty this pass.
        for index in layer.iterate_all() {
            still_present.insert(index);
        }

        for vanished in self.known_blocks.difference(&still_present).copied().collect::<Vec<_>>() {
            blocks.push(BlockMesh {
                block: vanished,
                vertices: Vec::new(),
                triangle_indices: Vec::new(),
            });
        }

        debug!(updated = dirty.len(), vanished = self.known_blocks.len().saturating_sub(still_present.len()), "mesh pass complete");
        self.known_blocks = still_present;

        Ok(MeshUpdate {
            blocks,
            trailing_poses: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::NullMeshExtractor;
    use tsdfmap_core::BlockIndex;

    #[test]
    fn dirty_block_is_extracted_and_flag_cleared() {
        let layer = Layer::new(0.1, 4);
        let idx = BlockIndex::new(0, 0, 0);
        layer.with_block_mut(idx, |b| b.mark_updated(UpdatedFlags::MESH));

        let mut tracker = MeshTracker::new();
        let update = tracker.update(&layer, &NullMeshExtractor).unwrap();
        assert_eq!(update.blocks.len(), 1);

        let still_dirty = layer.with_block(idx, |b| b.has_updated(UpdatedFlags::MESH));
        assert_eq!(still_dirty, Some(false));
    }

    #[test]
    fn pruned_block_is_reported_as_a_zero_triangle_removal() {
        let layer = Layer::new(0.1, 4);
        let idx = BlockIndex::new(1, 1, 1);
        layer.with_block_mut(idx, |b| b.mark_updated(UpdatedFlags::MESH));

        let mut tracker = MeshTracker::new();
        tracker.update(&layer, &NullMeshExtractor).unwrap();

        layer.remove(idx);
        let update = tracker.update(&layer, &NullMeshExtractor).unwrap();

        assert_eq!(update.blocks.len(), 1);
        assert!(update.blocks[0].is_removal());
        assert_eq!(update.blocks[0].block, idx);
    }
}
