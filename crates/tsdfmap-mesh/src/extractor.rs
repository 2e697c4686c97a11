//! The mesh-extraction seam. The algorithm body (marching cubes or
//! equivalent) is a well-known, externally-supplied collaborator; this
//! crate only defines the trait boundary, the per-block dirty tracking
//! that drives when it gets called, and the message it hands back.

use thiserror::Error;
use tsdfmap_core::{BlockIndex, Layer};

use crate::message::BlockMesh;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("block {0:?} vanished mid-extraction")]
    BlockVanished(BlockIndex),
    #[error("extraction backend failure: {0}")]
    BackendFailure(String),
}

/// A pluggable mesh-extraction algorithm operating on one block at a time.
///
/// Implementations are expected to be deterministic for a fixed block
/// state, and are always invoked with the full, current block data in
/// hand — they never need to reach back into the `Layer` themselves.
pub trait MeshExtractor: Send + Sync {
    /// Extract a triangle mesh for the given block.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::BackendFailure`] if the extraction algorithm
    /// itself fails (implementation-defined: e.g. degenerate voxel data).
    fn extract_block(&self, index: BlockIndex, layer: &Layer) -> Result<BlockMesh, MeshError>;
}

/// A trivial extractor used in tests and as a default before a real
/// marching-cubes backend is wired in: emits an empty mesh for every
/// block, i.e. "every block is present but has no triangles yet".
#[derive(Default)]
pub struct NullMeshExtractor;

impl MeshExtractor for NullMeshExtractor {
    fn extract_block(&self, index: BlockIndex, _layer: &Layer) -> Result<BlockMesh, MeshError> {
        Ok(BlockMesh {
            block: index,
            vertices: Vec::new(),
            triangle_indices: Vec::new(),
        })
    }
}
