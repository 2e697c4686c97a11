//! `Layer`: the sparse, striped-lock block store.
//!
//! Blocks are sharded across a fixed number of `RwLock`-guarded maps so that
//! concurrent integrator workers touching different blocks rarely contend
//! with each other, while still giving each individual block a consistent
//! single-writer/many-reader view.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;

use crate::types::{Block, BlockIndex, Position};

/// Number of shards a `Layer` stripes its block map across. Chosen as a
/// power of two well above typical core counts so two workers rarely land
/// on the same stripe even under unlucky hashing.
const DEFAULT_STRIPES: usize = 64;

/// The sparse voxel grid: a collection of `Block`s keyed by `BlockIndex`,
/// striped across `RwLock`-guarded shards for concurrent access.
pub struct Layer {
    voxel_size: f64,
    voxels_per_side: u32,
    stripes: Vec<RwLock<HashMap<BlockIndex, Block>>>,
}

impl Layer {
    #[must_use]
    pub fn new(voxel_size: f64, voxels_per_side: u32) -> Self {
        Self::with_stripe_count(voxel_size, voxels_per_side, DEFAULT_STRIPES)
    }

    #[must_use]
    pub fn with_stripe_count(voxel_size: f64, voxels_per_side: u32, stripe_count: usize) -> Self {
        let stripe_count = stripe_count.max(1);
        let mut stripes = Vec::with_capacity(stripe_count);
        stripes.resize_with(stripe_count, || RwLock::new(HashMap::new()));
        Self {
            voxel_size,
            voxels_per_side,
            stripes,
        }
    }

    #[inline]
    #[must_use]
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    #[inline]
    #[must_use]
    pub fn voxels_per_side(&self) -> u32 {
        self.voxels_per_side
    }

    #[inline]
    #[must_use]
    pub fn block_size(&self) -> f64 {
        self.voxel_size * f64::from(self.voxels_per_side)
    }

    #[inline]
    fn stripe_for(&self, index: BlockIndex) -> &RwLock<HashMap<BlockIndex, Block>> {
        let mut hasher = DefaultHasher::new();
        index.hash(&mut hasher);
        let stripe = (hasher.finish() as usize) % self.stripes.len();
        &self.stripes[stripe]
    }

    /// Run `f` against the block at `index`, creating it first if absent.
    /// The block's stripe is write-locked for the duration of `f`.
    pub fn with_block_mut<R>(&self, index: BlockIndex, f: impl FnOnce(&mut Block) -> R) -> R {
        let mut guard = self.stripe_for(index).write();
        let block = guard
            .entry(index)
            .or_insert_with(|| Block::new(index.origin(self.block_size()), self.voxels_per_side));
        f(block)
    }

    /// Run `f` against the block at `index` if it exists, read-locking its
    /// stripe. Returns `None` if the block has never been allocated.
    pub fn with_block<R>(&self, index: BlockIndex, f: impl FnOnce(&Block) -> R) -> Option<R> {
        let guard = self.stripe_for(index).read();
        guard.get(&index).map(f)
    }

    /// Allocate the block at `index` if absent and return a clone of it.
    #[must_use]
    pub fn allocate_or_get(&self, index: BlockIndex) -> Block {
        self.with_block_mut(index, Clone::clone)
    }

    /// Fetch a clone of the block at `index`, if it exists.
    #[must_use]
    pub fn get(&self, index: BlockIndex) -> Option<Block> {
        self.with_block(index, Clone::clone)
    }

    /// Remove and return the block at `index`, if it existed.
    pub fn remove(&self, index: BlockIndex) -> Option<Block> {
        self.stripe_for(index).write().remove(&index)
    }

    /// Remove every block whose center lies farther than `radius` from
    /// `center`. Returns the indices removed.
    pub fn remove_distant(&self, center: Position, radius: f64) -> Vec<BlockIndex> {
        let radius_sq = radius * radius;
        let mut removed = Vec::new();
        for stripe in &self.stripes {
            let mut guard = stripe.write();
            let doomed: Vec<BlockIndex> = guard
                .iter()
                .filter(|(_, block)| {
                    let c = block.center(self.voxel_size);
                    let dx = c.x - center.x;
                    let dy = c.y - center.y;
                    let dz = c.z - center.z;
                    dx * dx + dy * dy + dz * dz > radius_sq
                })
                .map(|(idx, _)| *idx)
                .collect();
            for idx in doomed {
                guard.remove(&idx);
                removed.push(idx);
            }
        }
        removed
    }

    /// Snapshot of every currently-allocated block index. Taken under each
    /// stripe's read lock in turn, so it is not a single atomic snapshot of
    /// the whole layer, but each stripe's portion is internally consistent.
    #[must_use]
    pub fn iterate_all(&self) -> Vec<BlockIndex> {
        let mut out = Vec::new();
        for stripe in &self.stripes {
            out.extend(stripe.read().keys().copied());
        }
        out
    }

    /// Snapshot of indices for blocks carrying the given `updated` flag.
    #[must_use]
    pub fn iterate_updated(&self, flag: crate::types::UpdatedFlags) -> Vec<BlockIndex> {
        let mut out = Vec::new();
        for stripe in &self.stripes {
            out.extend(
                stripe
                    .read()
                    .iter()
                    .filter(|(_, b)| b.has_updated(flag))
                    .map(|(idx, _)| *idx),
            );
        }
        out
    }

    /// Remove every block from the layer.
    pub fn clear(&self) {
        for stripe in &self.stripes {
            stripe.write().clear();
        }
    }

    /// Total number of currently-allocated blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.stripes.iter().map(|s| s.read().len()).sum()
    }

    /// Approximate resident size in bytes, for diagnostics/logging.
    #[must_use]
    pub fn approx_memory_bytes(&self) -> usize {
        let per_block = std::mem::size_of::<Block>()
            + (self.voxels_per_side as usize).pow(3) * std::mem::size_of::<crate::types::Voxel>();
        self.block_count() * per_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UpdatedFlags;

    #[test]
    fn allocate_or_get_is_idempotent() {
        let layer = Layer::new(0.1, 8);
        let idx = BlockIndex::new(1, 2, 3);
        let b1 = layer.allocate_or_get(idx);
        let b2 = layer.allocate_or_get(idx);
        assert_eq!(b1.origin, b2.origin);
        assert_eq!(layer.block_count(), 1);
    }

    #[test]
    fn with_block_mut_creates_then_with_block_reads() {
        let layer = Layer::new(0.1, 8);
        let idx = BlockIndex::new(0, 0, 0);
        layer.with_block_mut(idx, |b| b.mark_updated(UpdatedFlags::MAP));
        let seen = layer.with_block(idx, |b| b.has_updated(UpdatedFlags::MAP));
        assert_eq!(seen, Some(true));
    }

    #[test]
    fn get_on_absent_block_is_none() {
        let layer = Layer::new(0.1, 8);
        assert!(layer.get(BlockIndex::new(9, 9, 9)).is_none());
    }

    #[test]
    fn remove_distant_prunes_blocks_outside_radius() {
        let layer = Layer::new(1.0, 8);
        layer.allocate_or_get(BlockIndex::new(0, 0, 0));
        layer.allocate_or_get(BlockIndex::new(100, 0, 0));
        let removed = layer.remove_distant(Position::origin(), 10.0);
        assert_eq!(removed, vec![BlockIndex::new(100, 0, 0)]);
        assert_eq!(layer.block_count(), 1);
    }

    #[test]
    fn iterate_updated_only_returns_flagged_blocks() {
        let layer = Layer::new(0.1, 8);
        layer.with_block_mut(BlockIndex::new(0, 0, 0), |b| b.mark_updated(UpdatedFlags::MESH));
        layer.allocate_or_get(BlockIndex::new(1, 0, 0));
        let updated = layer.iterate_updated(UpdatedFlags::MESH);
        assert_eq!(updated, vec![BlockIndex::new(0, 0, 0)]);
    }

    #[test]
    fn clear_removes_all_blocks() {
        let layer = Layer::new(0.1, 8);
        layer.allocate_or_get(BlockIndex::new(0, 0, 0));
        layer.allocate_or_get(BlockIndex::new(1, 1, 1));
        layer.clear();
        assert_eq!(layer.block_count(), 0);
    }
}
