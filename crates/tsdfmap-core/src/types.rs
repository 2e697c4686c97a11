//! Canonical core types shared across the tsdfmap workspace.
//!
//! These live in `tsdfmap-core` and are re-exported at the crate root so
//! other crates can import via `tsdfmap_core::Voxel`, `tsdfmap_core::Block`,
//! etc.

use nalgebra::{Isometry3, Point3};
use serde::{Deserialize, Serialize};

/// A rigid-body transform, e.g. `T_G_C` (sensor pose in world/global frame).
pub type Transform = Isometry3<f64>;

/// A world-frame position.
pub type Position = Point3<f64>;

/// Integer index of a block in the sparse grid: `floor(position / block_size)`
/// per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockIndex {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockIndex {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block index containing `position`, given the layer's `block_size`.
    #[inline]
    #[must_use]
    pub fn from_position(position: Position, block_size: f64) -> Self {
        Self {
            x: (position.x / block_size).floor() as i32,
            y: (position.y / block_size).floor() as i32,
            z: (position.z / block_size).floor() as i32,
        }
    }

    /// World-frame origin (minimum corner) of this block.
    #[inline]
    #[must_use]
    pub fn origin(&self, block_size: f64) -> Position {
        Position::new(
            f64::from(self.x) * block_size,
            f64::from(self.y) * block_size,
            f64::from(self.z) * block_size,
        )
    }

    /// World-frame center of this block.
    #[inline]
    #[must_use]
    pub fn center(&self, block_size: f64) -> Position {
        let o = self.origin(block_size);
        let h = block_size * 0.5;
        Position::new(o.x + h, o.y + h, o.z + h)
    }
}

/// Local voxel coordinate within a block, each in `[0, voxels_per_side)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalVoxel {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl LocalVoxel {
    #[inline]
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Row-major linear index within a block of `side^3` voxels.
    #[inline]
    #[must_use]
    pub fn linear_index(&self, side: u32) -> usize {
        (self.z as usize * side as usize + self.y as usize) * side as usize + self.x as usize
    }

    /// Recover `(x, y, z)` from a row-major linear index.
    #[inline]
    #[must_use]
    pub fn from_linear_index(linear: usize, side: u32) -> Self {
        let side = side as usize;
        let x = linear % side;
        let y = (linear / side) % side;
        let z = linear / (side * side);
        Self {
            x: x as u32,
            y: y as u32,
            z: z as u32,
        }
    }
}

/// Per-voxel record. `weight == 0.0` means *unobserved*.
///
/// `color` always carries three channels (bit-exact with the wire format);
/// it is meaningless until the voxel has been touched by a colored
/// observation, at which point it holds the weighted-average color.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Voxel {
    pub distance: f32,
    pub weight: f32,
    pub color: [u8; 3],
}

impl Default for Voxel {
    #[inline]
    fn default() -> Self {
        Self {
            distance: 0.0,
            weight: 0.0,
            color: [0, 0, 0],
        }
    }
}

impl Voxel {
    #[inline]
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.weight > 0.0
    }
}

/// A tiny bitflags-alike macro used instead of pulling in the `bitflags`
/// crate for a single three-bit set; kept local so `UpdatedFlags`'s API
/// (`contains`/`insert`/`remove`/`empty`) still reads like the familiar
/// `bitflags!`-generated type.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $repr:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name($repr);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            #[inline]
            #[must_use]
            pub const fn empty() -> Self {
                Self(0)
            }

            #[inline]
            #[must_use]
            pub const fn bits(self) -> $repr {
                self.0
            }

            #[inline]
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            #[inline]
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            #[inline]
            #[must_use]
            pub fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }
        }
    };
}

bitflags_like! {
    /// Per-consumer "changed since I last looked" bits. Each consumer
    /// (mesh, map publisher, ESDF) owns exactly one bit and must clear only
    /// its own bit — see `Block::clear_updated`.
    pub struct UpdatedFlags: u8 {
        const MAP = 0b001;
        const MESH = 0b010;
        const ESDF = 0b100;
    }
}

/// A dense cubic array of `side^3` voxels plus block-level metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub has_data: bool,
    pub origin: Position,
    pub updated: UpdatedFlags,
    voxels: Vec<Voxel>,
    side: u32,
}

impl Block {
    /// Allocate a fresh, fully-unobserved block.
    #[must_use]
    pub fn new(origin: Position, voxels_per_side: u32) -> Self {
        let n = (voxels_per_side as usize).pow(3);
        Self {
            has_data: true,
            origin,
            updated: UpdatedFlags::empty(),
            voxels: vec![Voxel::default(); n],
            side: voxels_per_side,
        }
    }

    #[inline]
    #[must_use]
    pub fn voxels_per_side(&self) -> u32 {
        self.side
    }

    #[inline]
    #[must_use]
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    #[inline]
    #[must_use]
    pub fn voxel(&self, local: LocalVoxel) -> &Voxel {
        &self.voxels[local.linear_index(self.side)]
    }

    #[inline]
    pub fn voxel_mut(&mut self, local: LocalVoxel) -> &mut Voxel {
        &mut self.voxels[local.linear_index(self.side)]
    }

    #[inline]
    #[must_use]
    pub fn voxel_by_linear_index(&self, linear: usize) -> &Voxel {
        &self.voxels[linear]
    }

    #[inline]
    pub fn voxel_by_linear_index_mut(&mut self, linear: usize) -> &mut Voxel {
        &mut self.voxels[linear]
    }

    /// `true` once every voxel has decayed back to (near-)zero weight, i.e.
    /// the block carries no residual observation and is a pruning candidate.
    #[must_use]
    pub fn is_fully_deintegrated(&self, epsilon: f32) -> bool {
        self.voxels.iter().all(|v| v.weight <= epsilon)
    }

    /// Mark the block as touched by `flag`. Integrators call this.
    #[inline]
    pub fn mark_updated(&mut self, flag: UpdatedFlags) {
        self.updated.insert(flag);
    }

    /// Consumers clear only the flag(s) they own, never the whole bitset.
    #[inline]
    pub fn clear_updated(&mut self, flag: UpdatedFlags) {
        self.updated.remove(flag);
    }

    #[inline]
    #[must_use]
    pub fn has_updated(&self, flag: UpdatedFlags) -> bool {
        self.updated.contains(flag)
    }

    /// World-frame center of this block, given its own side/voxel geometry.
    #[must_use]
    pub fn center(&self, voxel_size: f64) -> Position {
        let block_size = voxel_size * f64::from(self.side);
        let h = block_size * 0.5;
        Position::new(self.origin.x + h, self.origin.y + h, self.origin.z + h)
    }
}
