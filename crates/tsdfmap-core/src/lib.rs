//! Core data types, the sparse block store, the voxel update rule, the ray
//! caster, configuration, errors, and the wire format shared by every
//! `tsdfmap-*` crate.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod block_store;
pub mod config;
pub mod error;
pub mod interp;
pub mod raycast;
pub mod types;
pub mod voxel;
pub mod wire;

pub use block_store::Layer;
pub use config::{Config, IntegratorMethod};
pub use error::{ConfigError, MapError, MapResult};
pub use interp::interpolate_distance;
pub use raycast::{cast_ray, voxel_containing, GlobalVoxel, RayCastConfig};
pub use types::{Block, BlockIndex, LocalVoxel, Position, Transform, UpdatedFlags, Voxel};
pub use voxel::{apply_update, deintegrate, WeightingPolicy, WEIGHT_EPSILON};
pub use wire::{apply_message, read_message, write_blocks, MergeAction, WireMessage};
