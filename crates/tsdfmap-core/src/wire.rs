//! Bit-exact binary serialization for [`Layer`] updates, as exchanged
//! between integrators and remote map consumers (mesh workers, map
//! publishers, saved-map files).
//!
//! Layout (all multi-byte fields little-endian):
//!
//! ```text
//! header:  voxel_size: f64, voxels_per_side: u32, action: u8
//! repeat:  block_index: i32 x3, origin: f32 x3, voxel_count: u32
//!          repeat voxel_count times:
//!              distance: f32, weight: f32, color: u8 x3, padding: u8
//! ```

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::block_store::Layer;
use crate::types::{Block, BlockIndex, Position, Voxel};

/// How a received block record should be applied against the local layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeAction {
    /// Replace the block wholesale with the transmitted voxels.
    Update,
    /// Merge the transmitted voxels into any existing block via the normal
    /// weighted-average update rule (treating the transmitted voxel as a
    /// single observation with its own distance/weight).
    Merge,
    /// Drop the local layer entirely before applying the transmitted
    /// blocks (used the first time a new subscriber attaches).
    Reset,
}

impl MergeAction {
    fn to_u8(self) -> u8 {
        match self {
            Self::Update => 0,
            Self::Merge => 1,
            Self::Reset => 2,
        }
    }

    fn from_u8(b: u8) -> io::Result<Self> {
        match b {
            0 => Ok(Self::Update),
            1 => Ok(Self::Merge),
            2 => Ok(Self::Reset),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown merge action tag {other}"),
            )),
        }
    }
}

/// Write `blocks` (taken from `layer`) to `w` as a wire message with the
/// given `action`.
pub fn write_blocks<W: Write>(
    w: &mut W,
    layer: &Layer,
    blocks: &[BlockIndex],
    action: MergeAction,
) -> io::Result<()> {
    w.write_f64::<LittleEndian>(layer.voxel_size())?;
    w.write_u32::<LittleEndian>(layer.voxels_per_side())?;
    w.write_u8(action.to_u8())?;

    for &index in blocks {
        let Some(block) = layer.get(index) else {
            continue;
        };
        write_block(w, index, &block)?;
    }
    Ok(())
}

fn write_block<W: Write>(w: &mut W, index: BlockIndex, block: &Block) -> io::Result<()> {
    w.write_i32::<LittleEndian>(index.x)?;
    w.write_i32::<LittleEndian>(index.y)?;
    w.write_i32::<LittleEndian>(index.z)?;
    w.write_f32::<LittleEndian>(block.origin.x as f32)?;
    w.write_f32::<LittleEndian>(block.origin.y as f32)?;
    w.write_f32::<LittleEndian>(block.origin.z as f32)?;
    w.write_u32::<LittleEndian>(block.voxels().len() as u32)?;
    for voxel in block.voxels() {
        w.write_f32::<LittleEndian>(voxel.distance)?;
        w.write_f32::<LittleEndian>(voxel.weight)?;
        w.write_u8(voxel.color[0])?;
        w.write_u8(voxel.color[1])?;
        w.write_u8(voxel.color[2])?;
        w.write_u8(0)?; // padding, kept for alignment with the wire layout
    }
    Ok(())
}

/// Parsed wire message, ready to apply against a local `Layer`.
pub struct WireMessage {
    pub voxel_size: f64,
    pub voxels_per_side: u32,
    pub action: MergeAction,
    pub blocks: Vec<(BlockIndex, Block)>,
}

/// Read a wire message from `r`.
pub fn read_message<R: Read>(r: &mut R) -> io::Result<WireMessage> {
    let voxel_size = r.read_f64::<LittleEndian>()?;
    let voxels_per_side = r.read_u32::<LittleEndian>()?;
    let action = MergeAction::from_u8(r.read_u8()?)?;

    let mut blocks = Vec::new();
    loop {
        let mut x_buf = [0u8; 4];
        match r.read(&mut x_buf) {
            Ok(0) => break,
            Ok(n) if n < 4 => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated block index",
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(e),
        }
        let x = i32::from_le_bytes(x_buf);
        let y = r.read_i32::<LittleEndian>()?;
        let z = r.read_i32::<LittleEndian>()?;
        let origin = Position::new(
            f64::from(r.read_f32::<LittleEndian>()?),
            f64::from(r.read_f32::<LittleEndian>()?),
            f64::from(r.read_f32::<LittleEndian>()?),
        );
        let voxel_count = r.read_u32::<LittleEndian>()? as usize;
        let mut block = Block::new(origin, voxels_per_side);
        for i in 0..voxel_count {
            let distance = r.read_f32::<LittleEndian>()?;
            let weight = r.read_f32::<LittleEndian>()?;
            let mut color = [0u8; 3];
            r.read_exact(&mut color)?;
            let _padding = r.read_u8()?;
            *block.voxel_by_linear_index_mut(i) = Voxel {
                distance,
                weight,
                color,
            };
        }
        blocks.push((BlockIndex::new(x, y, z), block));
    }

    Ok(WireMessage {
        voxel_size,
        voxels_per_side,
        action,
        blocks,
    })
}

/// Apply a parsed `WireMessage` against `layer` according to its action.
pub fn apply_message(layer: &Layer, message: WireMessage) {
    if message.action == MergeAction::Reset {
        layer.clear();
    }

    for (index, incoming) in message.blocks {
        match message.action {
            MergeAction::Update | MergeAction::Reset => {
                layer.with_block_mut(index, |block| {
                    *block = incoming.clone();
                });
            }
            MergeAction::Merge => {
                layer.with_block_mut(index, |block| {
                    for i in 0..incoming.voxels().len().min(block.voxels().len()) {
                        let obs = incoming.voxel_by_linear_index(i);
                        if !obs.is_observed() {
                            continue;
                        }
                        crate::voxel::apply_update(
                            block.voxel_by_linear_index_mut(i),
                            obs.distance,
                            obs.weight,
                            Some(obs.color),
                            f32::MAX,
                            f32::MAX,
                        );
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips_a_block() {
        let layer = Layer::new(0.1, 4);
        let idx = BlockIndex::new(2, -1, 0);
        layer.with_block_mut(idx, |b| {
            crate::voxel::apply_update(
                b.voxel_by_linear_index_mut(0),
                0.05,
                1.0,
                Some([10, 20, 30]),
                1e4,
                0.2,
            );
        });

        let mut buf = Vec::new();
        write_blocks(&mut buf, &layer, &[idx], MergeAction::Update).unwrap();

        let mut cursor = io::Cursor::new(buf);
        let msg = read_message(&mut cursor).unwrap();
        assert_eq!(msg.action, MergeAction::Update);
        assert_eq!(msg.blocks.len(), 1);
        let (read_idx, read_block) = &msg.blocks[0];
        assert_eq!(*read_idx, idx);
        assert_eq!(read_block.voxel_by_linear_index(0).color, [10, 20, 30]);
    }

    #[test]
    fn apply_message_reset_clears_layer_first() {
        let layer = Layer::new(0.1, 4);
        layer.allocate_or_get(BlockIndex::new(5, 5, 5));
        let msg = WireMessage {
            voxel_size: 0.1,
            voxels_per_side: 4,
            action: MergeAction::Reset,
            blocks: vec![],
        };
        apply_message(&layer, msg);
        assert_eq!(layer.block_count(), 0);
    }

    #[test]
    fn apply_message_merge_accumulates_weight() {
        let layer = Layer::new(0.1, 4);
        let idx = BlockIndex::new(0, 0, 0);
        layer.allocate_or_get(idx);

        let mut incoming = Block::new(Position::origin(), 4);
        *incoming.voxel_by_linear_index_mut(0) = Voxel {
            distance: 0.1,
            weight: 1.0,
            color: [1, 2, 3],
        };
        let msg = WireMessage {
            voxel_size: 0.1,
            voxels_per_side: 4,
            action: MergeAction::Merge,
            blocks: vec![(idx, incoming)],
        };
        apply_message(&layer, msg);

        let weight = layer
            .with_block(idx, |b| b.voxel_by_linear_index(0).weight)
            .unwrap();
        assert!((weight - 1.0).abs() < 1e-6);
    }
}
