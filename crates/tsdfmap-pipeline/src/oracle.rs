//! The coordinate-frame lookup seam: resolves a sensor frame and
//! timestamp to a rigid transform into the world frame. The transform
//! tree itself is out of scope; this crate only defines the boundary
//! `Pipeline::drain` calls through.

use tsdfmap_core::Transform;

/// Looks up `T_world_sensor` for a given frame at a given timestamp.
///
/// Returning `None` means "not yet available" rather than "never will
/// be": the pipeline leaves the message at the head of its queue and
/// retries on the next call to [`crate::Pipeline::insert`] or
/// [`crate::Pipeline::insert_freespace`].
pub trait TransformOracle: Send + Sync {
    fn lookup(&self, frame_id: &str, timestamp: f64) -> Option<Transform>;
}

/// Resolves every lookup to the identity transform. Useful for tests and
/// for sensors that are rigidly mounted at the body frame's origin.
#[derive(Default)]
pub struct IdentityOracle;

impl TransformOracle for IdentityOracle {
    fn lookup(&self, _frame_id: &str, _timestamp: f64) -> Option<Transform> {
        Some(Transform::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_oracle_always_resolves() {
        let oracle = IdentityOracle;
        assert_eq!(oracle.lookup("camera", 12.0), Some(Transform::identity()));
    }
}
