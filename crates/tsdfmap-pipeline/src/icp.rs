//! The ICP refinement hook and the accumulated-correction bookkeeping
//! around it. The scan-matching algorithm itself is an external
//! collaborator (out of scope here); this crate defines the trait
//! boundary `Pipeline::process` calls through and the policy knobs
//! (`enable_icp`, `accumulate_icp_corrections`) that govern how its
//! output is folded back into subsequent poses.

use nalgebra::{UnitQuaternion, Vector3};
use tsdfmap_core::{Layer, Position, Transform};

/// One ICP refinement call: given the current map and an initial pose
/// estimate, returns a refined pose plus the number of successful
/// iterative-update steps it took (for logging).
pub trait IcpHook: Send + Sync {
    fn refine(&self, layer: &Layer, points: &[Position], t_initial: Transform) -> (Transform, usize);
}

/// A no-op hook: returns the initial pose unchanged. Used when
/// `enable_icp` is `false`, and as the default in tests.
#[derive(Default)]
pub struct IdentityIcp;

impl IcpHook for IdentityIcp {
    fn refine(&self, _layer: &Layer, _points: &[Position], t_initial: Transform) -> (Transform, usize) {
        (t_initial, 0)
    }
}

/// The running ICP correction, composed onto each frame's initial pose
/// estimate when `accumulate_icp_corrections` is enabled. Reset to the
/// identity whenever that option is disabled or the caller asks to start
/// fresh (e.g. on submap rotation).
#[derive(Clone, Copy, Debug)]
pub struct IcpCorrection {
    correction: Transform,
}

impl Default for IcpCorrection {
    fn default() -> Self {
        Self {
            correction: Transform::identity(),
        }
    }
}

impl IcpCorrection {
    pub fn reset(&mut self) {
        self.correction = Transform::identity();
    }

    /// Apply the accumulated correction to a freshly looked-up pose.
    #[must_use]
    pub fn apply(&self, t_initial: Transform) -> Transform {
        self.correction * t_initial
    }

    /// Fold a new refinement outcome into the running correction:
    /// `correction = T_refined * T_initial^-1`.
    pub fn update(&mut self, t_initial: Transform, t_refined: Transform) {
        self.correction = t_refined * t_initial.inverse();
    }

    /// Zero the roll and pitch components of the accumulated correction's
    /// rotation, keeping only yaw, then re-normalize. Used when the
    /// deployment trusts ICP for yaw but not for roll/pitch (e.g. a
    /// ground vehicle where gravity alignment is already known-good).
    pub fn reproject_yaw_only(&mut self) {
        let rotation_vec = self.correction.rotation.scaled_axis();
        let yaw_only = Vector3::new(0.0, 0.0, rotation_vec.z);
        let rotation = UnitQuaternion::from_scaled_axis(yaw_only);
        self.correction = Transform::from_parts(self.correction.translation, rotation);
    }
}
