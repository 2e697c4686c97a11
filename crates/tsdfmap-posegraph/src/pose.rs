//! The 4-DoF gravity-aligned pose every submap node carries: translation is
//! free in all three axes, but rotation is constrained to a single yaw
//! about the gravity-aligned up axis (roll and pitch are assumed to be
//! resolved by an external gravity-alignment collaborator before a submap
//! ever reaches the pose graph).

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose4Dof {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
}

impl Pose4Dof {
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw: 0.0,
        }
    }

    #[must_use]
    pub fn to_isometry(self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(self.x, self.y, self.z),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.yaw),
        )
    }

    /// Project a full 6-DoF transform down to its 4-DoF gravity-aligned
    /// counterpart, discarding roll/pitch and keeping only yaw.
    #[must_use]
    pub fn from_isometry(pose: Isometry3<f64>) -> Self {
        let t = pose.translation.vector;
        let (_, _, yaw) = pose.rotation.euler_angles();
        Self {
            x: t.x,
            y: t.y,
            z: t.z,
            yaw,
        }
    }

    #[must_use]
    pub fn compose(self, other: Self) -> Self {
        Self::from_isometry(self.to_isometry() * other.to_isometry())
    }

    #[must_use]
    pub fn inverse(self) -> Self {
        Self::from_isometry(self.to_isometry().inverse())
    }

    /// Relative pose of `self` as seen from `other`, i.e. `other^-1 * self`.
    #[must_use]
    pub fn relative_to(self, other: Self) -> Self {
        Self::from_isometry(other.to_isometry().inverse() * self.to_isometry())
    }

    #[must_use]
    pub fn as_vector(self) -> nalgebra::Vector4<f64> {
        nalgebra::Vector4::new(self.x, self.y, self.z, self.yaw)
    }

    #[must_use]
    pub fn from_vector(v: nalgebra::Vector4<f64>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            yaw: v.w,
        }
    }
}

impl Default for Pose4Dof {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_isometry_preserves_yaw_only_pose() {
        let pose = Pose4Dof {
            x: 1.0,
            y: -2.0,
            z: 0.5,
            yaw: 0.7,
        };
        let back = Pose4Dof::from_isometry(pose.to_isometry());
        assert!((back.x - pose.x).abs() < 1e-9);
        assert!((back.y - pose.y).abs() < 1e-9);
        assert!((back.z - pose.z).abs() < 1e-9);
        assert!((back.yaw - pose.yaw).abs() < 1e-9);
    }

    #[test]
    fn relative_to_self_is_identity() {
        let pose = Pose4Dof {
            x: 3.0,
            y: 1.0,
            z: 0.0,
            yaw: 1.2,
        };
        let rel = pose.relative_to(pose);
        assert!(rel.x.abs() < 1e-9);
        assert!(rel.y.abs() < 1e-9);
        assert!(rel.z.abs() < 1e-9);
        assert!(rel.yaw.abs() < 1e-9);
    }

    #[test]
    fn compose_then_relative_to_recovers_the_second_pose() {
        let a = Pose4Dof { x: 1.0, y: 0.0, z: 0.0, yaw: 0.3 };
        let b = Pose4Dof { x: 0.5, y: 0.2, z: 0.0, yaw: -0.1 };
        let composed = a.compose(b);
        let recovered = composed.relative_to(a);
        assert!((recovered.x - b.x).abs() < 1e-9);
        assert!((recovered.yaw - b.yaw).abs() < 1e-9);
    }
}
