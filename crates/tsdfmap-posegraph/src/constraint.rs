//! Constraints between nodes: absolute pose priors, relative pose
//! measurements, and TSDF-registration alignments.

use std::sync::Arc;

use nalgebra::Matrix4;
use tsdfmap_core::{Layer, MapError, Position};

use crate::node::NodeId;
use crate::pose::Pose4Dof;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintType {
    AbsolutePose,
    RelativePose,
    Registration,
}

#[derive(Clone)]
pub struct AbsolutePoseConstraint {
    pub node: NodeId,
    pub measured_pose: Pose4Dof,
    pub information: Matrix4<f64>,
}

#[derive(Clone)]
pub struct RelativePoseConstraint {
    pub from: NodeId,
    pub to: NodeId,
    pub measured_relative_pose: Pose4Dof,
    pub information: Matrix4<f64>,
}

/// A TSDF-registration alignment: a set of points sampled from the `from`
/// submap's surface, whose residual under the current relative pose is
/// the `to` submap's interpolated signed distance at each transformed
/// point. Driving these residuals to zero aligns the two submaps' surfaces
/// without needing explicit point correspondences.
#[derive(Clone)]
pub struct RegistrationConstraint {
    pub from: NodeId,
    pub to: NodeId,
    pub points_in_from_frame: Vec<Position>,
    pub to_layer: Arc<Layer>,
    pub weight: f64,
    /// Set by `add_force_registration_constraint`; otherwise constraints
    /// added through the normal path are never forced. Callers that
    /// perform their own overlap gating upstream (the pose graph itself
    /// does no overlap checking) use this to record that a constraint was
    /// pushed through despite failing such a check.
    pub forced: bool,
}

#[derive(Clone)]
pub enum Constraint {
    Absolute(AbsolutePoseConstraint),
    Relative(RelativePoseConstraint),
    Registration(RegistrationConstraint),
}

impl Constraint {
    #[must_use]
    pub fn kind(&self) -> ConstraintType {
        match self {
            Self::Absolute(_) => ConstraintType::AbsolutePose,
            Self::Relative(_) => ConstraintType::RelativePose,
            Self::Registration(_) => ConstraintType::Registration,
        }
    }
}

/// Validate that an information matrix is symmetric and positive
/// semi-definite enough to Cholesky-factor (the whitening the solver
/// applies to every residual).
pub(crate) fn validate_information(information: &Matrix4<f64>) -> Result<(), MapError> {
    if (information - information.transpose()).amax() > 1e-9 {
        return Err(MapError::ConstraintMalformed(
            "information matrix is not symmetric".into(),
        ));
    }
    if nalgebra::Cholesky::new(*information).is_none() {
        return Err(MapError::ConstraintMalformed(
            "information matrix is not positive definite".into(),
        ));
    }
    Ok(())
}

#[derive(Default)]
pub struct ConstraintCollection {
    constraints: Vec<Constraint>,
}

impl ConstraintCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn iter_of_kind(&self, kind: ConstraintType) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.kind() == kind)
    }

    pub fn reset_of_kind(&mut self, kind: ConstraintType) {
        self.constraints.retain(|c| c.kind() != kind);
    }

    pub fn reset_all(&mut self) {
        self.constraints.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
