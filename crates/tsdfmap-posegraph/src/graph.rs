//! The top-level pose graph: a [`NodeCollection`] of submap (and reference
//! frame) nodes, a [`ConstraintCollection`] tying them together, and the
//! solver entry point that turns constraints into updated node poses.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use nalgebra::Matrix4;
use tsdfmap_core::{Layer, MapError, Position};

use crate::constraint::{
    validate_information, AbsolutePoseConstraint, Constraint, ConstraintCollection,
    ConstraintType, RegistrationConstraint, RelativePoseConstraint,
};
use crate::node::{NodeCollection, NodeId};
use crate::pose::Pose4Dof;
use crate::solver::{self, SolverSummary};

/// A covariance approximation for one constraint edge, derived from the
/// inverse of its information matrix rather than full Hessian marginal
/// covariance propagation (which would require retaining every other
/// edge's Jacobian contribution; out of scope here).
#[derive(Clone, Copy, Debug)]
pub struct EdgeCovariance {
    pub covariance: Matrix4<f64>,
}

#[derive(Clone, Copy, Debug)]
pub struct VisualizationEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: ConstraintType,
}

#[derive(Default)]
pub struct PoseGraph {
    nodes: NodeCollection,
    constraints: ConstraintCollection,
    solver_summaries: Vec<SolverSummary>,
}

impl PoseGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_submap_node(&mut self, id: NodeId, initial_pose: Pose4Dof) {
        self.nodes.add_submap_node(id, initial_pose);
    }

    #[must_use]
    pub fn has_submap_node(&self, id: NodeId) -> bool {
        self.nodes.has_node(id)
    }

    pub fn add_reference_frame_node(&mut self, id: NodeId, pose: Pose4Dof) {
        self.nodes.add_reference_frame_node(id, pose);
    }

    pub fn set_submap_node_constant(&mut self, id: NodeId, constant: bool) {
        self.nodes.set_constant(id, constant);
    }

    /// # Errors
    ///
    /// Returns [`MapError::ConstraintMalformed`] if `information` is not
    /// symmetric positive definite, or if `node` names no known node.
    pub fn add_absolute_pose_constraint(
        &mut self,
        node: NodeId,
        measured_pose: Pose4Dof,
        information: Matrix4<f64>,
    ) -> Result<(), MapError> {
        if !self.nodes.has_node(node) {
            return Err(MapError::ConstraintMalformed(format!(
                "absolute pose constraint references unknown node {node:?}"
            )));
        }
        validate_information(&information)?;
        self.constraints
            .push(Constraint::Absolute(AbsolutePoseConstraint {
                node,
                measured_pose,
                information,
            }));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`MapError::ConstraintMalformed`] if `information` is not
    /// symmetric positive definite, or if either endpoint names no known
    /// node.
    pub fn add_relative_pose_constraint(
        &mut self,
        from: NodeId,
        to: NodeId,
        measured_relative_pose: Pose4Dof,
        information: Matrix4<f64>,
    ) -> Result<(), MapError> {
        self.require_nodes(from, to)?;
        validate_information(&information)?;
        self.constraints
            .push(Constraint::Relative(RelativePoseConstraint {
                from,
                to,
                measured_relative_pose,
                information,
            }));
        Ok(())
    }

    /// Adds a relative pose constraint whose measurement is derived from
    /// the two nodes' *current* pose estimates, rather than an externally
    /// supplied measurement — used when a caller wants to pin the current
    /// relative arrangement of two submaps in place (e.g. after an
    /// odometry-only double integration that should not be revisited by
    /// later registration).
    ///
    /// # Errors
    ///
    /// Returns [`MapError::ConstraintMalformed`] under the same conditions
    /// as [`Self::add_relative_pose_constraint`].
    pub fn add_submap_relative_pose_constraint(
        &mut self,
        from: NodeId,
        to: NodeId,
        information: Matrix4<f64>,
    ) -> Result<(), MapError> {
        self.require_nodes(from, to)?;
        let from_pose = self.nodes.get(from).expect("checked above").pose;
        let to_pose = self.nodes.get(to).expect("checked above").pose;
        let measured_relative_pose = to_pose.relative_to(from_pose);
        self.add_relative_pose_constraint(from, to, measured_relative_pose, information)
    }

    /// # Errors
    ///
    /// Returns [`MapError::ConstraintMalformed`] if either endpoint names
    /// no known node.
    pub fn add_registration_constraint(
        &mut self,
        from: NodeId,
        to: NodeId,
        points_in_from_frame: Vec<Position>,
        to_layer: Arc<Layer>,
        weight: f64,
    ) -> Result<(), MapError> {
        self.require_nodes(from, to)?;
        self.constraints
            .push(Constraint::Registration(RegistrationConstraint {
                from,
                to,
                points_in_from_frame,
                to_layer,
                weight,
                forced: false,
            }));
        Ok(())
    }

    /// Identical to [`Self::add_registration_constraint`] but marks the
    /// constraint `forced`, recording that the caller pushed it through
    /// despite any overlap gating it performs upstream of this graph (this
    /// graph itself never refuses a registration constraint on overlap
    /// grounds).
    ///
    /// # Errors
    ///
    /// Returns [`MapError::ConstraintMalformed`] if either endpoint names
    /// no known node.
    pub fn add_force_registration_constraint(
        &mut self,
        from: NodeId,
        to: NodeId,
        points_in_from_frame: Vec<Position>,
        to_layer: Arc<Layer>,
        weight: f64,
    ) -> Result<(), MapError> {
        self.require_nodes(from, to)?;
        self.constraints
            .push(Constraint::Registration(RegistrationConstraint {
                from,
                to,
                points_in_from_frame,
                to_layer,
                weight,
                forced: true,
            }));
        Ok(())
    }

    pub fn reset_constraints_of_kind(&mut self, kind: ConstraintType) {
        self.constraints.reset_of_kind(kind);
    }

    pub fn reset_all_constraints(&mut self) {
        self.constraints.reset_all();
    }

    /// Pins every node at its current pose estimate as a constant unless
    /// it already carries free-parameter status; used before a solve that
    /// should only move a named subset of submaps.
    pub fn initialize(&mut self, exclude_registration_constraints: bool) {
        if exclude_registration_constraints {
            self.constraints.reset_of_kind(ConstraintType::Registration);
        }
    }

    /// Runs the Levenberg-Marquardt solver over every non-constant node.
    ///
    /// # Errors
    ///
    /// Propagates [`MapError::SolverNonConvergence`] from the underlying
    /// solver on structural failure (a singular normal-equations system at
    /// every damping level tried).
    pub fn optimize(
        &mut self,
        exclude_registration_constraints: bool,
        parameter_tolerance: f64,
    ) -> Result<SolverSummary, MapError> {
        let summary = solver::optimize(
            &mut self.nodes,
            &self.constraints,
            exclude_registration_constraints,
            parameter_tolerance,
        )?;
        self.solver_summaries.push(summary.clone());
        Ok(summary)
    }

    #[must_use]
    pub fn evaluate_residuals(&self, kind: ConstraintType) -> Vec<f64> {
        let poses: BTreeMap<NodeId, Pose4Dof> =
            self.nodes.iter().map(|n| (n.id, n.pose)).collect();
        self.constraints
            .iter_of_kind(kind)
            .flat_map(|c| solver::residual_values(&poses, c))
            .collect()
    }

    #[must_use]
    pub fn get_submap_pose(&self, id: NodeId) -> Option<Pose4Dof> {
        self.nodes.get(id).map(|n| n.pose)
    }

    #[must_use]
    pub fn get_submap_poses(&self) -> HashMap<NodeId, Pose4Dof> {
        self.nodes.iter().map(|n| (n.id, n.pose)).collect()
    }

    /// A cheap per-edge covariance approximation: the inverse of each
    /// constraint's information matrix, keyed by a synthetic edge id. Full
    /// marginal covariance from the joint Hessian is not computed.
    #[must_use]
    pub fn edge_covariance_map(&self) -> Vec<(VisualizationEdge, EdgeCovariance)> {
        self.constraints
            .iter()
            .filter_map(|c| match c {
                Constraint::Absolute(a) => {
                    let covariance = a.information.try_inverse()?;
                    Some((
                        VisualizationEdge {
                            from: a.node,
                            to: a.node,
                            kind: ConstraintType::AbsolutePose,
                        },
                        EdgeCovariance { covariance },
                    ))
                }
                Constraint::Relative(r) => {
                    let covariance = r.information.try_inverse()?;
                    Some((
                        VisualizationEdge {
                            from: r.from,
                            to: r.to,
                            kind: ConstraintType::RelativePose,
                        },
                        EdgeCovariance { covariance },
                    ))
                }
                Constraint::Registration(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn get_visualization_edges(&self) -> Vec<VisualizationEdge> {
        self.constraints
            .iter()
            .map(|c| match c {
                Constraint::Absolute(a) => VisualizationEdge {
                    from: a.node,
                    to: a.node,
                    kind: ConstraintType::AbsolutePose,
                },
                Constraint::Relative(r) => VisualizationEdge {
                    from: r.from,
                    to: r.to,
                    kind: ConstraintType::RelativePose,
                },
                Constraint::Registration(r) => VisualizationEdge {
                    from: r.from,
                    to: r.to,
                    kind: ConstraintType::Registration,
                },
            })
            .collect()
    }

    #[must_use]
    pub fn get_solver_summaries(&self) -> &[SolverSummary] {
        &self.solver_summaries
    }

    fn require_nodes(&self, from: NodeId, to: NodeId) -> Result<(), MapError> {
        if !self.nodes.has_node(from) || !self.nodes.has_node(to) {
            return Err(MapError::ConstraintMalformed(format!(
                "constraint references unknown node(s) {from:?} -> {to:?}"
            )));
        }
        Ok(())
    }
}
