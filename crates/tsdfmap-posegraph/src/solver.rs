//! A small dense Levenberg-Marquardt solver over the 4-DoF submap
//! parameter vector, built directly on `nalgebra`'s dense linear algebra
//! rather than pulling in a full nonlinear solver crate — the graphs here
//! are sized in the tens to low hundreds of submaps, where a dense normal
//! equations solve is simpler and fast enough.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};
use tsdfmap_core::{interpolate_distance, MapError};

use crate::constraint::{Constraint, ConstraintCollection, ConstraintType};
use crate::node::{NodeCollection, NodeId};
use crate::pose::Pose4Dof;

const MAX_ITERATIONS: usize = 50;
const JACOBIAN_EPSILON: f64 = 1e-6;
const INITIAL_LAMBDA: f64 = 1e-3;

#[derive(Clone, Debug)]
pub struct SolverSummary {
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub converged: bool,
}

/// Optimize every non-constant node's pose against the active constraint
/// set, excluding registration constraints if `exclude_registration` is
/// set. Mutates `nodes` in place and returns a summary of the run.
///
/// # Errors
///
/// Returns [`MapError::SolverNonConvergence`] only for a structural
/// failure (a singular normal-equations system at every damping level
/// tried); simply running out of iterations without reaching
/// `parameter_tolerance` is reported as `converged: false` in the summary,
/// not as an error.
pub fn optimize(
    nodes: &mut NodeCollection,
    constraints: &ConstraintCollection,
    exclude_registration: bool,
    parameter_tolerance: f64,
) -> Result<SolverSummary, MapError> {
    let free_ids = nodes.free_ids();
    if free_ids.is_empty() {
        return Ok(SolverSummary {
            iterations: 0,
            initial_cost: 0.0,
            final_cost: 0.0,
            converged: true,
        });
    }

    let mut poses = snapshot(nodes);
    let active: Vec<&Constraint> = constraints
        .iter()
        .filter(|c| !(exclude_registration && c.kind() == ConstraintType::Registration))
        .collect();

    let mut x = pack(&poses, &free_ids);
    let mut r = residuals(&poses, &active);
    let mut cost = 0.5 * r.norm_squared();
    let initial_cost = cost;
    let mut lambda = INITIAL_LAMBDA;
    let mut converged = false;
    let mut last_iteration = 0;

    for iteration in 0..MAX_ITERATIONS {
        last_iteration = iteration;
        let jacobian = numeric_jacobian(&poses, &free_ids, &active);

        let jt = jacobian.transpose();
        let jtj = &jt * &jacobian;
        let jtr = &jt * &r;

        let mut accepted = false;
        for _ in 0..8 {
            let mut damped = jtj.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }

            let Some(dx) = damped.clone().lu().solve(&jtr) else {
                lambda *= 10.0;
                continue;
            };

            if dx.norm() < parameter_tolerance {
                converged = true;
            }

            let candidate_x = &x + &dx;
            let candidate_poses = unpack(&poses, &free_ids, &candidate_x);
            let candidate_r = residuals(&candidate_poses, &active);
            let candidate_cost = 0.5 * candidate_r.norm_squared();

            if candidate_cost.is_finite() && candidate_cost < cost {
                x = candidate_x;
                poses = candidate_poses;
                r = candidate_r;
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-12);
                accepted = true;
                break;
            }
            lambda *= 10.0;
        }

        if !accepted && !converged {
            warn!(iteration, "levenberg-marquardt step rejected at every damping level tried");
        }
        if converged {
            break;
        }
    }

    apply(nodes, &free_ids, &poses);
    debug!(iterations = last_iteration + 1, initial_cost, final_cost = cost, converged, "pose graph optimization complete");

    Ok(SolverSummary {
        iterations: last_iteration + 1,
        initial_cost,
        final_cost: cost,
        converged,
    })
}

fn snapshot(nodes: &NodeCollection) -> std::collections::BTreeMap<NodeId, Pose4Dof> {
    nodes.iter().map(|n| (n.id, n.pose)).collect()
}

fn pack(poses: &std::collections::BTreeMap<NodeId, Pose4Dof>, free_ids: &[NodeId]) -> DVector<f64> {
    let mut v = DVector::zeros(free_ids.len() * 4);
    for (slot, id) in free_ids.iter().enumerate() {
        let p = poses[id].as_vector();
        v.fixed_rows_mut::<4>(slot * 4).copy_from(&p);
    }
    v
}

fn unpack(
    base: &std::collections::BTreeMap<NodeId, Pose4Dof>,
    free_ids: &[NodeId],
    x: &DVector<f64>,
) -> std::collections::BTreeMap<NodeId, Pose4Dof> {
    let mut out = base.clone();
    for (slot, id) in free_ids.iter().enumerate() {
        let v = x.fixed_rows::<4>(slot * 4).into_owned();
        out.insert(*id, Pose4Dof::from_vector(v));
    }
    out
}

fn apply(
    nodes: &mut NodeCollection,
    free_ids: &[NodeId],
    poses: &std::collections::BTreeMap<NodeId, Pose4Dof>,
) {
    for id in free_ids {
        if let Some(node) = nodes.get_mut(*id) {
            node.pose = poses[id];
        }
    }
}

fn residuals(
    poses: &std::collections::BTreeMap<NodeId, Pose4Dof>,
    constraints: &[&Constraint],
) -> DVector<f64> {
    let mut values = Vec::new();
    for constraint in constraints {
        push_residual(poses, constraint, &mut values);
    }
    DVector::from_vec(values)
}

/// The residual contribution of a single constraint, exposed so callers
/// can inspect per-constraint-kind residuals (e.g. for diagnostics)
/// without running a solve.
#[must_use]
pub fn residual_values(
    poses: &std::collections::BTreeMap<NodeId, Pose4Dof>,
    constraint: &Constraint,
) -> Vec<f64> {
    let mut out = Vec::new();
    push_residual(poses, constraint, &mut out);
    out
}

fn push_residual(
    poses: &std::collections::BTreeMap<NodeId, Pose4Dof>,
    constraint: &Constraint,
    out: &mut Vec<f64>,
) {
    match constraint {
        Constraint::Absolute(c) => {
            let Some(pose) = poses.get(&c.node) else { return };
            let error = pose.as_vector() - c.measured_pose.as_vector();
            let cholesky = nalgebra::Cholesky::new(c.information)
                .expect("validated at add-time to be positive definite");
            let whitened = cholesky.l().transpose() * error;
            out.extend(whitened.iter());
        }
        Constraint::Relative(c) => {
            let (Some(&from), Some(&to)) = (poses.get(&c.from), poses.get(&c.to)) else {
                return;
            };
            let current_rel = to.relative_to(from);
            let error = current_rel.as_vector() - c.measured_relative_pose.as_vector();
            let cholesky = nalgebra::Cholesky::new(c.information)
                .expect("validated at add-time to be positive definite");
            let whitened = cholesky.l().transpose() * error;
            out.extend(whitened.iter());
        }
        Constraint::Registration(c) => {
            let (Some(&from), Some(&to)) = (poses.get(&c.from), poses.get(&c.to)) else {
                return;
            };
            let sqrt_weight = c.weight.max(0.0).sqrt();
            let from_iso = from.to_isometry();
            let to_iso_inv = to.to_isometry().inverse();
            for point in &c.points_in_from_frame {
                let world = from_iso * point;
                let local = to_iso_inv * world;
                if let Some(distance) = interpolate_distance(&c.to_layer, local) {
                    out.push(sqrt_weight * f64::from(distance));
                }
            }
        }
    }
}

fn numeric_jacobian(
    poses: &std::collections::BTreeMap<NodeId, Pose4Dof>,
    free_ids: &[NodeId],
    constraints: &[&Constraint],
) -> DMatrix<f64> {
    let r0 = residuals(poses, constraints);
    let n_residuals = r0.len();
    let n_params = free_ids.len() * 4;
    let mut jacobian = DMatrix::zeros(n_residuals, n_params);

    for (slot, id) in free_ids.iter().enumerate() {
        for axis in 0..4 {
            let mut plus = poses.clone();
            let mut minus = poses.clone();
            let mut v_plus = poses[id].as_vector();
            let mut v_minus = v_plus;
            v_plus[axis] += JACOBIAN_EPSILON;
            v_minus[axis] -= JACOBIAN_EPSILON;
            plus.insert(*id, Pose4Dof::from_vector(v_plus));
            minus.insert(*id, Pose4Dof::from_vector(v_minus));

            let r_plus = residuals(&plus, constraints);
            let r_minus = residuals(&minus, constraints);
            let column = (r_plus - r_minus) / (2.0 * JACOBIAN_EPSILON);

            let param_index = slot * 4 + axis;
            for (row, value) in column.iter().enumerate() {
                jacobian[(row, param_index)] = *value;
            }
        }
    }

    jacobian
}
