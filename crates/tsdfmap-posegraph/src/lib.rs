//! 4-DoF gravity-aligned submap pose graph: nodes, constraints, and a
//! dense Levenberg-Marquardt solver tying them together.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod constraint;
mod graph;
mod node;
mod pose;
mod solver;

pub use constraint::{
    AbsolutePoseConstraint, Constraint, ConstraintCollection, ConstraintType,
    RegistrationConstraint, RelativePoseConstraint,
};
pub use graph::{EdgeCovariance, PoseGraph, VisualizationEdge};
pub use node::{Node, NodeCollection, NodeId};
pub use pose::Pose4Dof;
pub use solver::{optimize, SolverSummary};
