//! Property tests for the 4-DoF pose algebra that the solver's numeric
//! Jacobian and residual construction both lean on.

use proptest::prelude::*;
use tsdfmap_posegraph::Pose4Dof;

fn arb_pose() -> impl Strategy<Value = Pose4Dof> {
    (-10.0..10.0_f64, -10.0..10.0_f64, -10.0..10.0_f64, -std::f64::consts::PI..std::f64::consts::PI)
        .prop_map(|(x, y, z, yaw)| Pose4Dof { x, y, z, yaw })
}

proptest! {
    #[test]
    fn compose_then_relative_to_recovers_second_operand(a in arb_pose(), b in arb_pose()) {
        let composed = a.compose(b);
        let recovered = composed.relative_to(a);
        prop_assert!((recovered.x - b.x).abs() < 1e-6);
        prop_assert!((recovered.y - b.y).abs() < 1e-6);
        prop_assert!((recovered.z - b.z).abs() < 1e-6);
        prop_assert!((recovered.yaw - b.yaw).abs() < 1e-6);
    }

    #[test]
    fn inverse_then_compose_is_identity(a in arb_pose()) {
        let identity = a.inverse().compose(a);
        prop_assert!(identity.x.abs() < 1e-6);
        prop_assert!(identity.y.abs() < 1e-6);
        prop_assert!(identity.z.abs() < 1e-6);
        prop_assert!(identity.yaw.abs() < 1e-6);
    }

    #[test]
    fn as_vector_from_vector_roundtrips(a in arb_pose()) {
        let back = Pose4Dof::from_vector(a.as_vector());
        prop_assert!((back.x - a.x).abs() < 1e-12);
        prop_assert!((back.yaw - a.yaw).abs() < 1e-12);
    }
}
