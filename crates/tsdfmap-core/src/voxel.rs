//! The weighted-average voxel update rule and its inverse (deintegration).

use crate::types::Voxel;
use serde::{Deserialize, Serialize};

/// Controls how much weight an individual observation contributes as a
/// function of its distance along the ray, relative to the truncation
/// band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightingPolicy {
    /// Every observation within the truncation band contributes the same
    /// weight, regardless of distance.
    Constant,
    /// Weight falls off linearly with range from the sensor (farther
    /// observations are noisier and count for less).
    Linear,
    /// Weight ramps linearly down to zero as the signed distance approaches
    /// `-truncation` (i.e. just behind the observed surface), and is full
    /// weight everywhere in front of the surface. Despite the name this is
    /// a linear ramp, not a quadratic one; the name mirrors the
    /// `use_weight_dropoff` configuration knob it corresponds to.
    QuadraticDropoff,
}

impl Default for WeightingPolicy {
    fn default() -> Self {
        Self::Constant
    }
}

impl WeightingPolicy {
    /// Observation weight for a voxel at signed distance `sdf` from the
    /// surface (negative = behind the surface, as seen from the sensor),
    /// given the ray's `range` (sensor-to-surface distance) and the
    /// integrator's `truncation` distance.
    #[must_use]
    pub fn weight_for(&self, sdf: f32, range: f32, truncation: f32) -> f32 {
        match self {
            Self::Constant => 1.0,
            Self::Linear => {
                if range <= f32::EPSILON {
                    1.0
                } else {
                    (1.0 / range).max(0.0)
                }
            }
            Self::QuadraticDropoff => {
                if sdf >= 0.0 {
                    1.0
                } else if sdf <= -truncation {
                    0.0
                } else {
                    1.0 - (-sdf / truncation)
                }
            }
        }
    }
}

/// Weight below which a voxel is treated as unobserved and reset to its
/// default value. Guards against floating point residue after repeated
/// deintegration rather than requiring an exact zero.
pub const WEIGHT_EPSILON: f32 = 1e-6;

/// Fold one observation into `voxel` using the standard weighted running
/// average, with `max_weight` capping accumulated confidence.
///
/// Pass a negated `w_obs` to deintegrate a previously-integrated
/// observation (see [`deintegrate`]); the same formula runs in reverse and
/// the voxel is reset to its default, unobserved state once its weight
/// decays back to (near) zero.
pub fn apply_update(
    voxel: &mut Voxel,
    d_obs: f32,
    w_obs: f32,
    color_obs: Option<[u8; 3]>,
    max_weight: f32,
    truncation: f32,
) {
    let w_new = (voxel.weight + w_obs).clamp(0.0, max_weight);

    if w_new <= WEIGHT_EPSILON {
        *voxel = Voxel::default();
        return;
    }

    let d_new = (voxel.weight * voxel.distance + w_obs * d_obs) / w_new;
    voxel.distance = d_new.clamp(-truncation, truncation);

    if let Some(c_obs) = color_obs {
        let blend = |old: u8, obs: u8| -> u8 {
            let mixed = (f32::from(voxel.weight) * f32::from(old)
                + w_obs.max(0.0) * f32::from(obs))
                / w_new;
            mixed.round().clamp(0.0, 255.0) as u8
        };
        voxel.color = [
            blend(voxel.color[0], c_obs[0]),
            blend(voxel.color[1], c_obs[1]),
            blend(voxel.color[2], c_obs[2]),
        ];
    }

    voxel.weight = w_new;
}

/// Remove a previously-applied observation's contribution from `voxel`.
/// Exact inverse of [`apply_update`] for the same `(d_obs, w_obs)` pair.
pub fn deintegrate(
    voxel: &mut Voxel,
    d_obs: f32,
    w_obs: f32,
    color_obs: Option<[u8; 3]>,
    max_weight: f32,
    truncation: f32,
) {
    apply_update(voxel, d_obs, -w_obs, color_obs, max_weight, truncation);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_update_weighted_average() {
        let mut v = Voxel::default();
        apply_update(&mut v, 0.10, 1.0, None, 1e4, 0.2);
        assert!((v.distance - 0.10).abs() < 1e-6);
        assert!((v.weight - 1.0).abs() < 1e-6);

        apply_update(&mut v, 0.20, 1.0, None, 1e4, 0.2);
        assert!((v.distance - 0.15).abs() < 1e-6);
        assert!((v.weight - 2.0).abs() < 1e-6);
    }

    #[test]
    fn apply_update_clamps_to_truncation_band() {
        let mut v = Voxel::default();
        apply_update(&mut v, 10.0, 1.0, None, 1e4, 0.2);
        assert!((v.distance - 0.2).abs() < 1e-6);

        apply_update(&mut v, -10.0, 1.0, None, 1e4, 0.2);
        assert!((v.distance - (-0.2)).abs() < 1e-3);
    }

    #[test]
    fn apply_update_caps_weight_at_max_weight() {
        let mut v = Voxel::default();
        for _ in 0..1000 {
            apply_update(&mut v, 0.05, 1.0, None, 5.0, 0.2);
        }
        assert!((v.weight - 5.0).abs() < 1e-6);
    }

    #[test]
    fn deintegrate_is_exact_inverse_of_integrate() {
        let mut v = Voxel::default();
        apply_update(&mut v, 0.10, 1.0, Some([10, 20, 30]), 1e4, 0.2);
        apply_update(&mut v, 0.12, 2.0, Some([40, 50, 60]), 1e4, 0.2);

        deintegrate(&mut v, 0.12, 2.0, Some([40, 50, 60]), 1e4, 0.2);
        deintegrate(&mut v, 0.10, 1.0, Some([10, 20, 30]), 1e4, 0.2);

        assert!(!v.is_observed());
        assert_eq!(v, Voxel::default());
    }

    #[test]
    fn fully_deintegrated_voxel_resets_color() {
        let mut v = Voxel::default();
        apply_update(&mut v, 0.05, 3.0, Some([200, 100, 50]), 1e4, 0.2);
        deintegrate(&mut v, 0.05, 3.0, Some([200, 100, 50]), 1e4, 0.2);
        assert_eq!(v.color, [0, 0, 0]);
        assert_eq!(v.weight, 0.0);
    }

    #[test]
    fn quadratic_dropoff_is_full_weight_in_front_of_surface() {
        let p = WeightingPolicy::QuadraticDropoff;
        assert!((p.weight_for(0.05, 1.0, 0.2) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn quadratic_dropoff_ramps_to_zero_at_negative_truncation() {
        let p = WeightingPolicy::QuadraticDropoff;
        assert!((p.weight_for(-0.2, 1.0, 0.2)).abs() < 1e-6);
        let mid = p.weight_for(-0.1, 1.0, 0.2);
        assert!((mid - 0.5).abs() < 1e-6);
    }
}
