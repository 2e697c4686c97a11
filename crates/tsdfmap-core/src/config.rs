//! Runtime configuration, loaded from an optional TOML file and layered
//! with CLI flag overrides by `tsdfmap-cli`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::voxel::WeightingPolicy;

/// Which integrator strategy to run. See `tsdfmap-integrate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorMethod {
    Simple,
    Merged,
    Fast,
}

impl Default for IntegratorMethod {
    fn default() -> Self {
        Self::Merged
    }
}

/// Full runtime configuration, one field per knob named in the
/// configuration surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub voxels_per_side: u32,
    pub voxel_size: f64,
    pub truncation_distance: f64,
    pub max_weight: f32,
    pub method: IntegratorMethod,
    pub integrator_threads: usize,

    pub min_ray_length_m: f64,
    pub max_ray_length_m: f64,

    pub use_const_weight: bool,
    pub use_weight_dropoff: bool,

    pub min_time_between_msgs_sec: f64,
    pub max_block_distance_from_body: f64,
    pub pointcloud_deintegration_queue_length: usize,

    pub submap_interval_sec: f64,

    pub update_mesh_every_n_sec: f64,
    pub publish_map_every_n_sec: f64,
    pub publish_active_tsdf_every_n_sec: f64,

    pub enable_icp: bool,
    pub accumulate_icp_corrections: bool,
    pub publish_map_with_trajectory: bool,
    pub publish_pointclouds_on_update: bool,

    pub mesh_max_gap: u32,
    pub mesh_min_n: u32,

    pub fast_recent_voxel_capacity: usize,
    pub fast_recent_ray_capacity: usize,

    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voxels_per_side: 16,
            voxel_size: 0.1,
            truncation_distance: 0.2,
            max_weight: 1e4,
            method: IntegratorMethod::default(),
            integrator_threads: 4,

            min_ray_length_m: 0.1,
            max_ray_length_m: 5.0,

            use_const_weight: false,
            use_weight_dropoff: false,

            min_time_between_msgs_sec: 0.0,
            max_block_distance_from_body: 0.0,
            pointcloud_deintegration_queue_length: 0,

            submap_interval_sec: 0.0,

            update_mesh_every_n_sec: 0.0,
            publish_map_every_n_sec: 0.0,
            publish_active_tsdf_every_n_sec: 0.0,

            enable_icp: false,
            accumulate_icp_corrections: false,
            publish_map_with_trajectory: false,
            publish_pointclouds_on_update: false,

            mesh_max_gap: 0,
            mesh_min_n: 1,

            fast_recent_voxel_capacity: 100_000,
            fast_recent_ray_capacity: 10_000,

            verbose: false,
        }
    }
}

impl Config {
    #[must_use]
    pub fn weighting_policy(&self) -> WeightingPolicy {
        if self.use_const_weight {
            WeightingPolicy::Constant
        } else if self.use_weight_dropoff {
            WeightingPolicy::QuadraticDropoff
        } else {
            WeightingPolicy::Linear
        }
    }

    /// Validate cross-field invariants that a malformed TOML file or CLI
    /// override combination could otherwise violate silently.
    ///
    /// Mirrors the original server's submap/deintegration-queue/publish
    /// mutual-exclusion assertion: submap mode disables the sliding
    /// deintegration window and the periodic full-map publish, since both
    /// are superseded by per-submap finalization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.voxels_per_side == 0 {
            return Err(ConfigError::InvalidValue {
                field: "voxels_per_side",
                reason: "must be nonzero".into(),
            });
        }
        if self.voxel_size <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "voxel_size",
                reason: "must be positive".into(),
            });
        }
        if self.truncation_distance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "truncation_distance",
                reason: "must be positive".into(),
            });
        }
        if self.max_ray_length_m <= self.min_ray_length_m {
            return Err(ConfigError::InvalidValue {
                field: "max_ray_length_m",
                reason: "must exceed min_ray_length_m".into(),
            });
        }
        if self.submap_interval_sec > 0.0 {
            if self.pointcloud_deintegration_queue_length != 0 {
                return Err(ConfigError::MutuallyExclusive {
                    a: "submap_interval_sec",
                    b: "pointcloud_deintegration_queue_length",
                });
            }
            if self.publish_map_every_n_sec > 0.0 {
                return Err(ConfigError::MutuallyExclusive {
                    a: "submap_interval_sec",
                    b: "publish_map_every_n_sec",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn submap_mode_rejects_deintegration_queue() {
        let cfg = Config {
            submap_interval_sec: 10.0,
            pointcloud_deintegration_queue_length: 5,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MutuallyExclusive { .. })
        ));
    }

    #[test]
    fn submap_mode_rejects_periodic_map_publish() {
        let cfg = Config {
            submap_interval_sec: 10.0,
            publish_map_every_n_sec: 1.0,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MutuallyExclusive { .. })
        ));
    }

    #[test]
    fn zero_voxels_per_side_is_rejected() {
        let cfg = Config {
            voxels_per_side: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn weighting_policy_follows_flags() {
        let mut cfg = Config::default();
        assert_eq!(cfg.weighting_policy(), WeightingPolicy::Linear);
        cfg.use_const_weight = true;
        assert_eq!(cfg.weighting_policy(), WeightingPolicy::Constant);
        cfg.use_const_weight = false;
        cfg.use_weight_dropoff = true;
        assert_eq!(cfg.weighting_policy(), WeightingPolicy::QuadraticDropoff);
    }
}
