//! `Pipeline`: ties the transform oracle, ICP hook, integrator, and
//! submap collection together into the end-to-end ingestion path a
//! mapping session drives pointcloud messages through.

use tracing::debug;
use tsdfmap_core::{BlockIndex, Config, MapResult, MergeAction, Position, Transform};
use tsdfmap_integrate::{Integrator, PointcloudPacket};
use tsdfmap_submap::{DeintegrationPacket, SubmapCollection};

use crate::icp::{IcpCorrection, IcpHook};
use crate::oracle::TransformOracle;
use crate::queue::{PendingQueue, RawPointcloud};
use crate::timer::PeriodicTimer;

/// The full ingestion and maintenance surface of a running map session.
pub struct Pipeline {
    config: Config,
    integrator: Box<dyn Integrator>,
    oracle: Box<dyn TransformOracle>,
    icp: Box<dyn IcpHook>,
    icp_correction: IcpCorrection,
    submaps: SubmapCollection,
    main_queue: PendingQueue,
    freespace_queue: PendingQueue,
    last_accepted_main: f64,
    last_accepted_freespace: f64,
    mapping_paused: bool,
    map_needs_pruning: bool,
    mesh_timer: PeriodicTimer,
    map_publish_timer: PeriodicTimer,
    active_tsdf_timer: PeriodicTimer,
}

impl Pipeline {
    /// # Errors
    /// Returns [`tsdfmap_core::MapError::Config`] if `config` fails
    /// [`Config::validate`].
    pub fn new(
        config: Config,
        integrator: Box<dyn Integrator>,
        oracle: Box<dyn TransformOracle>,
        icp: Box<dyn IcpHook>,
        start_time: f64,
    ) -> MapResult<Self> {
        config.validate()?;
        Ok(Self {
            mesh_timer: PeriodicTimer::new(config.update_mesh_every_n_sec, start_time),
            map_publish_timer: PeriodicTimer::new(config.publish_map_every_n_sec, start_time),
            active_tsdf_timer: PeriodicTimer::new(config.publish_active_tsdf_every_n_sec, start_time),
            submaps: SubmapCollection::new(start_time, &config),
            main_queue: PendingQueue::new(),
            freespace_queue: PendingQueue::new(),
            last_accepted_main: f64::NEG_INFINITY,
            last_accepted_freespace: f64::NEG_INFINITY,
            mapping_paused: false,
            map_needs_pruning: false,
            icp_correction: IcpCorrection::default(),
            config,
            integrator,
            oracle,
            icp,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn submaps(&self) -> &SubmapCollection {
        &self.submaps
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.mapping_paused
    }

    /// Suspend or resume integration without tearing down any state
    /// (spec service surface: `toggle_mapping`). Messages arriving while
    /// paused are silently dropped rather than queued.
    pub fn toggle_mapping(&mut self, paused: bool) {
        self.mapping_paused = paused;
    }

    #[must_use]
    pub fn needs_pruning(&self) -> bool {
        self.map_needs_pruning
    }

    /// Admit a surface pointcloud for integration.
    pub fn insert(&mut self, msg: RawPointcloud) {
        self.admit(msg, false);
    }

    /// Admit a freespace-only pointcloud on its own, independently
    /// throttled ingestion path: rays are carved out to each endpoint but
    /// no surface observation is written.
    pub fn insert_freespace(&mut self, msg: RawPointcloud) {
        self.admit(msg, true);
    }

    fn admit(&mut self, msg: RawPointcloud, is_freespace: bool) {
        if self.mapping_paused {
            return;
        }
        let last_accepted = if is_freespace {
            self.last_accepted_freespace
        } else {
            self.last_accepted_main
        };
        if msg.timestamp - last_accepted < self.config.min_time_between_msgs_sec {
            return;
        }
        if is_freespace {
            self.last_accepted_freespace = msg.timestamp;
            self.freespace_queue.push(msg);
        } else {
            self.last_accepted_main = msg.timestamp;
            self.main_queue.push(msg);
        }
        self.drain(is_freespace);
    }

    /// Pop and process every message at the head of the named queue whose
    /// transform resolves, stopping at the first one that doesn't so
    /// later messages don't get processed out of order.
    fn drain(&mut self, is_freespace: bool) {
        loop {
            let queue = if is_freespace {
                &self.freespace_queue
            } else {
                &self.main_queue
            };
            let Some(head) = queue.front() else { break };
            let Some(transform) = self.oracle.lookup(&head.frame_id, head.timestamp) else {
                break;
            };
            let queue = if is_freespace {
                &mut self.freespace_queue
            } else {
                &mut self.main_queue
            };
            let msg = queue.pop_front().expect("front() just confirmed an entry");
            self.process(msg, transform, is_freespace);
        }
    }

    fn process(&mut self, msg: RawPointcloud, transform: Transform, is_freespace: bool) {
        let initial = if self.config.enable_icp {
            if !self.config.accumulate_icp_corrections {
                self.icp_correction.reset();
            }
            self.icp_correction.apply(transform)
        } else {
            transform
        };

        let refined = if self.config.enable_icp {
            let Some(active) = self.submaps.active_submap() else {
                return;
            };
            let (t_refined, steps) = self.icp.refine(&active.layer, &msg.points, initial);
            debug!(steps, "icp refinement step count");
            self.icp_correction.update(transform, t_refined);
            t_refined
        } else {
            transform
        };

        let origin = refined * Position::origin();
        let world_points: Vec<Position> = msg.points.iter().map(|p| refined * p).collect();
        let packet = PointcloudPacket {
            origin,
            points: world_points,
            colors: msg.colors.clone(),
            is_freespace,
            transform_used: refined,
        };

        {
            let Some(active) = self.submaps.active_submap() else {
                return;
            };
            let stats = self.integrator.integrate(&active.layer, &packet, &self.config);
            debug!(
                rays = stats.rays_cast,
                voxels = stats.voxels_updated,
                blocks = stats.blocks_touched,
                "integrated one pointcloud"
            );
        }

        self.submaps.record_pose(msg.timestamp, refined);

        if self.config.pointcloud_deintegration_queue_length > 0 {
            let integrator = self.integrator.as_ref();
            let config = &self.config;
            if let Some(active) = self.submaps.active_submap_mut() {
                active.enqueue_and_maybe_deintegrate(
                    DeintegrationPacket {
                        timestamp: msg.timestamp,
                        packet: Some(packet),
                    },
                    integrator,
                    config,
                );
            }
            self.map_needs_pruning = true;
        }

        if self.config.max_block_distance_from_body > 0.0 {
            if let Some(active) = self.submaps.active_submap() {
                active.layer.remove_distant(origin, self.config.max_block_distance_from_body);
            }
        }

        if self.config.publish_pointclouds_on_update {
            debug!("publish_pointclouds_on_update set; caller should republish now");
        }
    }

    /// Remove blocks the deintegration window fully rolled back
    /// (weight decayed to ~0), if any have accumulated since the last
    /// call. A no-op, returning an empty vec, when the deintegration
    /// window is disabled.
    pub fn prune(&mut self) -> Vec<BlockIndex> {
        if !self.map_needs_pruning {
            return Vec::new();
        }
        self.map_needs_pruning = false;
        let Some(active) = self.submaps.active_submap_mut() else {
            return Vec::new();
        };
        active.prune_deintegrated_blocks()
    }

    /// Fixed-interval submap rotation. Callers invoke this regularly
    /// (e.g. once per `insert`, or on their own scheduler tick) with the
    /// current wall-clock time. A no-op when `submap_interval_sec <= 0`.
    pub fn maybe_rotate_submap(&mut self, now: f64) -> bool {
        self.submaps.maybe_rotate(now, self.integrator.as_ref(), &self.config)
    }

    pub fn mesh_update_due(&mut self, now: f64) -> bool {
        self.mesh_timer.maybe_fire(now)
    }

    pub fn map_publish_due(&mut self, now: f64) -> bool {
        self.map_publish_timer.maybe_fire(now)
    }

    pub fn active_tsdf_publish_due(&mut self, now: f64) -> bool {
        self.active_tsdf_timer.maybe_fire(now)
    }

    /// Drop every submap's layer and start fresh from a single new one.
    pub fn clear_map(&mut self, now: f64) {
        self.submaps = SubmapCollection::new(now, &self.config);
        self.map_needs_pruning = false;
        self.icp_correction.reset();
    }

    /// Serialize the active submap's layer to `path`.
    ///
    /// # Errors
    /// Returns [`tsdfmap_core::MapError::IoFailure`] on any filesystem
    /// failure.
    pub fn save_map(&self, path: &std::path::Path) -> MapResult<()> {
        let Some(active) = self.submaps.active_submap() else {
            return Ok(());
        };
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        let blocks = active.layer.iterate_all();
        tsdfmap_core::write_blocks(&mut writer, &active.layer, &blocks, MergeAction::Reset)?;
        Ok(())
    }

    /// Load a previously saved layer into the active submap, replacing
    /// its current contents wholesale.
    ///
    /// # Errors
    /// Returns [`tsdfmap_core::MapError::IoFailure`] on any filesystem or
    /// decoding failure.
    pub fn load_map(&mut self, path: &std::path::Path) -> MapResult<()> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        let message = tsdfmap_core::read_message(&mut reader)?;
        let Some(active) = self.submaps.active_submap() else {
            return Ok(());
        };
        tsdfmap_core::apply_message(&active.layer, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icp::IdentityIcp;
    use crate::oracle::IdentityOracle;

    fn plane_points(z: f64) -> Vec<Position> {
        let mut points = Vec::new();
        let mut x = -0.5;
        while x <= 0.5 {
            let mut y = -0.5;
            while y <= 0.5 {
                points.push(Position::new(x, y, z));
                y += 0.1;
            }
            x += 0.1;
        }
        points
    }

    fn test_pipeline(config: Config) -> Pipeline {
        let integrator = tsdfmap_integrate::build(&config);
        Pipeline::new(config, integrator, Box::new(IdentityOracle), Box::new(IdentityIcp), 0.0).unwrap()
    }

    #[test]
    fn single_plane_insert_allocates_blocks_along_the_surface() {
        let config = Config {
            method: tsdfmap_core::IntegratorMethod::Simple,
            ..Config::default()
        };
        let mut pipeline = test_pipeline(config);
        pipeline.insert(RawPointcloud {
            timestamp: 0.0,
            frame_id: "camera".into(),
            points: plane_points(1.0),
            colors: None,
        });
        let active = pipeline.submaps().active_submap().unwrap();
        assert!(active.layer.block_count() > 0);
    }

    #[test]
    fn paused_pipeline_drops_messages() {
        let mut pipeline = test_pipeline(Config::default());
        pipeline.toggle_mapping(true);
        pipeline.insert(RawPointcloud {
            timestamp: 0.0,
            frame_id: "camera".into(),
            points: plane_points(1.0),
            colors: None,
        });
        assert_eq!(pipeline.submaps().active_submap().unwrap().layer.block_count(), 0);
    }

    #[test]
    fn deintegration_window_evicts_and_flags_pruning() {
        let config = Config {
            method: tsdfmap_core::IntegratorMethod::Simple,
            pointcloud_deintegration_queue_length: 2,
            ..Config::default()
        };
        let mut pipeline = test_pipeline(config);
        for i in 0..4 {
            pipeline.insert(RawPointcloud {
                timestamp: f64::from(i),
                frame_id: "camera".into(),
                points: plane_points(1.0),
                colors: None,
            });
        }
        assert!(pipeline.needs_pruning());
        let pruned = pipeline.prune();
        assert!(!pipeline.needs_pruning());
        // Blocks the rolled-back frames fully vacated get pruned; the
        // plane is still being observed by the retained frames, so not
        // every block necessarily disappears.
        let _ = pruned;
    }

    #[test]
    fn submap_rotation_starts_a_fresh_submap_on_schedule() {
        let config = Config {
            submap_interval_sec: 5.0,
            ..Config::default()
        };
        let mut pipeline = test_pipeline(config);
        assert!(!pipeline.maybe_rotate_submap(2.0));
        assert!(pipeline.maybe_rotate_submap(5.0));
        assert_eq!(pipeline.submaps().all().len(), 2);
    }

    #[test]
    fn clear_map_drops_all_existing_blocks() {
        let config = Config {
            method: tsdfmap_core::IntegratorMethod::Simple,
            ..Config::default()
        };
        let mut pipeline = test_pipeline(config);
        pipeline.insert(RawPointcloud {
            timestamp: 0.0,
            frame_id: "camera".into(),
            points: plane_points(1.0),
            colors: None,
        });
        assert!(pipeline.submaps().active_submap().unwrap().layer.block_count() > 0);
        pipeline.clear_map(1.0);
        assert_eq!(pipeline.submaps().active_submap().unwrap().layer.block_count(), 0);
    }

    #[test]
    fn save_then_load_round_trips_block_count() {
        let config = Config {
            method: tsdfmap_core::IntegratorMethod::Simple,
            ..Config::default()
        };
        let mut pipeline = test_pipeline(config);
        pipeline.insert(RawPointcloud {
            timestamp: 0.0,
            frame_id: "camera".into(),
            points: plane_points(1.0),
            colors: None,
        });
        let saved_count = pipeline.submaps().active_submap().unwrap().layer.block_count();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("tsdfmap-pipeline-test-{saved_count}.bin"));
        pipeline.save_map(&path).unwrap();

        let mut fresh = test_pipeline(Config::default());
        fresh.load_map(&path).unwrap();
        assert_eq!(fresh.submaps().active_submap().unwrap().layer.block_count(), saved_count);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn maintenance_timers_fire_independently_on_their_own_periods() {
        let config = Config {
            update_mesh_every_n_sec: 1.0,
            publish_map_every_n_sec: 2.0,
            publish_active_tsdf_every_n_sec: 0.0,
            ..Config::default()
        };
        let mut pipeline = test_pipeline(config);
        assert!(pipeline.mesh_update_due(1.0));
        assert!(!pipeline.map_publish_due(1.0));
        assert!(pipeline.map_publish_due(2.0));
        assert!(!pipeline.active_tsdf_publish_due(1000.0));
    }
}
