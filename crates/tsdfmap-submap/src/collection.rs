//! `SubmapCollection`: owns the active submap, rotates it on a fixed
//! wall-clock interval, and keeps the finalized history around for the
//! pose graph back end to register and constrain.

use tracing::info;
use tsdfmap_core::Config;
use tsdfmap_integrate::Integrator;

use crate::submap::Submap;

pub struct SubmapCollection {
    submaps: Vec<Submap>,
    active: Option<usize>,
    next_id: u64,
    last_rotation_time: f64,
}

impl SubmapCollection {
    #[must_use]
    pub fn new(start_time: f64, config: &Config) -> Self {
        let mut collection = Self {
            submaps: Vec::new(),
            active: None,
            next_id: 0,
            last_rotation_time: start_time,
        };
        collection.start_new_submap(start_time, config);
        collection
    }

    fn start_new_submap(&mut self, now: f64, config: &Config) {
        let id = self.next_id;
        self.next_id += 1;
        self.submaps.push(Submap::new(id, now, config));
        self.active = Some(self.submaps.len() - 1);
        self.last_rotation_time = now;
        info!(submap = id, "started new submap");
    }

    #[must_use]
    pub fn active_submap(&self) -> Option<&Submap> {
        self.active.map(|i| &self.submaps[i])
    }

    pub fn active_submap_mut(&mut self) -> Option<&mut Submap> {
        self.active.map(move |i| &mut self.submaps[i])
    }

    /// Every submap so far, oldest first, including the still-active one.
    #[must_use]
    pub fn all(&self) -> &[Submap] {
        &self.submaps
    }

    /// Every finalized submap, oldest first.
    pub fn finished(&self) -> impl Iterator<Item = &Submap> {
        self.submaps.iter().filter(|s| s.finished)
    }

    /// If submap mode is enabled (`submap_interval_sec > 0`) and `now` has
    /// crossed the next rotation boundary, finalize the active submap and
    /// start a fresh one. Returns `true` if a rotation happened.
    pub fn maybe_rotate(&mut self, now: f64, integrator: &dyn Integrator, config: &Config) -> bool {
        if config.submap_interval_sec <= 0.0 {
            return false;
        }
        if now - self.last_rotation_time < config.submap_interval_sec {
            return false;
        }

        if let Some(active) = self.active_submap_mut() {
            active.finalize(now, integrator, config);
        }
        self.start_new_submap(now, config);
        true
    }

    /// Record a sensor pose against the active submap's pose history.
    pub fn record_pose(&mut self, timestamp: f64, pose: tsdfmap_core::Transform) {
        if let Some(active) = self.active_submap_mut() {
            active.record_pose(timestamp, pose);
        }
    }

    /// Total block count across every submap, including finalized ones;
    /// used for verbose memory diagnostics.
    #[must_use]
    pub fn total_block_count(&self) -> usize {
        self.submaps.iter().map(|s| s.layer.block_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdfmap_integrate::SimpleIntegrator;

    fn config_with_interval(interval: f64) -> Config {
        Config {
            submap_interval_sec: interval,
            pointcloud_deintegration_queue_length: 0,
            publish_map_every_n_sec: 0.0,
            ..Config::default()
        }
    }

    #[test]
    fn disabled_submap_mode_never_rotates() {
        let config = config_with_interval(0.0);
        let integrator = SimpleIntegrator::new();
        let mut collection = SubmapCollection::new(0.0, &config);
        assert!(!collection.maybe_rotate(1000.0, &integrator, &config));
        assert_eq!(collection.all().len(), 1);
    }

    #[test]
    fn rotation_finalizes_old_submap_and_starts_a_new_one() {
        let config = config_with_interval(10.0);
        let integrator = SimpleIntegrator::new();
        let mut collection = SubmapCollection::new(0.0, &config);

        assert!(!collection.maybe_rotate(5.0, &integrator, &config));
        assert!(collection.maybe_rotate(10.0, &integrator, &config));

        assert_eq!(collection.all().len(), 2);
        assert_eq!(collection.finished().count(), 1);
        assert!(!collection.active_submap().unwrap().finished);
    }

    #[test]
    fn each_submap_gets_a_distinct_monotonic_id() {
        let config = config_with_interval(1.0);
        let integrator = SimpleIntegrator::new();
        let mut collection = SubmapCollection::new(0.0, &config);
        collection.maybe_rotate(1.0, &integrator, &config);
        collection.maybe_rotate(2.0, &integrator, &config);
        let ids: Vec<u64> = collection.all().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
