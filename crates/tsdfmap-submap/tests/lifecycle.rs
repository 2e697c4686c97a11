use tsdfmap_core::{Config, Position, Transform};
use tsdfmap_integrate::{Integrator, PointcloudPacket, SimpleIntegrator};
use tsdfmap_submap::{DeintegrationPacket, SubmapCollection};

#[test]
fn sliding_deintegration_window_evicts_oldest_frame_once_full() {
    let config = Config {
        pointcloud_deintegration_queue_length: 2,
        ..Config::default()
    };
    let integrator = SimpleIntegrator::new();
    let mut collection = SubmapCollection::new(0.0, &config);

    for i in 0..3 {
        let pkt = PointcloudPacket {
            origin: Position::new(0.0, 0.0, 0.0),
            points: vec![Position::new(1.0 + i as f64 * 0.01, 0.0, 0.0)],
            colors: None,
            is_freespace: false,
            transform_used: Transform::identity(),
        };
        let submap = collection.active_submap_mut().unwrap();
        integrator.integrate(&submap.layer, &pkt, &config);
        submap.enqueue_and_maybe_deintegrate(
            DeintegrationPacket {
                timestamp: f64::from(i),
                packet: Some(pkt),
            },
            &integrator,
            &config,
        );
    }

    // The third push should have evicted (and deintegrated) the first.
    let submap = collection.active_submap().unwrap();
    assert!(submap.layer.block_count() > 0);
}

#[test]
fn submap_mode_rotation_cycle_produces_registration_points_for_finished_submaps() {
    let config = Config {
        submap_interval_sec: 5.0,
        pointcloud_deintegration_queue_length: 0,
        publish_map_every_n_sec: 0.0,
        ..Config::default()
    };
    let integrator = SimpleIntegrator::new();
    let mut collection = SubmapCollection::new(0.0, &config);

    let pkt = PointcloudPacket {
        origin: Position::new(0.0, 0.0, 0.0),
        points: vec![Position::new(1.0, 0.0, 0.0), Position::new(0.0, 1.0, 0.0)],
        colors: None,
        is_freespace: false,
        transform_used: Transform::identity(),
    };
    let submap = collection.active_submap_mut().unwrap();
    integrator.integrate(&submap.layer, &pkt, &config);

    collection.maybe_rotate(5.0, &integrator, &config);

    let finished: Vec<_> = collection.finished().collect();
    assert_eq!(finished.len(), 1);
    assert!(!finished[0].registration_points().is_empty());
}
