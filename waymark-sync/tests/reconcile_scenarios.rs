mod common;

use std::sync::Arc;

use common::{fixture, waystone, world};
use rstest::rstest;
use waymark_core::types::{MarkerIcon, Point, WAYSTONE_LAYER_KEY};
use waymark_sync::{SurfaceRegistry, SyncError, SyncScope};

#[test]
fn home_waystone_yields_exactly_one_marker_and_stays_one() {
    let w1 = world("world");
    let home = waystone("Home", w1.id, false, (10, 64, 20));
    let fx = fixture(vec![w1.clone()], vec![home.clone()], true);
    fx.sync.recover_all();
    let layer = fx.surface.layer(&w1.id, WAYSTONE_LAYER_KEY).unwrap();

    for _ in 0..2 {
        let outcome = fx.sync.reconcile(&w1.id).unwrap();
        assert_eq!(outcome.placed, 1);
        let markers = layer.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].point, Point { x: 10.0, z: 20.0 });
        assert_eq!(markers[0].icon, MarkerIcon::Open);
        assert_eq!(markers[0].key, format!("waystone_{}", home.id));
    }
}

#[rstest]
#[case::hidden(false, 2)]
#[case::shown(true, 3)]
fn reconcile_only_places_own_partition(#[case] show_locked: bool, #[case] expected: usize) {
    let a = world("a");
    let b = world("b");
    let a_records = vec![
        waystone("A1", a.id, false, (0, 0, 0)),
        waystone("A2", a.id, false, (1, 0, 1)),
        waystone("A3", a.id, true, (2, 0, 2)),
    ];
    let b_records = vec![
        waystone("B1", b.id, false, (5, 0, 5)),
        waystone("B2", b.id, true, (6, 0, 6)),
    ];
    let records: Vec<_> = a_records.iter().chain(&b_records).cloned().collect();
    let fx = fixture(vec![a.clone(), b.clone()], records, show_locked);
    fx.sync.recover_all();

    let outcome = fx.sync.reconcile(&a.id).unwrap();
    assert_eq!(outcome.placed, expected);

    let markers = fx.surface.layer(&a.id, WAYSTONE_LAYER_KEY).unwrap().markers();
    assert_eq!(markers.len(), expected);
    for record in &b_records {
        let key = format!("waystone_{}", record.id);
        assert!(markers.iter().all(|m| m.key != key), "B marker leaked into A");
    }
}

#[rstest]
#[case(false)]
#[case(true)]
fn locked_waystones_follow_visibility_policy(#[case] show_locked: bool) {
    let w = world("world");
    let vault = waystone("Vault", w.id, true, (3, 70, 4));
    let fx = fixture(vec![w.clone()], vec![vault.clone()], show_locked);
    let report = fx.sync.recover_all();
    assert!(report.is_clean());

    let markers = fx.surface.layer(&w.id, WAYSTONE_LAYER_KEY).unwrap().markers();
    if show_locked {
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].icon, MarkerIcon::Locked);
    } else {
        assert!(markers.is_empty());
    }
}

#[test]
fn reconcile_without_layer_is_not_synchronized_and_inserts_nothing() {
    let w = world("world");
    let fx = fixture(vec![w.clone()], vec![waystone("Home", w.id, false, (0, 0, 0))], true);

    let err = fx.sync.reconcile(&w.id).unwrap_err();
    assert!(matches!(err, SyncError::NotSynchronized { partition } if partition == w.id));
    assert_eq!(fx.surface.layer_count(), 0);
    assert!(fx.sync.owned_partitions().is_empty());
}

#[test]
fn reconcile_after_reset_is_not_synchronized_even_with_stale_table() {
    let w = world("world");
    let fx = fixture(vec![w.clone()], vec![waystone("Home", w.id, false, (0, 0, 0))], true);
    fx.sync.recover_all();
    let old = fx.surface.layer(&w.id, WAYSTONE_LAYER_KEY).unwrap();
    assert_eq!(fx.sync.owned_partitions(), vec![w.id]);

    fx.surface.reset();
    fx.source.set_records(vec![]);
    let err = fx.sync.reconcile(&w.id).unwrap_err();

    assert!(matches!(err, SyncError::NotSynchronized { .. }));
    assert!(fx.sync.owned_partitions().is_empty());
    assert_eq!(old.markers().len(), 1, "detached layer must not be touched");
}

#[test]
fn unreadable_source_leaves_stale_markers_visible() {
    let w = world("world");
    let fx = fixture(vec![w.clone()], vec![waystone("Home", w.id, false, (0, 0, 0))], true);
    fx.sync.recover_all();

    fx.source.set_records(vec![]);
    fx.source.set_unavailable(Some("database locked"));
    let err = fx.sync.reconcile(&w.id).unwrap_err();

    assert!(matches!(err, SyncError::SourceUnavailable(_)));
    let layer = fx.surface.layer(&w.id, WAYSTONE_LAYER_KEY).unwrap();
    assert_eq!(layer.markers().len(), 1);
}

#[test]
fn concurrent_reconciles_leave_a_fully_formed_layer() {
    let w = world("world");
    let records: Vec<_> = (0..50)
        .map(|i| waystone(&format!("Stone {i}"), w.id, false, (i, 64, -i)))
        .collect();
    let fx = Arc::new(fixture(vec![w.clone()], records, true));
    fx.sync.recover_all();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let fx = Arc::clone(&fx);
            let id = w.id;
            std::thread::spawn(move || {
                for _ in 0..10 {
                    fx.sync.run(SyncScope::Partition(id)).expect("reconcile");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread");
    }

    let layer = fx.surface.layer(&w.id, WAYSTONE_LAYER_KEY).unwrap();
    assert_eq!(layer.markers().len(), 50);
}

#[test]
fn each_reconcile_resolves_owners_from_its_own_single_read() {
    let a = world("a");
    let b = world("b");
    let records: Vec<_> = (0..3)
        .map(|i| waystone(&format!("A{i}"), a.id, false, (i, 0, i)))
        .chain((0..3).map(|i| waystone(&format!("B{i}"), b.id, false, (i, 0, i))))
        .collect();
    let fx = fixture(vec![a.clone(), b.clone()], records.clone(), true);
    for (i, record) in records.iter().enumerate() {
        fx.source.set_principal(record.owner, format!("Owner{i}"));
    }

    let before = fx.source.reads();
    let report = fx.sync.recover_all();
    assert!(report.is_clean());
    assert_eq!(fx.source.reads() - before, 2, "one source read per partition");

    let before = fx.source.reads();
    fx.sync.reconcile(&a.id).unwrap();
    assert_eq!(fx.source.reads() - before, 1);

    let markers = fx.surface.layer(&a.id, WAYSTONE_LAYER_KEY).unwrap().markers();
    for i in 0..3 {
        assert!(
            markers.iter().any(|m| m.click_tooltip.contains(&format!("Owner{i}"))),
            "owner name missing from tooltips"
        );
    }
}
