#[allow(dead_code)]
mod common;

use std::sync::Barrier;
use std::thread;

use rand::Rng;
use rand::seq::IndexedRandom;

use common::{Harness, assert_registry_invariants};
use skirmish_core::lifecycle::LifecycleSettings;
use skirmish_core::notice::RejectReason;
use skirmish_core::test_helpers::{make_players, make_template};

fn fast_settings() -> LifecycleSettings {
    LifecycleSettings {
        lobby_countdown_secs: 3,
        full_lobby_countdown_secs: 1,
        end_countdown_secs: 1,
        protection_secs: 1,
        max_active_secs: 4,
        announce_at: vec![1],
    }
}

#[test]
fn racing_joiners_never_overfill() {
    let h = Harness::new(
        vec![make_template("crowd", 2, 4, 2)],
        LifecycleSettings::default(),
    );
    let id = h.orch.create_instance("crowd").unwrap();
    let players = make_players(32);
    let barrier = Barrier::new(players.len());

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = players
            .iter()
            .map(|p| {
                let orch = &h.orch;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    orch.admit(*p, id)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 4);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == RejectReason::Full)
    );
    assert_eq!(h.orch.instance(id).unwrap().living.len(), 4);
}

#[test]
fn one_player_racing_two_instances_lands_once() {
    let h = Harness::new(
        vec![make_template("skywars", 2, 8, 2)],
        LifecycleSettings::default(),
    );
    let first = h.orch.create_instance("skywars").unwrap();
    let second = h.orch.create_instance("skywars").unwrap();

    for player in make_players(50) {
        let barrier = Barrier::new(2);
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = [first, second]
                .into_iter()
                .map(|target| {
                    let orch = &h.orch;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        orch.admit(player, target)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let won: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(won.len(), 1);
        assert!(matches!(
            results.iter().find_map(|r| r.as_ref().err()),
            Some(RejectReason::AlreadyMember { .. })
        ));
        assert_eq!(h.orch.instance_of(player), Some(won[0].instance));
        h.orch.remove(player);
    }
}

#[test]
fn concurrent_refill_provisions_one_instance() {
    let h = Harness::new(
        vec![
            make_template("skywars", 2, 8, 2),
            make_template("duel", 2, 2, 2),
        ],
        LifecycleSettings::default(),
    );
    let barrier = Barrier::new(16);

    let found: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let orch = &h.orch;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    orch.find_random_available()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(found.iter().all(Option::is_some));
    assert_eq!(h.worlds.provisioned_total(), 1);
    assert_eq!(h.orch.snapshot().len(), 1);
}

#[test]
fn mixed_operations_keep_registry_consistent() {
    let h = Harness::new(
        vec![
            make_template("skywars", 2, 4, 2),
            make_template("duel", 2, 2, 2),
        ],
        fast_settings(),
    );
    assert_eq!(h.orch.warm_up(), 2);
    let players = make_players(24);

    thread::scope(|s| {
        for worker in 0..6 {
            let orch = &h.orch;
            let players = &players;
            s.spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..300 {
                    let Some(player) = players.choose(&mut rng).copied() else {
                        return;
                    };
                    match rng.random_range(0..10) {
                        0..=4 => {
                            if let Some(target) = orch.find_random_available() {
                                let _ = orch.admit(player, target);
                            }
                        },
                        5..=6 => {
                            orch.remove(player);
                        },
                        7 => {
                            let killer = players.choose(&mut rng).copied();
                            orch.eliminate(player, killer);
                        },
                        _ if worker == 0 => orch.tick(),
                        _ => {
                            if let Some(snap) = orch.snapshot().choose(&mut rng) {
                                orch.start_match(snap.id);
                            }
                        },
                    }
                    assert_registry_invariants(&orch.snapshot());
                }
            });
        }
    });

    let snapshots = h.orch.snapshot();
    assert_registry_invariants(&snapshots);
    for player in &players {
        let holders = snapshots
            .iter()
            .filter(|s| s.living.contains(player) || s.spectating.contains(player))
            .count();
        assert!(holders <= 1);
        assert_eq!(
            h.orch.instance_of(*player).is_some(),
            holders == 1,
            "membership index disagrees with instance contents"
        );
    }

    let instances = snapshots.len();
    assert_eq!(h.worlds.live_playspaces(), instances);
    assert_eq!(h.orch.shutdown(), instances);
    assert_eq!(h.worlds.live_playspaces(), 0);
}
