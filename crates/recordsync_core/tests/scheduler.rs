mod support;

use recordsync_core::{EngineConfig, MemoryRemoteStore, SyncPhase, SyncScheduler};
use std::time::Duration;
use support::{harness, SharedStore};

fn every(period: Duration) -> EngineConfig {
    EngineConfig {
        sync_interval: period,
        ..EngineConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn ticks_drive_cycles_until_shutdown() {
    let h = harness(
        SharedStore::default(),
        MemoryRemoteStore::new(),
        every(Duration::from_secs(1)),
    );

    let scheduler = SyncScheduler::spawn(h.engine.clone());
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let cycles = h.engine.last_cycle();
    assert!((3..=4).contains(&cycles), "unexpected cycle count {cycles}");

    scheduler.shutdown().await;
    let fetches = h.remote.fetch_calls();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.remote.fetch_calls(), fetches);
    assert_eq!(h.engine.phase(), SyncPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn requested_sync_runs_without_waiting_for_the_timer() {
    let h = harness(
        SharedStore::default(),
        MemoryRemoteStore::new(),
        every(Duration::from_secs(60)),
    );
    let scheduler = SyncScheduler::spawn(h.engine.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.engine.last_cycle(), 1);

    h.engine.add_record("New", "Y").unwrap();
    h.engine.request_sync();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.engine.last_cycle(), 2);
    assert!(!h.engine.is_sync_requested());
    assert_eq!(h.remote.records().len(), 1);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn ticks_during_a_slow_cycle_are_dropped_not_queued() {
    let h = harness(
        SharedStore::default(),
        MemoryRemoteStore::new(),
        every(Duration::from_secs(1)),
    );
    h.remote.set_latency(Some(Duration::from_millis(2_500)));

    let scheduler = SyncScheduler::spawn(h.engine.clone());
    tokio::time::sleep(Duration::from_secs(10)).await;
    scheduler.shutdown().await;

    // Ten ticks elapsed; a cycle only starts once the previous one finished.
    let cycles = h.engine.last_cycle();
    assert!((3..=4).contains(&cycles), "unexpected cycle count {cycles}");
    assert!(h.remote.fetch_calls() <= cycles as usize);
}
