mod common;

use common::*;
use fleetpulse_agent::delivery::{AttemptOutcome, CycleOutcome};
use fleetpulse_agent::queue::{DurableQueue, PartitionRead};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test(start_paused = true)]
async fn offline_backlog_ships_as_one_batch_once_endpoint_returns() {
    let dir = TempDir::new().unwrap();
    let today = date("2026-10-18");
    let net = FakeNetwork::online();
    net.set_endpoint(false);
    let mut scheduler = build_scheduler(dir.path(), &net, 5, 300, today);

    // t = 0 .. 300: one record every 5s while the endpoint is down.
    for step in 0..=60 {
        let report = scheduler.tick().await;
        if step == 60 {
            let outcome = report.flush.expect("flush due at t=300");
            assert!(matches!(outcome, CycleOutcome::StoppedEarly { .. }));
            assert_eq!(report.queued, Some(61));
        }
        tokio::time::advance(Duration::from_secs(5)).await;
    }
    assert_eq!(net.batch_sizes(), vec![60]);
    assert_eq!(
        scheduler.context().queue.list_pending_dates().unwrap(),
        vec![today]
    );

    // Endpoint back at t = 301; the next flush is at t = 600.
    net.set_endpoint(true);
    let mut flushed = None;
    for _ in 0..60 {
        let report = scheduler.tick().await;
        if let Some(outcome) = report.flush {
            flushed = Some((outcome, report.queued));
        }
        tokio::time::advance(Duration::from_secs(5)).await;
    }

    let (outcome, queued_after) = flushed.expect("flush at t=600");
    assert!(outcome.is_drained());
    assert_eq!(outcome.delivered_records(), 120);
    assert_eq!(net.batch_sizes(), vec![60, 120]);
    // Partition was deleted by the flush; only the t=600 record is new.
    assert_eq!(queued_after, Some(1));
}

#[tokio::test]
async fn timed_out_send_keeps_both_stale_dates_intact() {
    let dir = TempDir::new().unwrap();
    let queue = DurableQueue::open(dir.path()).unwrap();
    let (d1, d2, today) = (date("2026-10-16"), date("2026-10-17"), date("2026-10-18"));
    fill(&queue, d1, 5);
    fill(&queue, d2, 3);
    let d1_before = queue.read_all(d1).unwrap();
    let d2_before = queue.read_all(d2).unwrap();

    let net = FakeNetwork::online();
    net.set_endpoint(false);
    let outcome = net.engine().flush(&queue, today).await;

    assert!(matches!(outcome, CycleOutcome::StoppedEarly { .. }));
    assert_eq!(net.batch_sizes(), vec![5]);
    assert_eq!(queue.read_all(d1).unwrap(), d1_before);
    assert_eq!(queue.read_all(d2).unwrap(), d2_before);
    assert_eq!(queue.list_pending_dates().unwrap(), vec![d1, d2]);
}

#[tokio::test]
async fn failed_cycle_is_retried_whole_on_next_cycle() {
    let dir = TempDir::new().unwrap();
    let queue = DurableQueue::open(dir.path()).unwrap();
    let (d1, d2, today) = (date("2026-10-16"), date("2026-10-17"), date("2026-10-18"));
    fill(&queue, d1, 5);
    fill(&queue, d2, 3);
    let net = FakeNetwork::online();

    net.set_endpoint(false);
    net.engine().flush(&queue, today).await;
    net.set_endpoint(true);
    let outcome = net.engine().flush(&queue, today).await;

    assert!(outcome.is_drained());
    assert_eq!(net.batch_sizes(), vec![5, 5, 3]);
    assert!(queue.list_pending_dates().unwrap().is_empty());
}

#[tokio::test]
async fn every_record_is_delivered_at_least_once() {
    let dir = TempDir::new().unwrap();
    let queue = DurableQueue::open(dir.path()).unwrap();
    let today = date("2026-10-18");
    fill(&queue, date("2026-10-14"), 4);
    fill(&queue, date("2026-10-15"), 2);
    fill(&queue, today, 6);
    let net = FakeNetwork::online();

    let outcome = net.engine().flush(&queue, today).await;

    assert!(outcome.is_drained());
    let delivered: usize = net.batch_sizes().iter().sum();
    assert_eq!(delivered, 12);
    assert_eq!(outcome.delivered_records(), 12);
    assert!(queue.list_pending_dates().unwrap().is_empty());
}

#[tokio::test]
async fn probe_failure_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let queue = DurableQueue::open(dir.path()).unwrap();
    let today = date("2026-10-18");
    fill(&queue, date("2026-10-17"), 2);
    let net = FakeNetwork::online();
    net.set_probe(false);

    let outcome = net.engine().flush(&queue, today).await;

    assert_eq!(outcome, CycleOutcome::NotAttempted);
    assert!(net.batch_sizes().is_empty());
    assert_eq!(queue.read_all(date("2026-10-17")).unwrap().len(), 2);
}

#[tokio::test]
async fn restart_after_send_before_clear_resends_or_finds_cleared() {
    let dir = TempDir::new().unwrap();
    let today = date("2026-10-18");
    let d1 = date("2026-10-17");

    // First process: the send succeeded but the process died before clear.
    {
        let queue = DurableQueue::open(dir.path()).unwrap();
        fill(&queue, d1, 3);
    }

    // Restarted process resends the whole partition, then clears it.
    let queue = DurableQueue::open(dir.path()).unwrap();
    let net = FakeNetwork::online();
    let outcome = net.engine().flush(&queue, today).await;
    assert!(outcome.is_drained());
    assert_eq!(net.batch_sizes(), vec![3]);

    // A clear that finds nothing left is not an error.
    assert!(!queue.clear(d1).unwrap());
    let again = net.engine().flush(&queue, today).await;
    assert!(again.is_drained());
    assert_eq!(net.batch_sizes(), vec![3]);
}

#[tokio::test]
async fn corrupt_partition_is_isolated_and_kept_for_recovery() {
    let dir = TempDir::new().unwrap();
    let queue = DurableQueue::open(dir.path()).unwrap();
    let today = date("2026-10-18");
    fill(&queue, date("2026-10-15"), 2);
    std::fs::write(queue.partition_path(date("2026-10-16")), b"\x00\x01 truncated").unwrap();
    fill(&queue, date("2026-10-17"), 1);
    let net = FakeNetwork::online();

    let outcome = net.engine().flush(&queue, today).await;

    assert!(outcome.is_drained());
    let outcomes: Vec<AttemptOutcome> =
        outcome.attempts().iter().map(|a| a.outcome.clone()).collect();
    assert_eq!(
        outcomes,
        vec![
            AttemptOutcome::Delivered,
            AttemptOutcome::Quarantined,
            AttemptOutcome::Delivered,
            AttemptOutcome::SkippedEmpty,
        ]
    );
    assert_eq!(net.batch_sizes(), vec![2, 1]);
    assert!(queue.list_pending_dates().unwrap().is_empty());

    let quarantined = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("metrics_2026-10-16.json.corrupt-")
        })
        .count();
    assert_eq!(quarantined, 1);
}

#[tokio::test(start_paused = true)]
async fn retention_sweep_runs_with_each_flush() {
    let dir = TempDir::new().unwrap();
    let today = date("2026-10-18");
    {
        let queue = DurableQueue::open(dir.path()).unwrap();
        fill(&queue, date("2026-08-01"), 4);
        fill(&queue, date("2026-10-01"), 2);
    }
    let net = FakeNetwork::online();
    net.set_probe(false);
    let mut scheduler = build_scheduler(dir.path(), &net, 5, 300, today);

    scheduler.tick().await;

    let queue = &scheduler.context().queue;
    assert_eq!(
        queue.list_pending_dates().unwrap(),
        vec![date("2026-10-01"), today]
    );
    assert!(matches!(
        queue.read_all(date("2026-10-01")).unwrap(),
        PartitionRead::Records(ref r) if r.len() == 2
    ));
}
