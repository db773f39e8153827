//! Container sweep on termination.

use std::sync::Arc;
use std::time::Duration;

use devco::models::WorkspaceState;

use super::test_helpers::harness;

const BUDGET: Duration = Duration::from_secs(2);

fn key(p: &str, w: &str) -> (String, String) {
    (p.to_owned(), w.to_owned())
}

#[tokio::test]
async fn sweep_stops_every_running_workspace() {
    let h = harness();
    h.seed("p1", &["idle"]).await;
    h.seed_running("p1", "w1", "10.0.0.5").await;
    h.seed_running("p2", "w1", "10.0.0.6").await;
    h.orchestrator.begin_shutdown();

    let report = h.orchestrator.sweep(BUDGET).await.expect("sweep");

    assert_eq!(report.stopped, vec![key("p1", "w1"), key("p2", "w1")]);
    assert!(report.failed.is_empty());
    assert_eq!(h.driver.stops(), 2);

    let doc = h.document().await;
    assert!(doc.running().is_empty());
    let ws = doc.workspace("p2", "w1").expect("workspace kept");
    assert_eq!(ws.state, WorkspaceState::BeforeStart);
    assert!(ws.is_consistent());
}

#[tokio::test]
async fn one_failed_stop_does_not_block_the_others() {
    let h = harness();
    h.seed_running("p1", "a", "10.0.0.5").await;
    h.seed_running("p1", "b", "10.0.0.6").await;
    h.seed_running("p1", "c", "10.0.0.7").await;
    h.driver.fail_stop_for.lock().unwrap().insert("ctr-b".into());
    h.orchestrator.begin_shutdown();

    let report = h.orchestrator.sweep(BUDGET).await.expect("sweep");

    assert_eq!(report.stopped, vec![key("p1", "a"), key("p1", "c")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, key("p1", "b"));
    assert_eq!(h.driver.stops(), 3);

    let doc = h.document().await;
    assert_eq!(doc.running(), vec![key("p1", "b")]);
    assert!(!doc.workspace("p1", "a").expect("a").is_running());
    assert!(!doc.workspace("p1", "c").expect("c").is_running());
}

#[tokio::test]
async fn sweep_without_running_workspaces_is_a_no_op() {
    let h = harness();
    h.seed("p1", &["w1"]).await;
    let before = h.document().await;

    let report = h.orchestrator.sweep(BUDGET).await.expect("sweep");

    assert!(report.stopped.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(h.driver.stops(), 0);
    assert_eq!(h.document().await, before);
}

#[tokio::test]
async fn sweep_waits_for_in_flight_launch_and_stops_it() {
    let h = harness();
    h.seed("p1", &["w1"]).await;
    *h.driver.start_delay.lock().unwrap() = Duration::from_millis(200);

    let orchestrator = Arc::clone(&h.orchestrator);
    let launch = tokio::spawn(async move { orchestrator.launch("p1", "w1").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.orchestrator.begin_shutdown();
    let report = h.orchestrator.sweep(BUDGET).await.expect("sweep");

    launch.await.expect("join").expect("launch accepted before shutdown");
    assert_eq!(report.stopped, vec![key("p1", "w1")]);
    assert!(!h.workspace("p1", "w1").await.is_running());
}

#[tokio::test]
async fn busy_workspace_past_the_deadline_is_reported() {
    let h = harness();
    h.seed("p1", &["w1"]).await;
    *h.driver.start_delay.lock().unwrap() = Duration::from_millis(500);

    let orchestrator = Arc::clone(&h.orchestrator);
    let launch = tokio::spawn(async move { orchestrator.launch("p1", "w1").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.orchestrator.begin_shutdown();
    let report = h
        .orchestrator
        .sweep(Duration::from_millis(100))
        .await
        .expect("sweep");

    assert!(report.stopped.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, key("p1", "w1"));
    let _ = launch.await;
}

#[tokio::test]
async fn hanging_stop_still_persists_the_workspaces_already_stopped() {
    let h = harness();
    h.seed_running("p1", "a", "10.0.0.5").await;
    h.seed_running("p1", "b", "10.0.0.6").await;
    h.seed_running("p1", "c", "10.0.0.7").await;
    h.driver.hang_stop_for.lock().unwrap().insert("ctr-b".into());
    let budget = Duration::from_millis(300);

    let report = tokio::time::timeout(budget * 4, h.orchestrator.shutdown(budget))
        .await
        .expect("shutdown returns shortly after its budget")
        .expect("sweep");

    assert!(h.orchestrator.is_shutting_down());
    assert_eq!(report.stopped, vec![key("p1", "a")]);
    let failed: Vec<_> = report.failed.iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(failed, vec![key("p1", "b"), key("p1", "c")]);
    assert!(report.failed[0].1.contains("deadline"));

    let doc = h.document().await;
    let a = doc.workspace("p1", "a").expect("a");
    assert_eq!(a.state, WorkspaceState::BeforeStart);
    assert!(a.container_id.is_empty());
    assert_eq!(doc.running(), vec![key("p1", "b"), key("p1", "c")]);
}
