//! End-to-end cycle scenarios.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tokio::sync::watch;
use tokio::time::Instant;
use tower::ServiceExt;

use funding_monitor::dashboard::build_router;
use funding_monitor::engine::collector::FanOutCollector;
use funding_monitor::engine::publisher::SnapshotPublisher;
use funding_monitor::engine::scheduler::CycleScheduler;
use funding_monitor::engine::scorer::OpportunityScorer;
use funding_monitor::notify::NullNotifier;
use funding_monitor::sources::FundingSource;

use crate::mock_source::MockSource;

const TIMEOUT: Duration = Duration::from_secs(5);

fn scheduler(
    sources: Vec<Arc<dyn FundingSource>>,
    interval: Duration,
) -> (CycleScheduler, Arc<SnapshotPublisher>) {
    let publisher = Arc::new(SnapshotPublisher::new());
    let scheduler = CycleScheduler::new(
        FanOutCollector::new(sources, TIMEOUT).unwrap(),
        OpportunityScorer::default(),
        Arc::clone(&publisher),
        Arc::new(NullNotifier),
        interval,
    );
    (scheduler, publisher)
}

#[tokio::test(start_paused = true)]
async fn test_same_instrument_across_three_sources() {
    let sources: Vec<Arc<dyn FundingSource>> = vec![
        Arc::new(MockSource::new("alpha", &[("BTCUSDT", 0.05, Some(67000.0))])),
        Arc::new(MockSource::new("beta", &[("BTC_USDT", -0.01, None)])),
        Arc::new(MockSource::new("gamma", &[("btc-usdt-swap", 0.08, None)])),
    ];
    let (mut sched, publisher) = scheduler(sources, Duration::from_secs(1));

    sched.run_cycle().await;
    let snap = publisher.latest().await;

    let rates: Vec<f64> = snap.opportunities.iter().map(|o| o.rate).collect();
    assert_eq!(rates, vec![0.08, 0.05]);
    assert_eq!(snap.opportunities[0].source, "gamma");
    assert_eq!(snap.opportunities[0].price_display, "N/A");
    assert_eq!(snap.opportunities[1].price_display, "$67000");
    assert_eq!(snap.opportunities[1].annualized_rate, 0.05 * 1095.0);
    assert!(snap.opportunities.iter().all(|o| o.instrument == "BTC"));
    assert_eq!(snap.metadata.total_instruments_scanned, 1);
    assert_eq!(snap.metadata.distinct_sources_represented, 2);
    assert_eq!(snap.metadata.dominant_source.as_deref(), Some("gamma"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_and_timed_out_sources_do_not_skip_cycle() {
    let sources: Vec<Arc<dyn FundingSource>> = vec![
        Arc::new(MockSource::empty("quiet")),
        Arc::new(MockSource::new("dead", &[("XRPUSDT", 0.9, None)]).with_delay(Duration::from_secs(600))),
        Arc::new(MockSource::new(
            "live",
            &[("ETHUSDT", 0.0002, Some(3500.0)), ("SOLUSDT", -0.0001, None)],
        )),
    ];
    let (mut sched, publisher) = scheduler(sources, Duration::from_secs(1));

    let report = sched.run_cycle().await;
    assert_eq!(report.cycle, 1);
    assert_eq!(report.failed_sources, vec!["dead".to_string()]);

    let snap = publisher.latest().await;
    assert_eq!(snap.metadata.cycle, 1);
    assert_eq!(snap.metadata.total_instruments_scanned, 2);
    assert_eq!(snap.opportunities.len(), 1);
    assert_eq!(snap.opportunities[0].instrument, "ETH");
    assert!(snap.opportunities.iter().all(|o| o.source != "dead"));
}

#[tokio::test(start_paused = true)]
async fn test_one_hung_source_costs_one_timeout() {
    let mut sources: Vec<Arc<dyn FundingSource>> = (0..5)
        .map(|i| {
            let name = format!("venue{i}");
            Arc::new(MockSource::new(&name, &[("BTCUSDT", 0.001 * (i + 1) as f64, None)]))
                as Arc<dyn FundingSource>
        })
        .collect();
    sources.push(Arc::new(
        MockSource::new("hung", &[("DOGEUSDT", 0.5, None)]).with_delay(Duration::from_secs(3600)),
    ));
    let (mut sched, publisher) = scheduler(sources, Duration::from_secs(1));

    let started = Instant::now();
    let report = sched.run_cycle().await;
    let took = started.elapsed();

    assert!(took >= TIMEOUT);
    assert!(took < TIMEOUT * 2, "cycle took {took:?}");
    assert_eq!(report.readings, 5);

    let snap = publisher.latest().await;
    assert_eq!(snap.opportunities.len(), 5);
    assert_eq!(snap.metadata.distinct_sources_represented, 5);
    assert!(snap.opportunities.iter().all(|o| o.source.starts_with("venue")));
}

#[tokio::test(start_paused = true)]
async fn test_total_outage_publishes_empty_and_recovers() {
    let a = Arc::new(MockSource::new("a", &[("BTCUSDT", 0.01, None)]));
    let b = Arc::new(MockSource::new("b", &[("ETHUSDT", 0.02, None)]));
    a.set_error("503");
    b.set_error("connection reset");

    let sources: Vec<Arc<dyn FundingSource>> =
        vec![a.clone() as Arc<dyn FundingSource>, b.clone()];
    let (mut sched, publisher) = scheduler(sources, Duration::from_secs(1));

    let first = sched.run_cycle().await;
    assert_eq!(first.failed_sources.len(), 2);
    let snap = publisher.latest().await;
    assert_eq!(snap.metadata.cycle, 1);
    assert!(snap.opportunities.is_empty());
    assert_eq!(snap.metadata.total_instruments_scanned, 0);

    // Failed sources are simply asked again next cycle.
    a.clear_error();
    b.clear_error();
    sched.run_cycle().await;
    let snap = publisher.latest().await;
    assert_eq!(snap.metadata.cycle, 2);
    assert_eq!(snap.opportunities.len(), 2);
    assert_eq!(snap.opportunities[0].instrument, "ETH");
    assert_eq!(a.calls(), 2);
    assert_eq!(b.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_reading_does_not_drop_batch() {
    let source = MockSource::new("mixed", &[("BTCUSDT", 0.003, None), ("ETHUSDT", 0.001, None)])
        .with_malformed("BROKENUSDT");
    let (mut sched, publisher) = scheduler(
        vec![Arc::new(source) as Arc<dyn FundingSource>],
        Duration::from_secs(1),
    );

    let report = sched.run_cycle().await;
    assert_eq!(report.readings, 3);

    let snap = publisher.latest().await;
    assert_eq!(snap.metadata.total_instruments_scanned, 2);
    let names: Vec<&str> = snap.opportunities.iter().map(|o| o.instrument.as_str()).collect();
    assert_eq!(names, vec!["BTC", "ETH"]);
}

#[tokio::test(start_paused = true)]
async fn test_loop_runs_until_shutdown() {
    let source = Arc::new(MockSource::new("steady", &[("BTCUSDT", 0.0001, None)]));
    let (mut sched, publisher) = scheduler(
        vec![source.clone() as Arc<dyn FundingSource>],
        Duration::from_secs(10),
    );
    let (tx, rx) = watch::channel(false);

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(35)).await;
        tx.send(true).unwrap();
    });

    sched.run(rx).await.unwrap();
    stopper.await.unwrap();

    // Cycles start at t = 0, 10, 20, 30; the stop at t = 35 cuts the fourth sleep.
    assert_eq!(source.calls(), 4);
    assert_eq!(publisher.latest().await.metadata.cycle, 4);
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_serves_published_cycle() {
    let sources: Vec<Arc<dyn FundingSource>> = vec![
        Arc::new(MockSource::new("alpha", &[("BTCUSDT", 0.0004, Some(67000.5))])),
        Arc::new(MockSource::new("beta", &[("ETHUSDT", 0.0002, None)])),
    ];
    let (mut sched, publisher) = scheduler(sources, Duration::from_secs(1));
    sched.run_cycle().await;

    let app = build_router(Arc::clone(&publisher));
    let resp = app
        .oneshot(Request::builder().uri("/api/data").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["metadata"]["cycle"], 1);
    assert_eq!(json["metadata"]["opportunity_count"], 2);
    assert_eq!(json["opportunities"][0]["instrument"], "BTC");
    assert_eq!(json["opportunities"][0]["price"], "$67000.5");
    assert_eq!(json["opportunities"][1]["price"], "N/A");
}
