use market_scan_bot::metrics::ScanMetrics;
use market_scan_bot::scanner::{CellOutcome, GateSkip, SkipReason};
use market_scan_bot::types::{ScanResult, Side, Timeframe};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn signal(confidence: f64) -> CellOutcome {
    CellOutcome::Signal(ScanResult {
        instrument: "EURUSD".into(),
        timeframe: Timeframe::M15,
        side: Side::Buy,
        confidence,
        reference_price: 1.0845,
        take_profit: 1.10619,
        stop_loss: 1.06281,
        position_size: 20.0,
    })
}

#[test]
fn tracks_outcomes_and_rates_per_cell() {
    let metrics = ScanMetrics::new();
    let latency = Duration::from_millis(40);

    metrics.record_cell("EURUSD", Timeframe::M15, &signal(2.0 / 3.0), latency);
    metrics.record_cell("EURUSD", Timeframe::M15, &CellOutcome::NoSignal, latency);
    metrics.record_cell(
        "EURUSD",
        Timeframe::M15,
        &CellOutcome::Skipped(SkipReason::TooShort { len: 3 }),
        latency,
    );
    metrics.record_cell("EURUSD", Timeframe::M15, &CellOutcome::Failed("timeout".into()), latency);

    let stats = metrics.cell("EURUSD", Timeframe::M15).unwrap();
    assert_eq!(stats.outcomes.attempts(), 4);
    assert_eq!(stats.outcomes.evaluated, 2);
    assert_eq!(stats.outcomes.too_short, 1);
    assert_eq!(stats.outcomes.failed, 1);
    assert_eq!(stats.confidence_thirds, [1, 0, 1, 0]);
    assert!((stats.outcomes.signal_rate() - 0.5).abs() < 1e-12);
    assert!((stats.outcomes.failure_rate() - 0.25).abs() < 1e-12);
    assert_eq!(stats.fetch_latency_ms.count(), 4);

    assert!(metrics.cell("EURUSD", Timeframe::H1).is_none());
}

#[test]
fn snapshot_lists_cycles_and_cells() {
    let metrics = ScanMetrics::new();
    metrics.record_cycle(None);
    metrics.record_cycle(Some(&GateSkip::MarketClosed { hour: 23 }));
    metrics.record_cycle(Some(&GateSkip::NoCapital));
    metrics.record_delivery(3, 1);
    metrics.record_cell("BTCUSD", Timeframe::H4, &signal(1.0), Duration::from_millis(5));

    let kv = metrics.snapshot_kv();
    assert_eq!(kv["cycles.completed"], "1");
    assert_eq!(kv["cycles.skipped.market_closed"], "1");
    assert_eq!(kv["cycles.skipped.no_capital"], "1");
    assert_eq!(kv["cycles.skipped.no_subscribers"], "0");
    assert_eq!(kv["messages.sent"], "3");
    assert_eq!(kv["messages.failed"], "1");
    assert_eq!(kv["cell|BTCUSD|4h|attempts"], "1");
    assert_eq!(kv["cell|BTCUSD|4h|signal_rate"], "1.0000");
    assert!(kv.contains_key("cell|BTCUSD|4h|fetch_ms"));
    assert_eq!(metrics.cycles_completed(), 1);
}

#[test]
fn clones_share_counters() {
    let metrics = ScanMetrics::new();
    let handle = metrics.clone();
    handle.record_cycle(None);
    handle.record_cell("DJIA", Timeframe::M1, &CellOutcome::Skipped(SkipReason::Empty), Duration::ZERO);
    assert_eq!(metrics.cycles_completed(), 1);
    assert_eq!(metrics.cell("DJIA", Timeframe::M1).unwrap().outcomes.empty, 1);
}
