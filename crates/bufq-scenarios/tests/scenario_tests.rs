//! End-to-end runs of every packaged scenario through the engine and checks.

use bufq_scenarios::config::{CloseDrainConfig, ScenarioKind, SlotFifoConfig, StressConfig};
use bufq_scenarios::stats::ArcStatsSink;
use bufq_scenarios::{checks, engine};

#[test]
fn slot_fifo_scenario_passes() {
    let config = SlotFifoConfig::default();
    let sink = ArcStatsSink::default();

    engine::run(&ScenarioKind::SlotFifo(config), &sink).expect("scenario verdict");

    let stats = sink.snapshot();
    assert_eq!(stats.produced as usize, config.groups * config.batch);
    assert_eq!(stats.consumed, stats.produced);
}

#[test]
fn parallel_stress_scenario_passes() {
    let config = StressConfig::default();
    let sink = ArcStatsSink::default();

    let report = engine::run_parallel_stress(&config, &sink);
    checks::verify_stress(&report, &config).expect("scenario verdict");
    assert_eq!(report.stats.produced, config.messages);
}

/// A smaller worker pool with an uneven payload still delivers exactly once.
#[test]
fn parallel_stress_small_pool_passes() {
    let config = StressConfig {
        producers: 2,
        batch_producers: 2,
        consumers: 2,
        batch_consumers: 2,
        messages: 256,
        payload_len: 11,
        align: 8,
        slot_count: 4,
        arena_len: 64,
    };
    let sink = ArcStatsSink::default();

    engine::run(&ScenarioKind::ParallelStress(config), &sink).expect("scenario verdict");
}

#[test]
fn close_drain_scenario_passes() {
    let config = CloseDrainConfig::default();
    let sink = ArcStatsSink::default();

    let report = engine::run_close_drain(&config, &sink);
    checks::verify_drained(&report).expect("scenario verdict");
    assert_eq!(
        report.produced,
        (config.producers as u32) * config.per_producer
    );
}

#[test]
#[should_panic(expected = "4-byte index header")]
fn stress_rejects_tiny_payload() {
    let config = StressConfig {
        payload_len: 2,
        ..StressConfig::default()
    };
    let sink = ArcStatsSink::default();
    let _ = engine::run_parallel_stress(&config, &sink);
}
