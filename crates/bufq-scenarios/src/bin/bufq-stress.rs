//! CLI runner for the queue load scenarios.
//!
//! ```text
//! RUST_LOG=debug cargo run --bin bufq-stress -- --scenario stress --messages 4096
//! ```

use anyhow::{bail, Result};
use bufq_scenarios::{
    config::{CloseDrainConfig, ScenarioKind, SlotFifoConfig, StressConfig},
    engine,
    stats::ArcStatsSink,
};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScenarioArg {
    SlotFifo,
    Stress,
    CloseDrain,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive a buffer queue load scenario")]
struct Args {
    /// Scenario to run
    #[arg(long, value_enum, default_value = "stress")]
    scenario: ScenarioArg,

    /// Total messages for the stress scenario
    #[arg(long, default_value_t = 1024)]
    messages: u32,

    /// Payload bytes per message (first four carry the message index)
    #[arg(long, default_value_t = 15)]
    payload: usize,

    /// Alignment requested for every stress reservation
    #[arg(long, default_value_t = 16)]
    align: usize,

    /// Number of times to repeat the scenario
    #[arg(long, default_value_t = 1)]
    repeat: u32,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let kind = match args.scenario {
        ScenarioArg::SlotFifo => ScenarioKind::SlotFifo(SlotFifoConfig::default()),
        ScenarioArg::Stress => ScenarioKind::ParallelStress(StressConfig {
            messages: args.messages,
            payload_len: args.payload,
            align: args.align,
            ..StressConfig::default()
        }),
        ScenarioArg::CloseDrain => ScenarioKind::CloseDrain(CloseDrainConfig::default()),
    };

    for run in 0..args.repeat {
        let sink = ArcStatsSink::default();
        if let Err(report) = engine::run(&kind, &sink) {
            bail!("scenario {} failed on run {run}: {report}", kind.name());
        }

        let stats = sink.snapshot();
        info!(
            run,
            scenario = kind.name(),
            produced = stats.produced,
            consumed = stats.consumed,
            cancelled = stats.cancelled,
            short_batches = stats.short_batches,
            "scenario passed"
        );
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt().with_env_filter(env_filter).try_init();
}
