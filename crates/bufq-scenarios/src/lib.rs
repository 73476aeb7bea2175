//! Load scenarios driving the buffer queue, plus their verification helpers.
//!
//! Each scenario builds a [`bufq::Queue`] and a [`bufq::Arena`], pushes a
//! configured workload through them — batched and unbatched, single- and
//! multi-threaded — and reports counters a check function can audit:
//! * [`config`] – scenario shapes and their parameter structs.
//! * [`engine`] – the drivers that spawn producers/consumers and collect
//!   reports.
//! * [`stats`] – shared counters behind a [`stats::StatsSink`].
//! * [`checks`] – pass/fail verdicts over drained reports.

pub mod checks;
pub mod config;
pub mod engine;
pub mod stats;

pub use checks::CheckResult;
pub use config::{CloseDrainConfig, ScenarioKind, SlotFifoConfig, StressConfig};
pub use engine::{run, CloseDrainReport, StressReport};
pub use stats::{ArcStatsSink, ScenarioStats, StatsSink};
