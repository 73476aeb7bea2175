//! Scenario shapes and their parameters.

/// Slot-only FIFO scenario: batched production into a queue with no arena,
/// verifying that metadata recorded at allocation time drains in allocation
/// order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotFifoConfig {
    pub slot_count: usize,
    /// Number of allocation groups.
    pub groups: usize,
    /// Reservations per group.
    pub batch: usize,
}

impl Default for SlotFifoConfig {
    fn default() -> Self {
        Self {
            slot_count: 16,
            groups: 5,
            batch: 2,
        }
    }
}

/// Mixed parallel stress: single and batched producers race single and
/// batched consumers over one small arena; every message index must be
/// delivered exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StressConfig {
    pub producers: usize,
    pub batch_producers: usize,
    pub consumers: usize,
    pub batch_consumers: usize,
    /// Total messages pushed through the queue.
    pub messages: u32,
    /// Bytes written per message; the first four carry the message index.
    pub payload_len: usize,
    /// Alignment requested for every reservation.
    pub align: usize,
    pub slot_count: usize,
    pub arena_len: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            producers: 10,
            batch_producers: 10,
            consumers: 10,
            batch_consumers: 10,
            messages: 1024,
            payload_len: 15,
            align: 16,
            slot_count: 8,
            arena_len: 12 * 8,
        }
    }
}

/// Producers commit a known message count, then the queue closes while
/// consumers are still blocked; the backlog must drain completely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloseDrainConfig {
    pub producers: usize,
    pub consumers: usize,
    /// Messages committed by each producer.
    pub per_producer: u32,
    pub slot_count: usize,
    pub arena_len: usize,
    pub payload_len: usize,
}

impl Default for CloseDrainConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            consumers: 2,
            per_producer: 64,
            slot_count: 8,
            arena_len: 256,
            payload_len: 16,
        }
    }
}

/// One runnable scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioKind {
    SlotFifo(SlotFifoConfig),
    ParallelStress(StressConfig),
    CloseDrain(CloseDrainConfig),
}

impl ScenarioKind {
    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::SlotFifo(_) => "slot-fifo",
            ScenarioKind::ParallelStress(_) => "parallel-stress",
            ScenarioKind::CloseDrain(_) => "close-drain",
        }
    }
}
