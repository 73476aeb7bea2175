//! Scenario drivers: spawn the configured workers, push the workload through
//! a queue and arena, and collect reports for the check functions.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use bufq::{Arena, Message, Queue, QueueError, QueueStats};
use tracing::debug;

use crate::checks::{self, CheckResult};
use crate::config::{CloseDrainConfig, ScenarioKind, SlotFifoConfig, StressConfig};
use crate::stats::{ScenarioStats, StatsSink};

/// Outcome of [`run_parallel_stress`].
pub struct StressReport {
    pub stats: ScenarioStats,
    /// Per-message delivery counts, indexed by message index.
    pub read_counts: Vec<u32>,
    /// Queue cursors after the drain; everything must have retired.
    pub final_stats: QueueStats,
}

/// Outcome of [`run_close_drain`].
pub struct CloseDrainReport {
    pub produced: u32,
    pub consumed: u32,
}

/// Runs a scenario and applies its check in one step.
pub fn run<S: StatsSink>(kind: &ScenarioKind, sink: &S) -> CheckResult {
    debug!(scenario = kind.name(), "starting");
    match kind {
        ScenarioKind::SlotFifo(config) => {
            let delivered = run_slot_fifo(config, sink);
            checks::verify_slot_fifo(&delivered, config.groups * config.batch)
        }
        ScenarioKind::ParallelStress(config) => {
            let report = run_parallel_stress(config, sink);
            checks::verify_stress(&report, config)
        }
        ScenarioKind::CloseDrain(config) => {
            let report = run_close_drain(config, sink);
            checks::verify_drained(&report)
        }
    }
}

/// Batched production into a slot-only queue; returns the metadata values in
/// the order they drained.
pub fn run_slot_fifo<S: StatsSink>(config: &SlotFifoConfig, sink: &S) -> Vec<usize> {
    let q = Queue::new(config.slot_count, 0);
    let mut meta = vec![0usize; config.slot_count];
    let mut batch = vec![Message::default(); config.batch];

    for group in 0..config.groups {
        let n = q
            .allocate_n(0, 0, false, &mut batch)
            .expect("slot-only queue has capacity for every group");
        assert_eq!(n, config.batch, "group {group} came back short");

        for (j, message) in batch[..n].iter().enumerate() {
            meta[q.slot_index(message.msg())] = group * config.batch + j;
        }
        q.commit_n(&batch[..n]);
        sink.with_stats(|stats| stats.produced += n as u32);
    }

    q.close();

    let mut delivered = Vec::with_capacity(config.groups * config.batch);
    loop {
        match q.consume_n(false, &mut batch) {
            Ok(n) => {
                for message in &batch[..n] {
                    delivered.push(meta[q.slot_index(message.msg())]);
                }
                q.done_n(&batch[..n]);
                sink.with_stats(|stats| stats.consumed += n as u32);
            }
            Err(QueueError::Closed) => break,
            Err(err) => panic!("consume_n: {err}"),
        }
    }

    delivered
}

/// Mixed single/batched producers race mixed consumers over one arena.
pub fn run_parallel_stress<S: StatsSink>(config: &StressConfig, sink: &S) -> StressReport {
    assert!(
        config.payload_len >= 4,
        "payload must fit the 4-byte index header"
    );
    assert!(config.messages > 0, "stress scenario needs messages");

    let q = Queue::new(config.slot_count, config.arena_len);
    let arena = Arena::new(config.arena_len);
    let counter = AtomicU32::new(0);
    let read_counts: Vec<AtomicU32> = (0..config.messages).map(|_| AtomicU32::new(0)).collect();

    thread::scope(|scope| {
        let q = &q;
        let arena = &arena;
        let counter = &counter;
        let read_counts = &read_counts;
        let config = *config;

        let mut producers = Vec::new();
        for _ in 0..config.producers {
            let sink = sink.clone();
            producers.push(scope.spawn(move || {
                single_producer(q, arena, counter, config, &sink);
            }));
        }
        for _ in 0..config.batch_producers {
            let sink = sink.clone();
            producers.push(scope.spawn(move || {
                batch_producer(q, arena, counter, config, &sink);
            }));
        }

        let mut consumers = Vec::new();
        for _ in 0..config.consumers {
            let sink = sink.clone();
            consumers.push(scope.spawn(move || {
                single_consumer(q, arena, read_counts, &sink);
            }));
        }
        for _ in 0..config.batch_consumers {
            let sink = sink.clone();
            consumers.push(scope.spawn(move || {
                batch_consumer(q, arena, read_counts, &sink);
            }));
        }

        for producer in producers {
            producer.join().expect("producer thread");
        }
        debug!("producers finished, closing queue");
        q.close();
        for consumer in consumers {
            consumer.join().expect("consumer thread");
        }
    });

    StressReport {
        stats: sink.with_stats(|stats| *stats),
        read_counts: read_counts
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .collect(),
        final_stats: q.stats(),
    }
}

/// A committed backlog must drain completely after close, even for consumers
/// that were already blocked when close landed.
pub fn run_close_drain<S: StatsSink>(config: &CloseDrainConfig, sink: &S) -> CloseDrainReport {
    assert!(
        config.payload_len <= config.arena_len,
        "payload cannot exceed the arena"
    );

    let q = Queue::new(config.slot_count, config.arena_len);
    let arena = Arena::new(config.arena_len);

    thread::scope(|scope| {
        let q = &q;
        let arena = &arena;
        let config = *config;

        let mut consumers = Vec::new();
        for _ in 0..config.consumers {
            let sink = sink.clone();
            consumers.push(scope.spawn(move || loop {
                match q.consume(true) {
                    Ok(message) => {
                        q.done(message.msg());
                        sink.with_stats(|stats| stats.consumed += 1);
                    }
                    Err(QueueError::Closed) => break,
                    Err(err) => panic!("consume: {err}"),
                }
            }));
        }

        let mut producers = Vec::new();
        for _ in 0..config.producers {
            let sink = sink.clone();
            producers.push(scope.spawn(move || {
                for i in 0..config.per_producer {
                    let message = q
                        .allocate(config.payload_len, 0, true)
                        .expect("queue is open while producing");
                    // SAFETY: This thread owns the slot between allocate and
                    // commit.
                    unsafe { arena.region_mut(message.start(), message.end()) }.fill(i as u8);
                    q.commit(message.msg(), config.payload_len);
                }
                sink.with_stats(|stats| stats.produced += config.per_producer);
            }));
        }

        for producer in producers {
            producer.join().expect("producer thread");
        }
        q.close();
        for consumer in consumers {
            consumer.join().expect("consumer thread");
        }
    });

    let stats = sink.with_stats(|stats| *stats);
    CloseDrainReport {
        produced: stats.produced,
        consumed: stats.consumed,
    }
}

fn write_payload(arena: &Arena, message: &Message, x: u32) {
    // SAFETY: The slot is in the writing state and this thread is its
    // producer; the queue keeps the region exclusive until commit.
    let region = unsafe { arena.region_mut(message.start(), message.end()) };
    region[..4].copy_from_slice(&x.to_le_bytes());
    region[4..].fill(x as u8);
}

fn read_payload(arena: &Arena, message: &Message) -> u32 {
    // SAFETY: The slot is in the reading state and this thread is its
    // consumer; the region stays stable until done.
    let region = unsafe { arena.region(message.start(), message.end()) };
    let x = u32::from_le_bytes(region[..4].try_into().expect("payload header"));
    assert!(
        region[4..].iter().all(|b| *b == x as u8),
        "payload body torn for message {x}"
    );
    x
}

fn single_producer<S: StatsSink>(
    q: &Queue,
    arena: &Arena,
    counter: &AtomicU32,
    config: StressConfig,
    sink: &S,
) {
    loop {
        let x = counter.fetch_add(1, Ordering::Relaxed);
        if x >= config.messages {
            break;
        }

        let message = q
            .allocate(config.payload_len, config.align, true)
            .expect("queue is open while producing");
        write_payload(arena, &message, x);
        q.commit(message.msg(), config.payload_len);
        sink.with_stats(|stats| stats.produced += 1);
    }
}

fn batch_producer<S: StatsSink>(
    q: &Queue,
    arena: &Arena,
    counter: &AtomicU32,
    config: StressConfig,
    sink: &S,
) {
    let mut batch = vec![Message::default(); 4];

    loop {
        let n = q
            .allocate_n(config.payload_len, config.align, true, &mut batch)
            .expect("queue is open while producing");
        if n < batch.len() {
            sink.with_stats(|stats| stats.short_batches += 1);
        }

        let first = counter.fetch_add(n as u32, Ordering::Relaxed);
        let mut produced = 0u32;
        let mut cancelled = 0u32;

        for (j, message) in batch[..n].iter_mut().enumerate() {
            let x = first + j as u32;
            if x >= config.messages {
                message.cancel();
                cancelled += 1;
                continue;
            }
            write_payload(arena, message, x);
            message.set_len(config.payload_len);
            produced += 1;
        }
        q.commit_n(&batch[..n]);
        sink.with_stats(|stats| {
            stats.produced += produced;
            stats.cancelled += cancelled;
        });

        if first + n as u32 >= config.messages {
            break;
        }
    }
}

fn single_consumer<S: StatsSink>(q: &Queue, arena: &Arena, read_counts: &[AtomicU32], sink: &S) {
    loop {
        match q.consume(true) {
            Ok(message) => {
                let x = read_payload(arena, &message);
                read_counts[x as usize].fetch_add(1, Ordering::Relaxed);
                q.done(message.msg());
                sink.with_stats(|stats| stats.consumed += 1);
            }
            Err(QueueError::Closed) => break,
            Err(err) => panic!("consume: {err}"),
        }
    }
}

fn batch_consumer<S: StatsSink>(q: &Queue, arena: &Arena, read_counts: &[AtomicU32], sink: &S) {
    let mut batch = vec![Message::default(); 4];

    loop {
        let n = match q.consume_n(true, &mut batch) {
            Ok(n) => n,
            Err(QueueError::Closed) => break,
            Err(err) => panic!("consume_n: {err}"),
        };

        for message in &batch[..n] {
            let x = read_payload(arena, message);
            read_counts[x as usize].fetch_add(1, Ordering::Relaxed);
        }
        q.done_n(&batch[..n]);
        sink.with_stats(|stats| stats.consumed += n as u32);
    }
}
