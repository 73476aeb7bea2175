//! The slot ring, the arena bump allocator, and their blocking coordination.
//!
//! The queue fuses three pieces that stay consistent only because a single
//! mutex serializes every transition:
//! * a ring of N slots with two absolute cursors (`tail_slot`/`head_slot`),
//!   allowing out-of-order commit but strictly in-order retirement;
//! * a circular bump allocator over B arena bytes (`tail_bytes`/`head_bytes`)
//!   whose free extent is governed by the oldest not-yet-retired slot;
//! * one condition variable broadcast whenever a state change could unblock
//!   any waiter.

use crate::error::{QueueError, QueueResult};
use crate::message::Message;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum SlotState {
    /// Not allocated, or released; retirable.
    #[default]
    Free,
    /// Allocated, not yet committed; region mutably owned by its producer.
    Writing,
    /// Published with the given payload length; region readable.
    Committed(usize),
    /// Abandoned by its producer; region dead; retirable.
    Cancelled,
    /// Claimed by a consumer; region immutably owned by that consumer.
    Reading,
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    /// Absolute, never-wrapping arena offset of the slot's region.
    start: u64,
    state: SlotState,
}

struct Shared {
    slots: Box<[Slot]>,
    /// Oldest not-yet-retired slot (absolute).
    tail_slot: u64,
    /// Next slot to allocate (absolute).
    head_slot: u64,
    /// Arena size in bytes; 0 means slot-only mode.
    capacity_bytes: u64,
    /// Start of the oldest live region (absolute).
    tail_bytes: u64,
    /// Bump pointer (absolute).
    head_bytes: u64,
    closed: bool,
}

impl Shared {
    fn reset(&mut self, slot_count: usize, arena_len: usize) {
        if self.slots.len() == slot_count {
            self.slots.fill(Slot::default());
        } else {
            self.slots = vec![Slot::default(); slot_count].into_boxed_slice();
        }
        self.tail_slot = 0;
        self.head_slot = 0;
        self.capacity_bytes = arena_len as u64;
        self.tail_bytes = 0;
        self.head_bytes = 0;
        self.closed = false;
    }
}

/// Shape of a queue: ring and arena dimensions plus the identifier policy.
#[derive(Clone, Copy, Debug)]
pub struct QueueConfig {
    /// Number of slots; must be a positive multiple of 4.
    pub slot_count: usize,
    /// Arena size in bytes; must be a multiple of 16, 0 for slot-only mode.
    pub arena_len: usize,
    /// Return absolute, never-wrapping slot identifiers instead of modular
    /// ones, so callers can correlate messages with external monotonic
    /// counters. Every operation taking an identifier accepts both forms.
    pub full_ids: bool,
}

impl QueueConfig {
    /// Configuration with modular identifiers (the default policy).
    pub fn new(slot_count: usize, arena_len: usize) -> Self {
        Self {
            slot_count,
            arena_len,
            full_ids: false,
        }
    }

    /// Switches the queue to absolute slot identifiers.
    pub fn with_full_ids(mut self) -> Self {
        self.full_ids = true;
        self
    }
}

/// Cursor snapshot reported by [`Queue::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Oldest not-yet-retired slot (absolute).
    pub tail_slot: u64,
    /// Next slot to allocate (absolute).
    pub head_slot: u64,
    /// Start of the oldest live arena region (absolute).
    pub tail_bytes: u64,
    /// Arena bump pointer (absolute).
    pub head_bytes: u64,
}

impl QueueStats {
    /// Number of slots in any non-retired state.
    pub fn outstanding_slots(&self) -> u64 {
        self.head_slot - self.tail_slot
    }

    /// Arena bytes currently held by live regions (padding included).
    pub fn used_bytes(&self) -> u64 {
        self.head_bytes - self.tail_bytes
    }
}

/// Bounded, lock-coordinated buffer queue.
///
/// Producers call [`Queue::allocate`] (or the batched variant), fill the
/// returned byte range in the caller-owned arena, then [`Queue::commit`] the
/// written size or [`Queue::cancel`] the reservation. Consumers call
/// [`Queue::consume`], read the range, and [`Queue::done`] it. Consumption may
/// skip over slots still being written, but retirement is strictly FIFO in
/// allocation order, which is what keeps every live region stable.
///
/// All operations are serialized by one internal mutex; `allocate` and
/// `consume` optionally block on one condition variable. There is no
/// intrinsic cancellation for blocked callers — [`Queue::close`] is the only
/// way to wake them for good.
pub struct Queue {
    shared: Mutex<Shared>,
    cond: Condvar,
    full_ids: bool,
}

impl Queue {
    /// Creates a queue with `slot_count` slots over `arena_len` arena bytes.
    ///
    /// # Panics
    ///
    /// Panics unless `slot_count` is a positive multiple of 4 and `arena_len`
    /// a multiple of 16 (0 selects slot-only mode).
    pub fn new(slot_count: usize, arena_len: usize) -> Self {
        Self::with_config(QueueConfig::new(slot_count, arena_len))
    }

    /// Creates a queue from an explicit configuration.
    ///
    /// # Panics
    ///
    /// Same dimension requirements as [`Queue::new`].
    pub fn with_config(config: QueueConfig) -> Self {
        validate_dims(config.slot_count, config.arena_len);
        Self {
            shared: Mutex::new(Shared {
                slots: vec![Slot::default(); config.slot_count].into_boxed_slice(),
                tail_slot: 0,
                head_slot: 0,
                capacity_bytes: config.arena_len as u64,
                tail_bytes: 0,
                head_bytes: 0,
                closed: false,
            }),
            cond: Condvar::new(),
            full_ids: config.full_ids,
        }
    }

    /// Re-initializes the queue with new dimensions.
    ///
    /// The queue must be quiescent: no thread may be blocked in `allocate` or
    /// `consume` when this is called. Outstanding reservations are dropped and
    /// their identifiers become meaningless.
    ///
    /// # Panics
    ///
    /// Same dimension requirements as [`Queue::new`].
    pub fn reset(&self, slot_count: usize, arena_len: usize) {
        validate_dims(slot_count, arena_len);
        self.shared.lock().reset(slot_count, arena_len);
    }

    /// [`Queue::reset`] with the previously configured dimensions.
    pub fn reset_same(&self) {
        let mut shared = self.shared.lock();
        let slot_count = shared.slots.len();
        let arena_len = shared.capacity_bytes as usize;
        shared.reset(slot_count, arena_len);
    }

    /// Reserves one slot and one contiguous arena region of `size` bytes.
    ///
    /// `align` is rounded up to the next power of two (0 means none); the
    /// region never straddles the arena end — the allocator skips to the next
    /// arena boundary instead. With `blocking` set the call waits for slot and
    /// arena capacity; otherwise insufficient capacity yields
    /// [`QueueError::WouldBlock`] with no queue state modified. Once the queue
    /// is closed every allocation fails with [`QueueError::Closed`].
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds the arena capacity (such a request could never
    /// be satisfied and indicates a bug in the caller).
    pub fn allocate(&self, size: usize, align: usize, blocking: bool) -> QueueResult<Message> {
        let align = round_align(align);
        let mut shared = self.shared.lock();
        self.allocate_locked(&mut shared, size, align, blocking)
    }

    /// Batched [`Queue::allocate`]: fills `out` with up to `out.len()`
    /// reservations of the same size and alignment.
    ///
    /// Only the first reservation honors `blocking`; the rest are
    /// opportunistic. Returns the number reserved; an error is returned only
    /// when the first attempt already failed, so a successful call never
    /// swallows reservations — drain them with [`Queue::commit_n`].
    pub fn allocate_n(
        &self,
        size: usize,
        align: usize,
        blocking: bool,
        out: &mut [Message],
    ) -> QueueResult<usize> {
        let align = round_align(align);
        let mut shared = self.shared.lock();

        let mut n = 0;
        while n < out.len() {
            match self.allocate_locked(&mut shared, size, align, blocking && n == 0) {
                Ok(message) => {
                    out[n] = message;
                    n += 1;
                }
                Err(_) if n > 0 => break,
                Err(err) => return Err(err),
            }
        }

        Ok(n)
    }

    /// Publishes the final written size for a previously allocated slot and
    /// wakes consumers.
    ///
    /// Committing a slot that is no longer in the writing state is a no-op,
    /// which makes defer-style double commits safe.
    ///
    /// # Panics
    ///
    /// Panics if `len` makes the region overrun the next slot's start (or the
    /// bump pointer for the youngest slot).
    pub fn commit(&self, msg: u64, len: usize) {
        let mut shared = self.shared.lock();
        self.commit_locked(&mut shared, msg, len);
    }

    /// Abandons a previously allocated slot; no consumer will ever see it.
    ///
    /// Cancelling the youngest slot rewinds the arena bump pointer across the
    /// whole run of trailing cancelled slots; the reclaimed capacity is
    /// published before any waiter is woken. Ring positions and absolute
    /// identifiers never rewind: the cancelled slot keeps its place until the
    /// retire scan passes it, so a `full_ids` identifier is never reissued.
    /// Cancelling a slot that is no longer writing is a no-op.
    pub fn cancel(&self, msg: u64) {
        let mut shared = self.shared.lock();
        self.cancel_locked(&mut shared, msg);
    }

    /// Batched commit: entries flagged via [`Message::cancel`] are cancelled,
    /// all others commit their current length (`end − start`).
    pub fn commit_n(&self, batch: &[Message]) {
        let mut shared = self.shared.lock();
        for message in batch {
            if message.is_cancelled() {
                self.cancel_locked(&mut shared, message.msg());
            } else {
                self.commit_locked(&mut shared, message.msg(), message.len());
            }
        }
    }

    /// Claims the oldest committed slot for reading.
    ///
    /// Slots still being written are skipped, so delivery may be out of
    /// order; retirement never is. Returns [`QueueError::Closed`] once the
    /// queue is closed and fully drained, [`QueueError::WouldBlock`] when
    /// nothing is committed and `blocking` is unset.
    pub fn consume(&self, blocking: bool) -> QueueResult<Message> {
        let mut shared = self.shared.lock();
        self.consume_locked(&mut shared, blocking)
    }

    /// Batched [`Queue::consume`] with the same first-blocking policy as
    /// [`Queue::allocate_n`]. Drain claimed messages with [`Queue::done_n`].
    pub fn consume_n(&self, blocking: bool, out: &mut [Message]) -> QueueResult<usize> {
        let mut shared = self.shared.lock();

        let mut n = 0;
        while n < out.len() {
            match self.consume_locked(&mut shared, blocking && n == 0) {
                Ok(message) => {
                    out[n] = message;
                    n += 1;
                }
                Err(_) if n > 0 => break,
                Err(err) => return Err(err),
            }
        }

        Ok(n)
    }

    /// Releases a consumed slot. The caller must not touch the region's bytes
    /// after this call.
    pub fn done(&self, msg: u64) {
        let mut shared = self.shared.lock();
        release(&mut shared, msg);
        if retire(&mut shared) {
            self.cond.notify_all();
        }
    }

    /// Batched [`Queue::done`]; runs a single retire scan for the whole batch.
    /// An empty batch is a no-op.
    pub fn done_n(&self, batch: &[Message]) {
        if batch.is_empty() {
            return;
        }

        let mut shared = self.shared.lock();
        for message in batch {
            release(&mut shared, message.msg());
        }
        if retire(&mut shared) {
            self.cond.notify_all();
        }
    }

    /// Closes the queue and wakes every waiter.
    ///
    /// Subsequent allocations fail with [`QueueError::Closed`]; consumption
    /// keeps succeeding until the committed backlog drains.
    pub fn close(&self) {
        let mut shared = self.shared.lock();
        shared.closed = true;
        self.cond.notify_all();
    }

    /// True once [`Queue::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Reduces a slot identifier to its ring index, for callers indexing a
    /// parallel metadata array. Accepts modular and absolute identifiers.
    pub fn slot_index(&self, msg: u64) -> usize {
        let shared = self.shared.lock();
        (msg % shared.slots.len() as u64) as usize
    }

    /// Snapshot of the four absolute cursors.
    pub fn stats(&self) -> QueueStats {
        let shared = self.shared.lock();
        QueueStats {
            tail_slot: shared.tail_slot,
            head_slot: shared.head_slot,
            tail_bytes: shared.tail_bytes,
            head_bytes: shared.head_bytes,
        }
    }

    /// Number of committed slots not yet claimed by a consumer.
    pub fn committed_len(&self) -> usize {
        let shared = self.shared.lock();
        let slot_count = shared.slots.len() as u64;
        (shared.tail_slot..shared.head_slot)
            .filter(|pos| {
                matches!(
                    shared.slots[(pos % slot_count) as usize].state,
                    SlotState::Committed(_)
                )
            })
            .count()
    }

    fn allocate_locked(
        &self,
        shared: &mut MutexGuard<'_, Shared>,
        size: usize,
        align: u64,
        blocking: bool,
    ) -> QueueResult<Message> {
        assert!(
            size as u64 <= shared.capacity_bytes,
            "allocation of {size} bytes exceeds arena capacity {}",
            shared.capacity_bytes
        );

        loop {
            if shared.closed {
                return Err(QueueError::Closed);
            }

            let slot_count = shared.slots.len() as u64;
            let capacity = shared.capacity_bytes;

            // Alignment and wrap padding are staged on a scratch cursor and
            // published only on success; a failed attempt leaves the queue
            // untouched. Recomputed on every retry: the bump pointer may have
            // been rewound by a cancellation while we waited.
            let mut head = shared.head_bytes;
            if align != 0 && head % align != 0 {
                head += align - head % align;
            }
            if capacity != 0 && head % capacity + size as u64 > capacity {
                head += capacity - head % capacity;
            }

            let have_slot = shared.head_slot - shared.tail_slot < slot_count;
            let have_bytes = head + size as u64 <= shared.tail_bytes + capacity;

            if !(have_slot && have_bytes) {
                if !blocking {
                    return Err(QueueError::WouldBlock);
                }
                self.cond.wait(shared);
                continue;
            }

            let index = (shared.head_slot % slot_count) as usize;
            let msg = if self.full_ids {
                shared.head_slot
            } else {
                index as u64
            };

            shared.slots[index] = Slot {
                start: head,
                state: SlotState::Writing,
            };
            shared.head_slot += 1;
            shared.head_bytes = head + size as u64;

            let start = if capacity == 0 {
                0
            } else {
                (head % capacity) as usize
            };

            return Ok(Message::new(msg, start, start + size));
        }
    }

    fn commit_locked(&self, shared: &mut Shared, msg: u64, len: usize) {
        let slot_count = shared.slots.len() as u64;
        let index = (msg % slot_count) as usize;
        if shared.slots[index].state != SlotState::Writing {
            return;
        }

        let pos = live_position(shared, index);
        let start = shared.slots[index].start;
        let bound = if pos + 1 == shared.head_slot {
            shared.head_bytes
        } else {
            shared.slots[((pos + 1) % slot_count) as usize].start
        };
        assert!(
            start + len as u64 <= bound,
            "commit of {len} bytes overruns the reserved region"
        );

        shared.slots[index].state = SlotState::Committed(len);
        self.cond.notify_all();
    }

    fn cancel_locked(&self, shared: &mut Shared, msg: u64) {
        let slot_count = shared.slots.len() as u64;
        let index = (msg % slot_count) as usize;
        if shared.slots[index].state != SlotState::Writing {
            return;
        }

        shared.slots[index].state = SlotState::Cancelled;

        // A cancelled slot keeps its ring position until the retire scan
        // passes it (positions and absolute identifiers never rewind), but a
        // cancelled tail hands its arena bytes back immediately: walk the run
        // of trailing cancelled slots and rewind the bump pointer to the
        // oldest of their starts. Must complete before the broadcast below so
        // a woken allocator observes the freed capacity.
        let before = shared.head_bytes;
        let mut pos = shared.head_slot;
        while pos > shared.tail_slot {
            let slot = shared.slots[((pos - 1) % slot_count) as usize];
            if slot.state != SlotState::Cancelled {
                break;
            }
            shared.head_bytes = slot.start;
            pos -= 1;
        }
        let reclaimed = shared.head_bytes != before;

        if retire(shared) || reclaimed {
            self.cond.notify_all();
        }
    }

    fn consume_locked(
        &self,
        shared: &mut MutexGuard<'_, Shared>,
        blocking: bool,
    ) -> QueueResult<Message> {
        loop {
            let slot_count = shared.slots.len() as u64;
            let capacity = shared.capacity_bytes;

            let mut pos = shared.tail_slot;
            while pos < shared.head_slot {
                let index = (pos % slot_count) as usize;
                if let SlotState::Committed(len) = shared.slots[index].state {
                    shared.slots[index].state = SlotState::Reading;

                    let msg = if self.full_ids { pos } else { index as u64 };
                    let start = if capacity == 0 {
                        0
                    } else {
                        (shared.slots[index].start % capacity) as usize
                    };

                    return Ok(Message::new(msg, start, start + len));
                }
                pos += 1;
            }

            if shared.tail_slot == shared.head_slot && shared.closed {
                return Err(QueueError::Closed);
            }
            if !blocking {
                return Err(QueueError::WouldBlock);
            }
            self.cond.wait(shared);
        }
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        let slot_count = shared.slots.len() as u64;

        let mut states = String::with_capacity((shared.head_slot - shared.tail_slot) as usize);
        for pos in shared.tail_slot..shared.head_slot {
            states.push(match shared.slots[(pos % slot_count) as usize].state {
                SlotState::Free => '.',
                SlotState::Writing => 'w',
                SlotState::Committed(_) => 'c',
                SlotState::Cancelled => 'x',
                SlotState::Reading => 'r',
            });
        }

        f.debug_struct("Queue")
            .field("slots", &(shared.tail_slot..shared.head_slot))
            .field("bytes", &(shared.tail_bytes..shared.head_bytes))
            .field("closed", &shared.closed)
            .field("states", &states)
            .finish()
    }
}

fn validate_dims(slot_count: usize, arena_len: usize) {
    assert!(
        slot_count > 0 && slot_count % 4 == 0,
        "slot count {slot_count} must be a positive multiple of 4"
    );
    assert!(
        arena_len % 16 == 0,
        "arena length {arena_len} must be a multiple of 16"
    );
}

fn round_align(align: usize) -> u64 {
    if align == 0 {
        0
    } else {
        align.next_power_of_two() as u64
    }
}

/// Absolute position of the live slot backed by `index`.
///
/// Only meaningful for slots in the writing state: anything outside
/// `[tail_slot, head_slot)` has been retired to `Free` or `Cancelled`.
fn live_position(shared: &Shared, index: usize) -> u64 {
    let slot_count = shared.slots.len() as u64;
    let base = shared.tail_slot - shared.tail_slot % slot_count;
    let mut pos = base + index as u64;
    if pos < shared.tail_slot {
        pos += slot_count;
    }
    debug_assert!(
        pos < shared.head_slot,
        "slot {index} is not live (cursors {}..{})",
        shared.tail_slot,
        shared.head_slot
    );
    pos
}

fn release(shared: &mut Shared, msg: u64) {
    let index = (msg % shared.slots.len() as u64) as usize;
    debug_assert!(
        shared.slots[index].state == SlotState::Reading,
        "done on a slot that was never consumed"
    );
    shared.slots[index].state = SlotState::Free;
}

/// Advances the ring tail over retirable slots and recomputes the arena tail.
///
/// Returns true when the tail moved, i.e. when slot and arena capacity became
/// available for blocked allocators.
fn retire(shared: &mut Shared) -> bool {
    let slot_count = shared.slots.len() as u64;
    let from = shared.tail_slot;

    while shared.tail_slot < shared.head_slot {
        let index = (shared.tail_slot % slot_count) as usize;
        match shared.slots[index].state {
            SlotState::Free | SlotState::Cancelled => {
                shared.slots[index].state = SlotState::Free;
                shared.tail_slot += 1;
            }
            _ => break,
        }
    }

    shared.tail_bytes = if shared.tail_slot == shared.head_slot {
        shared.head_bytes
    } else {
        shared.slots[(shared.tail_slot % slot_count) as usize].start
    };

    shared.tail_slot != from
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Slot-only mode: two-at-a-time batched production retires in exactly
    /// the metadata order the producer recorded.
    #[test]
    fn slot_only_fifo_order() {
        let q = Queue::new(16, 0);
        let mut meta = [0usize; 16];
        let mut batch = [Message::default(); 2];

        for group in 0..5usize {
            let n = q.allocate_n(0, 0, false, &mut batch).expect("reserve pair");
            assert_eq!(n, 2);
            for (j, message) in batch.iter().enumerate() {
                meta[q.slot_index(message.msg())] = (group * 2 + j) * 7;
            }
            q.commit_n(&batch);
        }

        q.close();

        let mut seen = Vec::new();
        loop {
            match q.consume_n(false, &mut batch) {
                Ok(n) => {
                    for message in &batch[..n] {
                        seen.push(meta[q.slot_index(message.msg())]);
                    }
                    q.done_n(&batch[..n]);
                }
                Err(QueueError::Closed) => break,
                Err(err) => panic!("consume: {err}"),
            }
        }

        let expected: Vec<usize> = (0..10).map(|i| i * 7).collect();
        assert_eq!(seen, expected);
    }

    /// An aligned request that no longer fits before the arena end must skip
    /// to the next boundary, landing at offset 0 of the following cycle.
    #[test]
    fn alignment_forces_wrap() {
        let q = Queue::new(4, 16);

        let first = q.allocate(15, 16, false).expect("first reservation");
        assert_eq!(first.range(), 0..15);
        q.commit(first.msg(), 15);

        // The padded request charges a full extra cycle, which the arena
        // cannot hold while the first region is live.
        assert_eq!(q.allocate(15, 16, false).unwrap_err(), QueueError::WouldBlock);

        let claimed = q.consume(false).expect("claim first region");
        assert_eq!(claimed.range(), 0..15);
        q.done(claimed.msg());

        let second = q.allocate(15, 16, false).expect("second reservation");
        assert_eq!(second.start(), 0, "region must wrap to the arena start");

        let stats = q.stats();
        assert_eq!(stats.head_bytes, 16 + 15, "absolute cursor keeps growing");
    }

    /// Cancelling the youngest slot must hand its arena bytes back while an
    /// older region is still live.
    #[test]
    fn cancel_rewinds_youngest() {
        let q = Queue::new(4, 64);

        let a = q.allocate(20, 0, false).expect("reserve a");
        let b = q.allocate(20, 0, false).expect("reserve b");
        assert_eq!(q.stats().head_bytes, 40);

        q.cancel(b.msg());
        assert_eq!(
            q.stats().head_bytes,
            20,
            "bump pointer must rewind over the cancelled tail"
        );

        let big = q
            .allocate(44, 0, false)
            .expect("reclaimed tail capacity must be allocatable");
        assert_eq!(big.range(), 20..64);

        q.commit(a.msg(), 20);
    }

    /// A middle cancellation leaves the bump pointer alone; a subsequent tail
    /// cancellation cascades through it.
    #[test]
    fn cancel_cascades_over_consecutive_tail() {
        let q = Queue::new(4, 64);

        let a = q.allocate(8, 0, false).expect("reserve a");
        let b = q.allocate(8, 0, false).expect("reserve b");
        let c = q.allocate(8, 0, false).expect("reserve c");

        q.cancel(b.msg());
        assert_eq!(q.stats().head_bytes, 24, "middle cancel must not rewind");

        q.cancel(c.msg());
        let stats = q.stats();
        assert_eq!(stats.head_bytes, 8, "cascade must reclaim b and c");
        assert_eq!(
            stats.head_slot, 3,
            "cancelled slots hold their positions until retired"
        );

        q.commit(a.msg(), 8);
        let claimed = q.consume(false).expect("claim a");
        q.done(claimed.msg());

        let stats = q.stats();
        assert_eq!(
            stats.tail_slot, stats.head_slot,
            "retire scan reclaims the cancelled run"
        );
        assert_eq!(stats.tail_bytes, stats.head_bytes);
    }

    /// A cancelled middle slot is only reclaimed once the retire scan passes
    /// it, together with the finished slot ahead of it.
    #[test]
    fn middle_cancel_retires_with_the_tail() {
        let q = Queue::new(4, 64);

        let a = q.allocate(8, 0, false).expect("reserve a");
        let b = q.allocate(8, 0, false).expect("reserve b");
        let c = q.allocate(8, 0, false).expect("reserve c");

        q.commit(a.msg(), 8);
        q.commit(c.msg(), 8);
        q.cancel(b.msg());
        assert_eq!(q.stats().head_bytes, 24, "b is not the youngest slot");

        let first = q.consume(false).expect("oldest committed slot");
        assert_eq!(first.msg(), a.msg());
        q.done(first.msg());

        let stats = q.stats();
        assert_eq!(stats.tail_slot, 2, "scan must pass a and the cancelled b");
        assert_eq!(stats.tail_bytes, 16);

        let second = q.consume(false).expect("c skips over nothing now");
        assert_eq!(second.msg(), c.msg());
        q.done(second.msg());

        let stats = q.stats();
        assert_eq!(stats.tail_slot, stats.head_slot);
        assert_eq!(stats.tail_bytes, stats.head_bytes);
    }

    /// Committing and consuming the newest slot first must not advance the
    /// retire cursors until the older slots are finished too.
    #[test]
    fn out_of_order_commit_in_order_retire() {
        let q = Queue::new(4, 64);

        let a = q.allocate(8, 0, false).expect("reserve a");
        let b = q.allocate(8, 0, false).expect("reserve b");
        let c = q.allocate(8, 0, false).expect("reserve c");

        q.commit(c.msg(), 8);
        let claimed = q.consume(false).expect("newest committed slot");
        assert_eq!(claimed.msg(), c.msg());
        q.done(claimed.msg());

        let stats = q.stats();
        assert_eq!(stats.tail_slot, 0, "retirement must wait for older slots");
        assert_eq!(stats.tail_bytes, 0);
        assert_eq!(q.consume(false).unwrap_err(), QueueError::WouldBlock);

        q.commit(a.msg(), 8);
        q.commit(b.msg(), 4);

        let first = q.consume(false).expect("oldest committed slot");
        assert_eq!(first.msg(), a.msg());
        q.done(first.msg());

        let second = q.consume(false).expect("next committed slot");
        assert_eq!(second.msg(), b.msg());
        assert_eq!(second.len(), 4);
        q.done(second.msg());

        let stats = q.stats();
        assert_eq!(stats.tail_slot, stats.head_slot);
        assert_eq!(stats.tail_bytes, stats.head_bytes);
    }

    /// Double commit is a no-op: the first published size wins.
    #[test]
    fn commit_is_idempotent() {
        let q = Queue::new(4, 16);

        let a = q.allocate(8, 0, false).expect("reserve");
        q.commit(a.msg(), 4);
        q.commit(a.msg(), 8);
        q.cancel(a.msg());

        let claimed = q.consume(false).expect("slot stays committed");
        assert_eq!(claimed.len(), 4);
        q.done(claimed.msg());
    }

    #[test]
    fn close_refuses_new_reservations_but_drains() {
        let q = Queue::new(4, 16);

        let a = q.allocate(8, 0, false).expect("reserve");
        q.commit(a.msg(), 8);
        q.close();

        assert!(q.is_closed());
        assert_eq!(q.allocate(8, 0, false).unwrap_err(), QueueError::Closed);

        let claimed = q.consume(false).expect("committed backlog drains");
        q.done(claimed.msg());

        assert_eq!(q.consume(false).unwrap_err(), QueueError::Closed);
    }

    #[test]
    fn slot_exhaustion_would_block() {
        let q = Queue::new(4, 0);
        let mut out = [Message::default(); 4];

        assert_eq!(q.allocate_n(0, 0, false, &mut out).expect("fill ring"), 4);
        assert_eq!(q.allocate(0, 0, false).unwrap_err(), QueueError::WouldBlock);
        assert_eq!(q.consume(false).unwrap_err(), QueueError::WouldBlock);
    }

    /// A failed non-blocking attempt must not publish alignment or wrap
    /// padding.
    #[test]
    fn would_block_leaves_cursors_untouched() {
        let q = Queue::new(4, 16);

        let a = q.allocate(10, 0, false).expect("reserve");
        let before = q.stats();

        assert_eq!(q.allocate(10, 8, false).unwrap_err(), QueueError::WouldBlock);
        assert_eq!(q.stats(), before);

        q.commit(a.msg(), 10);
    }

    #[test]
    fn full_ids_stay_monotone_across_wrap() {
        let q = Queue::with_config(QueueConfig::new(4, 0).with_full_ids());

        for expect in 0..10u64 {
            let message = q.allocate(0, 0, false).expect("reserve");
            assert_eq!(message.msg(), expect);
            assert_eq!(q.slot_index(message.msg()), (expect % 4) as usize);

            q.commit(message.msg(), 0);
            let claimed = q.consume(false).expect("claim");
            assert_eq!(claimed.msg(), expect);
            q.done(claimed.msg());
        }
    }

    /// Cancellation burns its absolute identifier instead of recycling it:
    /// the arena bytes come back, the identifier does not.
    #[test]
    fn full_ids_never_reissued_after_cancel() {
        let q = Queue::with_config(QueueConfig::new(4, 64).with_full_ids());

        let a = q.allocate(8, 0, false).expect("reserve a");
        let b = q.allocate(8, 0, false).expect("reserve b");
        assert_eq!((a.msg(), b.msg()), (0, 1));

        q.cancel(b.msg());
        let c = q.allocate(8, 0, false).expect("reserve c");
        assert_eq!(c.msg(), 2, "cancelled identifier must not be reissued");
        assert_eq!(c.range(), 8..16, "but its arena bytes are reclaimed");

        q.commit(a.msg(), 8);
        q.commit(c.msg(), 8);

        let first = q.consume(false).expect("oldest committed slot");
        assert_eq!(first.msg(), 0);
        q.done(first.msg());

        let second = q.consume(false).expect("next committed slot");
        assert_eq!(second.msg(), 2);
        q.done(second.msg());

        let stats = q.stats();
        assert_eq!(stats.tail_slot, stats.head_slot);
    }

    #[test]
    fn empty_batches_are_noops() {
        let q = Queue::new(4, 16);

        q.commit_n(&[]);
        q.done_n(&[]);
        assert_eq!(q.allocate_n(4, 0, false, &mut []).expect("empty out"), 0);
        assert_eq!(q.stats(), QueueStats::default());
    }

    #[test]
    fn reset_restores_fresh_dimensions() {
        let q = Queue::new(4, 16);

        let a = q.allocate(8, 0, false).expect("reserve");
        q.commit(a.msg(), 8);
        q.close();

        q.reset_same();
        assert!(!q.is_closed());
        assert_eq!(q.stats(), QueueStats::default());

        let b = q.allocate(8, 0, false).expect("fresh queue accepts work");
        assert_eq!(b.start(), 0);

        q.reset(8, 32);
        assert_eq!(q.stats(), QueueStats::default());
        let c = q.allocate(32, 0, false).expect("new arena length in effect");
        assert_eq!(c.range(), 0..32);
    }

    /// Sustained single-threaded churn: cursors advance forever, nothing
    /// leaks, every region keeps its committed length.
    #[test]
    fn churn_reuses_slots_and_bytes() {
        let q = Queue::new(8, 64);

        for i in 0..10_000u64 {
            let message = q.allocate(9, 4, false).expect("reserve");
            q.commit(message.msg(), 9);

            let claimed = q.consume(false).expect("claim");
            assert_eq!(claimed.len(), 9);
            q.done(claimed.msg());

            let stats = q.stats();
            assert_eq!(stats.head_slot, i + 1);
            assert_eq!(stats.tail_slot, stats.head_slot);
            assert_eq!(stats.tail_bytes, stats.head_bytes);
        }
    }

    #[test]
    fn committed_len_counts_unclaimed_slots() {
        let q = Queue::new(4, 64);

        let a = q.allocate(8, 0, false).expect("reserve a");
        let b = q.allocate(8, 0, false).expect("reserve b");
        assert_eq!(q.committed_len(), 0);

        q.commit(a.msg(), 8);
        q.commit(b.msg(), 8);
        assert_eq!(q.committed_len(), 2);

        let claimed = q.consume(false).expect("claim");
        assert_eq!(q.committed_len(), 1);
        q.done(claimed.msg());
    }

    #[test]
    fn debug_summarises_live_states() {
        let q = Queue::new(4, 16);

        let a = q.allocate(4, 0, false).expect("reserve a");
        let _b = q.allocate(4, 0, false).expect("reserve b");
        q.commit(a.msg(), 4);

        let dump = format!("{q:?}");
        assert!(dump.contains("\"cw\""), "unexpected dump: {dump}");
    }

    #[test]
    #[should_panic(expected = "multiple of 4")]
    fn rejects_unaligned_slot_count() {
        let _ = Queue::new(6, 0);
    }

    #[test]
    #[should_panic(expected = "multiple of 16")]
    fn rejects_unaligned_arena_len() {
        let _ = Queue::new(4, 24);
    }

    #[test]
    #[should_panic(expected = "exceeds arena capacity")]
    fn rejects_oversized_request() {
        let q = Queue::new(4, 16);
        let _ = q.allocate(17, 0, false);
    }

    #[test]
    #[should_panic(expected = "overruns the reserved region")]
    fn oversized_commit_panics() {
        let q = Queue::new(4, 16);
        let a = q.allocate(8, 0, false).expect("reserve");
        q.commit(a.msg(), 9);
    }
}
