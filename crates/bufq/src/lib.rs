//! Bounded, lock-coordinated buffer queue.
//!
//! A [`Queue`] multiplexes a fixed pool of message slots and a fixed byte
//! arena between producers and consumers. A producer reserves a slot plus a
//! contiguous byte region, fills the region out-of-band (typically straight
//! from a syscall such as a batched datagram read), then publishes the number
//! of bytes actually written. A consumer claims the oldest committed slot,
//! reads the region, and releases it. Regions are never copied: the queue
//! hands out offsets into a caller-owned buffer and guarantees that every
//! reservation stays stable and uniquely held until it is released.
//!
//! The exported pieces:
//! * [`Queue`] – slot ring, arena bump allocator, and blocking coordination.
//! * [`Message`] – one reservation: slot identifier plus its byte range.
//! * [`Arena`] – caller-side backing buffer with region views scoped by the
//!   queue's exclusivity guarantee.
//! * [`QueueError`] – the two observable failures, [`QueueError::Closed`] and
//!   [`QueueError::WouldBlock`]; everything else is a programming error and
//!   panics at the site of misuse.

mod arena;
mod error;
mod message;
mod queue;

pub use arena::Arena;
pub use error::{QueueError, QueueResult};
pub use message::Message;
pub use queue::{Queue, QueueConfig, QueueStats};
