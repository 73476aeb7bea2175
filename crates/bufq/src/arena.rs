//! Caller-side backing buffer for queue regions.
//!
//! The queue itself never touches bytes: it hands out offsets into a buffer
//! the caller owns. `Arena` is that buffer, allocated as an anonymous `mmap`
//! region on native targets (page aligned, zeroed) with an aligned heap
//! fallback, and shared across producer and consumer threads. The `unsafe`
//! surface is kept to the two range views whose aliasing contract is exactly
//! the queue's region-exclusivity guarantee.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::slice;

/// Base alignment of the backing allocation. Regions inside the arena are
/// aligned by the queue's allocator relative to offset 0, so an aligned base
/// makes those guarantees hold for raw pointers too.
const BASE_ALIGNMENT: usize = 64;

enum Backing {
    Native(#[allow(dead_code)] memmap2::MmapMut),
    Owned { layout: Layout },
}

/// Fixed-size, zero-initialized byte buffer backing every queue region.
///
/// An `Arena` is shared by reference between all producers and consumers of
/// one queue. Range views are handed out through `unsafe` accessors because
/// the arena cannot itself prove exclusivity — that proof is the queue's slot
/// discipline: a producer may write a region between `allocate` and
/// `commit`, a consumer may read it between `consume` and `done`, and nobody
/// else may touch it in between.
pub struct Arena {
    /// Base pointer captured at construction; stays valid because `backing`
    /// keeps the allocation alive and mappings do not move.
    ptr: NonNull<u8>,
    len: usize,
    backing: Backing,
}

// SAFETY: The arena is a plain byte buffer; synchronization of access to
// disjoint regions is delegated to the queue discipline described above.
unsafe impl Send for Arena {}
// SAFETY: See above; `&Arena` only exposes raw range views.
unsafe impl Sync for Arena {}

impl Arena {
    /// Allocates `len` zeroed bytes, preferring an anonymous mapping.
    ///
    /// # Panics
    ///
    /// Panics when the allocation cannot be satisfied at all; running out of
    /// address space for the backing buffer is not a recoverable queue error.
    pub fn new(len: usize) -> Self {
        let zero_layout = Layout::from_size_align(0, BASE_ALIGNMENT).expect("zero layout");
        if len == 0 {
            return Self {
                ptr: NonNull::dangling(),
                len: 0,
                backing: Backing::Owned {
                    layout: zero_layout,
                },
            };
        }

        if let Ok(mut map) = memmap2::MmapOptions::new().len(len).map_anon() {
            let ptr = map.as_mut_ptr();
            if ptr as usize % BASE_ALIGNMENT == 0 {
                return Self {
                    ptr: NonNull::new(ptr).expect("anonymous mapping is never null"),
                    len,
                    backing: Backing::Native(map),
                };
            }
        }

        let layout = Layout::from_size_align(len, BASE_ALIGNMENT).expect("arena layout");
        // SAFETY: `layout` has non-zero size here; null is handled below.
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };

        Self {
            ptr,
            len,
            backing: Backing::Owned { layout },
        }
    }

    /// Total number of bytes in the arena.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the arena has zero length (slot-only queues).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Immutable view of `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics when the range is out of bounds or inverted.
    ///
    /// # Safety
    ///
    /// The caller must hold the slot owning this region in the reading state
    /// (between `consume` and `done`), or otherwise guarantee no concurrent
    /// writer exists for any byte of the range.
    pub unsafe fn region(&self, start: usize, end: usize) -> &[u8] {
        self.check_range(start, end);
        // SAFETY: Bounds checked above; aliasing is the caller's contract.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().add(start), end - start) }
    }

    /// Mutable view of `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics when the range is out of bounds or inverted.
    ///
    /// # Safety
    ///
    /// The caller must hold the slot owning this region in the writing state
    /// (between `allocate` and `commit`); the queue guarantees no other holder
    /// overlaps it, which is what makes the `&self` receiver sound.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn region_mut(&self, start: usize, end: usize) -> &mut [u8] {
        self.check_range(start, end);
        // SAFETY: Bounds checked above; exclusivity is the caller's contract.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().add(start), end - start) }
    }

    fn check_range(&self, start: usize, end: usize) {
        assert!(
            start <= end && end <= self.len,
            "region {start}..{end} out of bounds for arena of {} bytes",
            self.len
        );
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Backing::Owned { layout } = &self.backing {
            if layout.size() != 0 {
                // SAFETY: `ptr`/`layout` come from `alloc_zeroed` above and
                // are released exactly once here.
                unsafe { dealloc(self.ptr.as_ptr(), *layout) };
            }
        }
    }
}
