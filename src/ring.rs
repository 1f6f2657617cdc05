//! Lock-free MPMC ring buffer over two 64-bit slot bitmaps.
//!
//! # Design
//!
//! Sixty-four storage cells are handed between producers and consumers by two
//! atomic bitmap words instead of head/tail indices or per-slot atomics:
//!
//! - `push_free`: bit *i* set means slot *i* may be claimed for writing.
//! - `pop_free`: bit *i* set means slot *i* holds a published value.
//!
//! A producer claims the lowest free bit with a CAS on `push_free`, writes the
//! cell with plain stores, then atomically sets the same bit in `pop_free` to
//! publish. A consumer mirrors this on `pop_free`, reads the cell out, and
//! sets the bit back in `push_free` to release. While a bit is absent from
//! *both* maps the claiming thread owns the cell outright, so the cell itself
//! needs no synchronization.
//!
//! # Invariants
//! - A slot's bit is never set in both maps at once. Each slot is always in
//!   exactly one of: FREE (push-bit), CLAIMED-FOR-WRITE (neither, pusher owns
//!   the cell), READY (pop-bit), CLAIMED-FOR-READ (neither, popper owns it).
//! - No slot is created or destroyed after construction; the four states sum
//!   to 64 at all times.
//!
//! # Ordering rationale
//!
//! ```text
//! Producer writes cell, then SeqCst-toggles pop bit  →  consumer CAS-claims pop bit, then reads cell
//! Consumer reads cell, then SeqCst-toggles push bit  →  producer CAS-claims push bit, then writes cell
//! ```
//!
//! The publish/release toggles are full-fence RMWs, never plain stores; they
//! carry the happens-before edge between a cell access and the bit that makes
//! the slot visible in its next role.
//!
//! # Ordering guarantees (and the lack of them)
//!
//! Slot selection always favors the lowest-indexed available bit, so once
//! slots are reused, values do **not** come out in the order they went in.
//! This is a handoff primitive, not a FIFO queue; compare multisets, not
//! sequences. CAS failure means another thread won the same bitmap race and
//! is retried immediately with the refreshed snapshot — no backoff, no bound,
//! and therefore no fairness or starvation guarantee under sustained
//! contention.
//!
//! # Safety
//!
//! Uses `unsafe` for `MaybeUninit` cell access through `UnsafeCell`. The
//! bit-removal step of the protocol is what makes each access exclusive;
//! invariants are documented per operation.

#[cfg(loom)]
use loom::sync::atomic::{AtomicU64, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicU64, Ordering};

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

use crossbeam_utils::CachePadded;

use crate::bits::{compare_and_swap, lowest_set_bit, toggle_bit, toggle_bit_atomic, WORD_BITS};

/// Create the 64-cell storage array without running any constructors.
fn uninit_slot_array<T>() -> [UnsafeCell<MaybeUninit<T>>; WORD_BITS] {
    std::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit()))
}

/// Lock-free multi-producer/multi-consumer ring with exactly 64 slots.
///
/// Any number of threads may call [`try_push`](Self::try_push) and
/// [`try_pop`](Self::try_pop) concurrently through a shared reference. Both
/// are single-shot, non-blocking attempts: a full ring fails the push and a
/// wait/backoff policy, if any, belongs to the caller.
///
/// Values move in on push and move out on pop; `T` needs no `Copy` bound.
/// Capacity is fixed at the bitmap width and cannot be changed.
///
/// # Examples
///
/// ```
/// use bitmap_ring::BitmapRing;
///
/// let ring = BitmapRing::new();
/// assert!(ring.try_push(7u64).is_ok());
/// assert_eq!(ring.try_pop(), Some(7));
/// assert_eq!(ring.try_pop(), None);
/// ```
pub struct BitmapRing<T> {
    /// Cell storage. `UnsafeCell` because pushers and poppers mutate cells
    /// through `&self`; exclusivity comes from the bitmap protocol, not a lock.
    slots: [UnsafeCell<MaybeUninit<T>>; WORD_BITS],
    /// Bit *i* set: slot *i* is FREE (claimable for writing). Padded so
    /// producer-side CAS traffic does not false-share with `pop_free`.
    push_free: CachePadded<AtomicU64>,
    /// Bit *i* set: slot *i* is READY (claimable for reading).
    pop_free: CachePadded<AtomicU64>,
}

// SAFETY: Cells are only ever accessed by the single thread that currently
// holds the slot claimed (bit absent from both maps), so sharing the ring
// across threads is safe whenever the payload itself may move between
// threads.
unsafe impl<T: Send> Send for BitmapRing<T> {}
unsafe impl<T: Send> Sync for BitmapRing<T> {}

impl<T> std::fmt::Debug for BitmapRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitmapRing")
            .field("push_free", &self.push_free.load(Ordering::SeqCst))
            .field("pop_free", &self.pop_free.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T> BitmapRing<T> {
    /// Number of slots. Fixed at the bitmap word width.
    pub const CAPACITY: usize = WORD_BITS;

    /// Constructs a ring with all 64 slots FREE.
    pub fn new() -> Self {
        Self {
            slots: uninit_slot_array(),
            push_free: CachePadded::new(AtomicU64::new(u64::MAX)),
            pop_free: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Attempts to push `value`, returning `Err(value)` if every slot was
    /// observed occupied.
    ///
    /// The full check is a point-in-time snapshot: under concurrent pops it
    /// may be pessimistic, never wrong. Ownership stays with the caller on
    /// failure instead of dropping silently.
    ///
    /// # Ordering
    ///
    /// 1. Load a `push_free` snapshot; zero means observed-full.
    /// 2. CAS the snapshot to itself minus its lowest set bit. Failure
    ///    refreshes the snapshot (via the CAS) and retries; success grants
    ///    exclusive ownership of that slot.
    /// 3. Plain-write the value into the owned cell.
    /// 4. SeqCst-toggle the slot's bit in `pop_free`. This publish must come
    ///    after step 3: a thread that observes the set pop-bit also observes
    ///    the written value.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut snapshot = self.push_free.load(Ordering::SeqCst);
        loop {
            if snapshot == 0 {
                return Err(value);
            }
            let lsb = lowest_set_bit(snapshot);
            let claimed = toggle_bit(snapshot, lsb);
            if compare_and_swap(&self.push_free, &mut snapshot, claimed) {
                // SAFETY: The winning CAS removed bit `lsb` from `push_free`
                // while it was absent from `pop_free`, so this thread is the
                // sole owner of the cell until the toggle below.
                unsafe { (*self.slots[lsb as usize].get()).write(value) };
                toggle_bit_atomic(&self.pop_free, lsb);
                return Ok(());
            }
        }
    }

    /// Attempts to pop a value, returning `None` if every slot was observed
    /// empty.
    ///
    /// Symmetric to [`try_push`](Self::try_push): CAS-claim the lowest READY
    /// bit of `pop_free`, move the value out of the owned cell, then
    /// SeqCst-toggle the slot's bit in `push_free` to release it back to
    /// FREE. The empty check is a point-in-time snapshot.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let mut snapshot = self.pop_free.load(Ordering::SeqCst);
        loop {
            if snapshot == 0 {
                return None;
            }
            let lsb = lowest_set_bit(snapshot);
            let claimed = toggle_bit(snapshot, lsb);
            if compare_and_swap(&self.pop_free, &mut snapshot, claimed) {
                // SAFETY: The winning CAS removed bit `lsb` from `pop_free`
                // while it was absent from `push_free`; the cell was
                // initialized by the pusher that published this bit, and the
                // publish toggle makes that write visible here.
                let value = unsafe { (*self.slots[lsb as usize].get()).assume_init_read() };
                toggle_bit_atomic(&self.push_free, lsb);
                return Some(value);
            }
        }
    }

    /// Returns whether no slot was observed READY. Point-in-time; may be
    /// stale by the time the caller acts on it.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pop_free.load(Ordering::SeqCst) == 0
    }

    /// Returns whether no slot was observed FREE. Point-in-time; may be
    /// stale by the time the caller acts on it.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.push_free.load(Ordering::SeqCst) == 0
    }

    /// Counts slots observed READY in a single snapshot.
    ///
    /// Slots mid-handoff (claimed but not yet published or released) are not
    /// counted, so under concurrency this is an estimate, not a guarantee.
    #[inline]
    pub fn len(&self) -> usize {
        self.pop_free.load(Ordering::SeqCst).count_ones() as usize
    }
}

impl<T> Default for BitmapRing<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for BitmapRing<T> {
    fn drop(&mut self) {
        // `&mut self` proves no claim is in flight, so READY bits name
        // exactly the initialized cells.
        let mut ready = self.pop_free.load(Ordering::Relaxed);
        while ready != 0 {
            let lsb = lowest_set_bit(ready);
            ready = toggle_bit(ready, lsb);
            // SAFETY: Bit `lsb` set in `pop_free` means the cell was written
            // and published, and never since claimed by a popper.
            unsafe { self.slots[lsb as usize].get_mut().assume_init_drop() };
        }
    }
}

// ============================================================================
// Tests
// ============================================================================


// ============================================================================
// Concurrent smoke tests (also valid under Miri / cargo miri test)
// ============================================================================


// ============================================================================
// Loom tests
// ============================================================================


// ============================================================================
// Property tests
// ============================================================================
