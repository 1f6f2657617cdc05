//! Word-level bit primitives backing the slot-allocation protocol.
//!
//! # Invariants
//! - [`lowest_set_bit`] requires a non-zero word; every call site checks its
//!   snapshot for zero before calling.
//! - The atomic operations take `&AtomicU64` and never touch more than the
//!   named bit (toggle) or the whole word (CAS).
//!
//! # Ordering
//! [`toggle_bit_atomic`] and [`compare_and_swap`] use `SeqCst` throughout.
//! The toggle is only ever issued by a thread that exclusively owns the slot
//! whose bit it flips, so its atomicity is about *visibility* to other
//! threads, not contention: the full-fence RMW is what carries the
//! happens-before edge between a slot's payload access and the bit that
//! publishes or releases it. Weakening these orderings breaks that edge.

#[cfg(loom)]
use loom::sync::atomic::{AtomicU64, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of slots a single bitmap word can track.
pub const WORD_BITS: usize = u64::BITS as usize;

/// Returns the index of the least-significant set bit of `word`.
///
/// # Panics
///
/// Panics (debug) if `word == 0` — the hardware bit-scan this compiles down
/// to is undefined on zero, so callers must check their snapshot first.
#[inline(always)]
pub fn lowest_set_bit(word: u64) -> u32 {
    debug_assert!(word != 0, "lowest_set_bit requires a non-zero word");
    word.trailing_zeros()
}

/// Flips bit `bit` of a plain word. Non-atomic; used only on local snapshots
/// to build CAS candidates.
#[inline(always)]
pub fn toggle_bit(word: u64, bit: u32) -> u64 {
    debug_assert!((bit as usize) < WORD_BITS, "bit index out of range");
    word ^ (1u64 << bit)
}

/// Atomically flips bit `bit` of a shared word with full `SeqCst` ordering.
///
/// The caller must be the only thread flipping this bit at this moment (it
/// owns the slot the bit describes); the RMW exists to make the flip — and
/// everything sequenced before it — visible to other threads.
#[inline(always)]
pub fn toggle_bit_atomic(word: &AtomicU64, bit: u32) {
    debug_assert!((bit as usize) < WORD_BITS, "bit index out of range");
    word.fetch_xor(1u64 << bit, Ordering::SeqCst);
}

/// Atomic compare-and-swap with full `SeqCst` ordering on both paths.
///
/// On success the shared word equals `desired` and `true` is returned. On
/// failure the observed value is written back through `expected` so a retry
/// loop can continue from a fresh snapshot without reloading.
#[inline(always)]
pub fn compare_and_swap(word: &AtomicU64, expected: &mut u64, desired: u64) -> bool {
    match word.compare_exchange(*expected, desired, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(_) => true,
        Err(actual) => {
            *expected = actual;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_set_bit_basic() {
        assert_eq!(lowest_set_bit(1), 0);
        assert_eq!(lowest_set_bit(0b1000), 3);
        assert_eq!(lowest_set_bit(u64::MAX), 0);
        assert_eq!(lowest_set_bit(1u64 << 63), 63);
        // Lowest bit wins when several are set.
        assert_eq!(lowest_set_bit(0b1010_0100), 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "non-zero word")]
    fn lowest_set_bit_zero_panics_in_debug() {
        let _ = lowest_set_bit(0);
    }

    #[test]
    fn toggle_bit_sets_and_clears() {
        let w = toggle_bit(0, 5);
        assert_eq!(w, 0b10_0000);
        // Toggling twice is the identity.
        assert_eq!(toggle_bit(w, 5), 0);
        // Other bits are untouched.
        assert_eq!(toggle_bit(u64::MAX, 0), u64::MAX - 1);
    }

    #[test]
    fn toggle_bit_atomic_matches_local_toggle() {
        let shared = AtomicU64::new(0b1001);
        toggle_bit_atomic(&shared, 1);
        assert_eq!(shared.load(Ordering::SeqCst), 0b1011);
        toggle_bit_atomic(&shared, 0);
        assert_eq!(shared.load(Ordering::SeqCst), 0b1010);
    }

    #[test]
    fn cas_success_stores_desired() {
        let shared = AtomicU64::new(7);
        let mut expected = 7;
        assert!(compare_and_swap(&shared, &mut expected, 9));
        assert_eq!(shared.load(Ordering::SeqCst), 9);
        assert_eq!(expected, 7);
    }

    #[test]
    fn cas_failure_refreshes_expected() {
        let shared = AtomicU64::new(3);
        let mut expected = 7;
        assert!(!compare_and_swap(&shared, &mut expected, 9));
        // Memory is untouched and the stale snapshot was replaced.
        assert_eq!(shared.load(Ordering::SeqCst), 3);
        assert_eq!(expected, 3);
        // Retrying with the refreshed snapshot now succeeds.
        assert!(compare_and_swap(&shared, &mut expected, 9));
        assert_eq!(shared.load(Ordering::SeqCst), 9);
    }
}
