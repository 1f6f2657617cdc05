//! Lock-free 64-slot MPMC ring buffer driven by two atomic bitmaps.
//!
//! ## Scope
//! This crate is a single inter-thread handoff primitive: [`BitmapRing`], a
//! fixed-capacity ring whose 64 storage slots are allocated and reclaimed by
//! atomic bit manipulation on two 64-bit words instead of locks, head/tail
//! counters, or per-slot atomics.
//!
//! ## Key invariants
//! - A slot's bit is never set in both bitmaps at once; whichever thread
//!   removed a bit from one map and has not yet set it in the other owns the
//!   slot's storage cell exclusively.
//! - Capacity is exactly 64 (the bitmap word width) and fixed at compile
//!   time; the four slot states always sum to 64.
//! - `try_push`/`try_pop` are single-shot, non-blocking attempts: lock-free
//!   but not wait-free, with no fairness guarantee under contention.
//!
//! ## Non-guarantees
//! No FIFO ordering — slot selection always takes the lowest available index,
//! so dequeue order diverges from enqueue order once slots are reused. No
//! blocking, backoff, or timeout policy — callers layer their own on top of a
//! failed attempt.
//!
//! ## Notable entry points
//! - [`BitmapRing`]: the ring itself.
//! - [`bits`]: the word-level primitives the protocol is built on.

pub mod bits;
pub mod ring;
#[cfg(test)]
pub mod test_utils;

pub use ring::BitmapRing;
