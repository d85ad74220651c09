//! Stackswap provides guarded stacks and a symmetric stack swap primitive.
//!
//! It consists of two parts:
//! 1. A [stack](stack/struct.GuardedStack.html) implementation with a guard area that catches overflows.
//! 2. The [init](fn.init.html) and [swap](fn.swap.html) functions that prepare a fresh stack and
//!    transfer control between stacks without unwinding either of them.
//!
//! This crate is the unsafe layer under `fiberweave`. It knows nothing about contexts, ids or
//! panics, a suspended context is represented by a bare stack pointer.
//! ## Example
//! ```
//! use stackswap::stack::{GuardedStack, Stack};
//!
//! unsafe extern "C" fn double(arg: usize, caller: *mut usize) -> ! {
//!     let mut caller = caller;
//!     let mut value = arg;
//!     loop {
//!         let (next, sp) = stackswap::swap(value * 2, caller);
//!         caller = sp;
//!         value = next;
//!     }
//! }
//!
//! fn main() {
//!     let stack = GuardedStack::new(64 * 1024).unwrap();
//!     let sp = unsafe { stackswap::init(&stack, double) };
//!     let (out, sp) = unsafe { stackswap::swap(21, sp) };
//!     assert_eq!(out, 42);
//!     let (out, _) = unsafe { stackswap::swap(50, sp) };
//!     assert_eq!(out, 100);
//! }
//! ```

mod arch;
pub mod stack;

pub use arch::EntryFn;

/// Prepares a fresh stack so that the first [swap](fn.swap.html) to the returned stack pointer
/// calls `f(arg, caller_sp)` on it.
///
/// # Safety
///
/// * `stack` must stay alive, and must not be prepared again, for as long as the returned stack
///   pointer or any stack pointer later saved on it can still be swapped to.
/// * `f` must never return and must never unwind.
#[inline(always)]
pub unsafe fn init<S: stack::Stack>(stack: &S, f: EntryFn) -> *mut usize {
    arch::init(stack, f)
}

/// Suspends the current stack and resumes the one `new_sp` points to.
///
/// Returns once some other stack swaps back to the stack pointer this call left behind (it is
/// handed to the resumed side as the second return value of its own `swap`, or as the second
/// argument of its entry function). The returned pair holds the `arg` that side passed and the
/// stack pointer it left behind.
///
/// # Safety
///
/// `new_sp` must come from [init](fn.init.html) or from a previous `swap`, must not have been
/// resumed since, and the stack it points into must still be alive.
#[inline(always)]
pub unsafe fn swap(arg: usize, new_sp: *mut usize) -> (usize, *mut usize) {
    arch::swap(arg, new_sp)
}
