//! Fiberweave provides cooperative execution contexts (fibers) in Rust.
//!
//! A context has its own stack and entry function. All contexts of a thread run interleaved on
//! that thread, control moves from one to another only through an explicit [switch](fn.switch.html).
//! There is no scheduler and no preemption. The original stack of every thread is the
//! [MAIN](constant.MAIN.html) context.
//!
//! Uncaught panics inside a context continue to unwind out of the `switch` call that last resumed
//! it. Destroying a context that is suspended in the middle of its execution unwinds its stack.
//! ## Example
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use fiberweave::{create, destroy, switch, MAIN};
//!
//! fn main() {
//!     let counter = Rc::new(Cell::new(0));
//!
//!     let ctx_2 = {
//!         let counter = counter.clone();
//!         create(move || {
//!             counter.set(counter.get() + 1);
//!             switch(MAIN).unwrap();
//!         })
//!         .unwrap()
//!     };
//!     let ctx_1 = {
//!         let counter = counter.clone();
//!         create(move || {
//!             counter.set(counter.get() + 1);
//!             switch(ctx_2).unwrap();
//!         })
//!         .unwrap()
//!     };
//!
//!     switch(ctx_1).unwrap();
//!     assert_eq!(counter.get(), 2);
//!
//!     destroy(ctx_1).unwrap();
//!     destroy(ctx_2).unwrap();
//! }
//! ```

mod builder;
mod error;
mod id;
mod pool;
mod registry;
mod switch;
mod trampoline;
mod unwind;

pub use builder::{Builder, DEFAULT_STACK_SIZE, MIN_STACK_SIZE, POOL_CAPACITY};
pub use error::Error;
pub use id::{ContextId, MAIN};
pub use registry::State;
pub use switch::{destroy, switch};
pub use unwind::{catch_jump, JumpTarget};

/// Creates a context with the default configuration. See [Builder](struct.Builder.html).
pub fn create<F>(entry: F) -> Result<ContextId, Error>
where
    F: FnOnce() + 'static,
{
    Builder::new().spawn(entry)
}

/// Returns the id of the context running on this thread.
pub fn current() -> ContextId {
    registry::with(|registry| registry.current())
}

/// Returns the state of a context of this thread.
///
/// Ids that were destroyed, or never issued on this thread, are reported as `Destroyed`.
pub fn state(id: ContextId) -> State {
    registry::with(|registry| registry.state(id))
}

/// Returns the name the context was created with.
pub fn name(id: ContextId) -> Option<String> {
    registry::with(|registry| registry.name(id))
}
