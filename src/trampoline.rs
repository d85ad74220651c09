use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{error, trace};

use crate::registry;
use crate::switch::{self, Exit, Message};

/// First function running on every context stack, written there by `stackswap::init`.
///
/// It is called by the first switch to the context with the switcher's transfer and stack pointer.
/// The entry function runs under `catch_unwind`, it is not safe to unwind across the stack swap,
/// so a panic is carried over to the next context as a value. This function never returns and
/// nothing is ever swapped back into it once the final transfer happened.
pub(crate) unsafe extern "C" fn enter(data: usize, sp: *mut usize) -> ! {
    let incoming = switch::receive(data, sp);
    debug_assert!(matches!(incoming.message, Message::Resume));
    drop(incoming);

    let (id, entry) = registry::with(|registry| {
        let id = registry.current();
        (id, registry.take_entry(id))
    });
    trace!("context {} starts", id);

    let result = match entry {
        Some(entry) => catch_unwind(AssertUnwindSafe(entry)),
        None => Ok(()),
    };

    let exit = if registry::with(|registry| registry.is_cancelling(id)) {
        // Whatever unwound the stack, the destroyer only waits for it to be done.
        drop(result);
        Exit::Cancelled
    } else {
        match result {
            Ok(()) => {
                error!("the entrypoint of context {} returned which is not allowed", id);
                Exit::Returned
            }
            Err(panic) => {
                trace!("context {} panicked", id);
                Exit::Panicked(panic)
            }
        }
    };

    let panicked = matches!(exit, Exit::Panicked(_));
    let (successor, sp) = registry::with(|registry| registry.retire(id, panicked));
    trace!("context {} terminated, control goes to {}", id, successor);
    switch::transfer(sp, id, Message::Exit(exit));

    // A terminated context is never resumed.
    std::process::abort()
}
