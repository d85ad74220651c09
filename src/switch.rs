use std::any::Any;
use std::mem::ManuallyDrop;
use std::panic::resume_unwind;
use std::ptr;

use log::trace;

use crate::registry::{self, Teardown};
use crate::unwind::Cancelled;
use crate::{ContextId, Error};

// Every stack swap carries one of these. It lives on the stack of the sender and is moved out by
// the receiver right after the swap, before the sender's stack can be released.
pub(crate) struct Transfer {
    pub(crate) from: ContextId,
    pub(crate) message: Message,
}

pub(crate) enum Message {
    /// Continue where you left off.
    Resume,
    /// Unwind your stack, you are being destroyed.
    Cancel,
    /// The sender terminated.
    Exit(Exit),
}

pub(crate) enum Exit {
    Returned,
    // The payload is passed to `resume_unwind` to continue the unwind in the receiving context.
    Panicked(Box<dyn Any + Send + 'static>),
    Cancelled,
}

/// Swaps to the stack `sp` points into, passing `message` along.
///
/// Returns once some context transfers control back to the caller.
///
/// # Safety
///
/// `sp` must be the resumption state of the context the registry just activated.
pub(crate) unsafe fn transfer(sp: *mut usize, from: ContextId, message: Message) -> Transfer {
    let out = ManuallyDrop::new(Transfer { from, message });
    let (data, sp) = stackswap::swap(&out as *const ManuallyDrop<Transfer> as usize, sp);
    receive(data, sp)
}

/// Takes over a transfer at the start of a resumed context.
///
/// # Safety
///
/// `data` must point to a `Transfer` nobody else reads.
pub(crate) unsafe fn receive(data: usize, sp: *mut usize) -> Transfer {
    let incoming = ptr::read(data as *const Transfer);
    // Save the resumption state of the context that just switched to us.
    registry::with(|registry| registry.park(incoming.from, sp));
    incoming
}

/// Suspends the active context and resumes `target`.
///
/// Returns `Ok(())` once another context switches back. Switching to the active context itself
/// returns immediately and touches nothing, even while that context is being destroyed.
///
/// If a context resumed by this call terminates with a panic that it didn't catch, the panic
/// continues to unwind out of this call. If a context's entry function returns, the `switch` call
/// of the main context returns [EntrypointReturned](enum.Error.html#variant.EntrypointReturned).
pub fn switch(target: ContextId) -> Result<(), Error> {
    let (from, sp) = match registry::with(|registry| registry.begin_switch(target))? {
        Some(hand_over) => hand_over,
        None => return Ok(()),
    };
    trace!("context {} switches to {}", from, target);
    let incoming = unsafe { transfer(sp, from, Message::Resume) };
    deliver(incoming)
}

fn deliver(incoming: Transfer) -> Result<(), Error> {
    match incoming.message {
        Message::Resume | Message::Exit(Exit::Cancelled) => Ok(()),
        Message::Cancel => {
            trace!("context {} unwinds before being destroyed", crate::current());
            resume_unwind(Box::new(Cancelled))
        }
        Message::Exit(Exit::Panicked(panic)) => resume_unwind(panic),
        Message::Exit(Exit::Returned) => Err(Error::EntrypointReturned(incoming.from)),
    }
}

/// Destroys `target` and releases its stack.
///
/// Fails with [Protected](enum.Error.html#variant.Protected) for the main context and for the
/// calling context. Destroying an id that is not alive is a successful no-op.
///
/// If `target` is suspended in the middle of its execution, its stack is unwound first so the
/// destructors of all values living on it run. During that unwind `target` can't switch or destroy
/// other contexts.
pub fn destroy(target: ContextId) -> Result<(), Error> {
    let teardown = registry::with(|registry| registry.begin_destroy(target))?;
    match teardown {
        Teardown::Nothing => {}
        Teardown::Release(context) => {
            drop(context);
            trace!("destroyed context {}", target);
        }
        Teardown::Cancel { from, sp } => {
            let incoming = unsafe { transfer(sp, from, Message::Cancel) };
            // Only the cancelled context runs until it hands control back.
            debug_assert!(matches!(incoming.message, Message::Exit(Exit::Cancelled)));
            drop(incoming);
            let context = registry::with(|registry| registry.remove(target));
            drop(context);
            trace!("destroyed context {} after unwinding it", target);
        }
    }
    Ok(())
}
