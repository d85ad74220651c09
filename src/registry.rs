use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ptr;

use log::{trace, warn};
use stackswap::stack::{GuardedStack, Stack};

use crate::pool;
use crate::trampoline;
use crate::{ContextId, Error, MAIN};

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Created, the entry function did not run yet.
    Unstarted,
    /// Switched away from, waiting to be resumed.
    Suspended,
    /// Currently running. Exactly one context per thread is active.
    Active,
    /// The entry function returned or panicked. Can only be destroyed.
    Terminated,
    /// Destroyed, or not known to this thread at all.
    Destroyed,
}

pub(crate) type Entry = Box<dyn FnOnce() + 'static>;

pub(crate) struct Context {
    name: Option<String>,
    state: State,
    // `None` for the main context, it runs on the thread's own stack.
    stack: Option<GuardedStack>,
    // Saved stack pointer. Only meaningful while `Unstarted` or `Suspended`.
    resumption: *mut usize,
    entry: Option<Entry>,
    // The context whose `switch` call last resumed this one.
    resumer: ContextId,
    // Set while `destroy` unwinds this context's stack.
    cancelled_by: Option<ContextId>,
}

impl Context {
    fn main() -> Context {
        Context {
            name: Some("main".to_string()),
            state: State::Active,
            stack: None,
            resumption: ptr::null_mut(),
            entry: None,
            resumer: MAIN,
            cancelled_by: None,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Some(stack) = self.stack.take() {
            pool::global().recycle(stack);
        }
    }
}

/// What `destroy` has to do once the registry is no longer borrowed.
pub(crate) enum Teardown {
    /// Nothing is alive under that id.
    Nothing,
    /// The context never ran or already terminated. Dropping it releases the stack.
    Release(Context),
    /// The context has live frames that need to be unwound first.
    Cancel { from: ContextId, sp: *mut usize },
}

/// Per thread table of all contexts.
pub(crate) struct Registry {
    contexts: BTreeMap<ContextId, Context>,
    current: ContextId,
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
}

/// Runs `f` with this thread's registry.
///
/// The borrow must never be held across a stack swap or while user code runs.
pub(crate) fn with<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    REGISTRY.with(|registry| f(&mut registry.borrow_mut()))
}

/// Registers a new `Unstarted` context on the current thread.
pub(crate) fn create(stack: GuardedStack, name: Option<String>, entry: Entry) -> ContextId {
    let id = ContextId::next();
    // The first switch to this context lands in the trampoline on the new stack.
    let resumption = unsafe { stackswap::init(&stack, trampoline::enter) };
    trace!("created context {} with a {} byte stack", id, stack.size());
    let context = Context {
        name,
        state: State::Unstarted,
        stack: Some(stack),
        resumption,
        entry: Some(entry),
        resumer: MAIN,
        cancelled_by: None,
    };
    with(|registry| registry.contexts.insert(id, context));
    id
}

impl Registry {
    fn new() -> Registry {
        let mut contexts = BTreeMap::new();
        contexts.insert(MAIN, Context::main());
        Registry {
            contexts,
            current: MAIN,
        }
    }

    pub(crate) fn current(&self) -> ContextId {
        self.current
    }

    pub(crate) fn state(&self, id: ContextId) -> State {
        self.contexts
            .get(&id)
            .map_or(State::Destroyed, |context| context.state)
    }

    pub(crate) fn name(&self, id: ContextId) -> Option<String> {
        self.contexts
            .get(&id)
            .and_then(|context| context.name.clone())
    }

    pub(crate) fn is_cancelling(&self, id: ContextId) -> bool {
        self.contexts
            .get(&id)
            .map_or(false, |context| context.cancelled_by.is_some())
    }

    pub(crate) fn take_entry(&mut self, id: ContextId) -> Option<Entry> {
        self.contexts
            .get_mut(&id)
            .and_then(|context| context.entry.take())
    }

    pub(crate) fn remove(&mut self, id: ContextId) -> Option<Context> {
        self.contexts.remove(&id)
    }

    /// Validates a switch to `target` and records the hand-over.
    ///
    /// Returns the caller's id and the stack pointer to resume, or `None` if `target` is the
    /// active context already.
    pub(crate) fn begin_switch(
        &mut self,
        target: ContextId,
    ) -> Result<Option<(ContextId, *mut usize)>, Error> {
        let current = self.current;
        if target == current {
            return Ok(None);
        }
        if self.is_cancelling(current) {
            return Err(Error::Cancelled(current));
        }
        let sp = match self.contexts.get_mut(&target) {
            Some(context) if matches!(context.state, State::Unstarted | State::Suspended) => {
                context.resumer = current;
                context.resumption
            }
            _ => return Err(Error::InvalidTarget(target)),
        };
        self.hand_over(target);
        Ok(Some((current, sp)))
    }

    /// Validates the destruction of `target` and decides how to tear it down.
    pub(crate) fn begin_destroy(&mut self, target: ContextId) -> Result<Teardown, Error> {
        let current = self.current;
        if target == MAIN || target == current {
            return Err(Error::Protected(target));
        }
        if self.is_cancelling(current) {
            return Err(Error::Cancelled(current));
        }
        let context = match self.contexts.get_mut(&target) {
            Some(context) => context,
            None => return Ok(Teardown::Nothing),
        };
        let state = context.state;
        match state {
            State::Suspended => {
                context.cancelled_by = Some(current);
                let sp = context.resumption;
                self.hand_over(target);
                Ok(Teardown::Cancel { from: current, sp })
            }
            State::Unstarted | State::Terminated => Ok(self
                .contexts
                .remove(&target)
                .map_or(Teardown::Nothing, Teardown::Release)),
            State::Active | State::Destroyed => Ok(Teardown::Nothing),
        }
    }

    /// Marks `id` as terminated and hands control to the context that should observe it.
    ///
    /// A cancelled context goes back to its destroyer, a panicking one to its resumer (or main if
    /// the resumer is gone) and one that returned to main.
    pub(crate) fn retire(&mut self, id: ContextId, panicked: bool) -> (ContextId, *mut usize) {
        let (cancelled_by, resumer) = match self.contexts.get_mut(&id) {
            Some(context) => {
                context.state = State::Terminated;
                (context.cancelled_by, context.resumer)
            }
            None => (None, MAIN),
        };
        let successor = match cancelled_by {
            Some(destroyer) => destroyer,
            None if panicked && self.state(resumer) == State::Suspended => resumer,
            None => MAIN,
        };
        let sp = self
            .contexts
            .get(&successor)
            .map_or(ptr::null_mut(), |context| context.resumption);
        self.hand_over(successor);
        (successor, sp)
    }

    /// Stores the stack pointer a context left behind when it switched away.
    pub(crate) fn park(&mut self, id: ContextId, sp: *mut usize) {
        if let Some(context) = self.contexts.get_mut(&id) {
            if context.state == State::Suspended {
                context.resumption = sp;
            }
        }
    }

    // Suspends the active context (unless it terminated) and activates `target`.
    fn hand_over(&mut self, target: ContextId) {
        if let Some(context) = self.contexts.get_mut(&self.current) {
            if context.state == State::Active {
                context.state = State::Suspended;
            }
        }
        if let Some(context) = self.contexts.get_mut(&target) {
            context.state = State::Active;
            context.resumption = ptr::null_mut();
        }
        self.current = target;
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let stranded = self
            .contexts
            .values()
            .filter(|context| context.state == State::Suspended && context.stack.is_some())
            .count();
        if stranded > 0 {
            warn!(
                "thread exits with {} suspended contexts, their stacks are released without unwinding",
                stranded
            );
        }
    }
}
