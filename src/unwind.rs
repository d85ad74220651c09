use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{ContextId, Error};

/// Unwind payload that tears down a context which is being destroyed.
pub(crate) struct Cancelled;

// Unwind payload of `JumpTarget::jump`.
struct Jump {
    token: u64,
    value: i32,
}

/// A non-local jump target established by [catch_jump](fn.catch_jump.html).
///
/// The target stays valid across switches: a context may establish it, switch away, get resumed and
/// then jump to it. It only can't be used from a different context than the one that created it,
/// the frame it jumps to lives on that context's stack.
pub struct JumpTarget {
    owner: ContextId,
    token: u64,
}

/// Runs `f` with a fresh jump target, the `setjmp` of this crate.
///
/// Returns `Ok` with the result of `f` if it finishes normally, or `Err(value)` if the target was
/// jumped to with `value`. Panics and jumps to other targets pass through unchanged.
///
/// ```
/// let result: Result<(), i32> = fiberweave::catch_jump(|target| {
///     target.jump(7);
///     unreachable!()
/// });
/// assert_eq!(result, Err(7));
/// ```
pub fn catch_jump<F, R>(f: F) -> Result<R, i32>
where
    F: FnOnce(&JumpTarget) -> R,
{
    static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

    let target = JumpTarget {
        owner: crate::current(),
        token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
    };
    match catch_unwind(AssertUnwindSafe(|| f(&target))) {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<Jump>() {
            Ok(jump) if jump.token == target.token => Err(jump.value),
            Ok(jump) => resume_unwind(jump),
            Err(payload) => resume_unwind(payload),
        },
    }
}

impl JumpTarget {
    /// Unwinds back to the [catch_jump](fn.catch_jump.html) call that created this target, like
    /// `longjmp`. A `value` of 0 is delivered as 1.
    ///
    /// Only returns if the jump is not allowed, because it is attempted from another context
    /// than the one that owns the target.
    pub fn jump(&self, value: i32) -> Error {
        let current = crate::current();
        if current != self.owner {
            return Error::ForeignJump {
                owner: self.owner,
                current,
            };
        }
        let value = if value == 0 { 1 } else { value };
        resume_unwind(Box::new(Jump {
            token: self.token,
            value,
        }))
    }

    /// The context this target belongs to.
    pub fn owner(&self) -> ContextId {
        self.owner
    }
}
