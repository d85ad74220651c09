use thiserror::Error;

use crate::ContextId;

/// Errors returned by the context operations.
///
/// None of them leave the registry in a different state than before the failed call.
#[derive(Debug, Error)]
pub enum Error {
    /// The target is unknown to this thread, was destroyed or already terminated.
    #[error("context {0} does not exist or can't be resumed")]
    InvalidTarget(ContextId),
    /// The main context and the active context can't be destroyed.
    #[error("context {0} is protected and can't be destroyed")]
    Protected(ContextId),
    #[error("failed to allocate a stack for a new context: {0}")]
    StackExhausted(#[source] std::io::Error),
    /// Delivered to the main context when the entry function of a context returns.
    #[error("the entrypoint of context {0} returned which is not allowed")]
    EntrypointReturned(ContextId),
    /// The calling context is being destroyed and may only unwind.
    #[error("context {0} is being destroyed")]
    Cancelled(ContextId),
    #[error("jump target belongs to context {owner} but was used from context {current}")]
    ForeignJump { owner: ContextId, current: ContextId },
}

impl Error {
    /// The errno value POSIX flavoured bindings report for this error.
    pub fn raw_os_error(&self) -> i32 {
        match self {
            Error::StackExhausted(_) => libc::ENOMEM,
            _ => libc::EINVAL,
        }
    }
}
