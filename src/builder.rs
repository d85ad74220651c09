use std::io;

use stackswap::stack::round_to_pages;

use crate::registry;
use crate::{pool, ContextId, Error};

/// Usable stack size of contexts created without an explicit size.
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Smaller requested stack sizes are raised to this value.
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Maximum number of released default sized stacks kept for reuse.
pub const POOL_CAPACITY: usize = 64;

/// Context factory, which can be used in order to configure the properties of a new context.
///
/// ```
/// let id = fiberweave::Builder::new()
///     .name("worker")
///     .stack_size(64 * 1024)
///     .spawn(|| {
///         fiberweave::switch(fiberweave::MAIN).unwrap();
///     })
///     .unwrap();
///
/// assert_eq!(fiberweave::name(id).as_deref(), Some("worker"));
/// fiberweave::destroy(id).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Names the context. The name shows up in log messages and is returned by
    /// [name](fn.name.html).
    pub fn name(mut self, name: impl Into<String>) -> Builder {
        self.name = Some(name.into());
        self
    }

    /// Sets the usable stack size of the context, rounded up to whole pages.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.stack_size = Some(size);
        self
    }

    /// Creates the context on the current thread. The entry function does not run until the
    /// first [switch](fn.switch.html) to the returned id.
    pub fn spawn<F>(self, entry: F) -> Result<ContextId, Error>
    where
        F: FnOnce() + 'static,
    {
        let requested = self
            .stack_size
            .unwrap_or(DEFAULT_STACK_SIZE)
            .max(MIN_STACK_SIZE);
        let size = round_to_pages(requested).ok_or_else(|| {
            Error::StackExhausted(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "stack size overflows the address space",
            ))
        })?;
        let stack = pool::global().get(size).map_err(Error::StackExhausted)?;
        Ok(registry::create(stack, self.name, Box::new(entry)))
    }
}
