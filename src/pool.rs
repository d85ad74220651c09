use std::io::Error;
use std::sync::OnceLock;

use crossbeam::queue::ArrayQueue;
use log::trace;
use stackswap::stack::*;

use crate::{DEFAULT_STACK_SIZE, POOL_CAPACITY};

/// Keeps the stacks of destroyed contexts around, so creating a context doesn't always need to
/// map fresh memory. Only stacks of the default size are pooled. The pool is shared by all threads,
/// a stack released on one thread can be reused on another.
pub(crate) struct StackPool {
    pool: ArrayQueue<GuardedStack>,
    stack_size: usize,
}

impl StackPool {
    pub(crate) fn new(capacity: usize, stack_size: usize) -> Self {
        Self {
            pool: ArrayQueue::new(capacity),
            stack_size: round_to_pages(stack_size).unwrap_or(stack_size),
        }
    }

    /// Returns a stack with `size` usable bytes, `size` must be a multiple of the page size.
    pub(crate) fn get(&self, size: usize) -> Result<GuardedStack, Error> {
        if size == self.stack_size {
            if let Some(stack) = self.pool.pop() {
                trace!("reusing a pooled stack");
                return Ok(stack);
            }
        }
        GuardedStack::new(size)
    }

    pub(crate) fn recycle(&self, stack: GuardedStack) {
        if stack.size() == self.stack_size {
            // If we push over the capacity just drop the stack.
            let _ = self.pool.push(stack);
        }
    }
}

pub(crate) fn global() -> &'static StackPool {
    static POOL: OnceLock<StackPool> = OnceLock::new();
    POOL.get_or_init(|| StackPool::new(POOL_CAPACITY, DEFAULT_STACK_SIZE))
}
