use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a context.
///
/// Ids are handed out from a process wide counter, so an id is never reused, not even after the
/// context it named was destroyed, and an id created on one thread never names a context of
/// another thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

/// The context representing the original stack of the current thread.
pub const MAIN: ContextId = ContextId::MAIN;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    /// Same as [MAIN](constant.MAIN.html).
    pub const MAIN: ContextId = ContextId(0);

    pub(crate) fn next() -> ContextId {
        ContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value of the id.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Rebuilds an id from its raw value, for ids that travelled through an FFI boundary.
    pub fn from_u64(raw: u64) -> ContextId {
        ContextId(raw)
    }

    /// True for the id of the main context.
    pub fn is_main(self) -> bool {
        self == MAIN
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_main() {
            write!(f, "main")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
