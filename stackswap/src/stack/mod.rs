mod guarded;
pub use guarded::GuardedStack;

use std::sync::atomic::{AtomicUsize, Ordering};

pub trait Stack: Sized {
    /// Returns a new stack with at least `size` usable bytes.
    fn new(size: usize) -> Result<Self, std::io::Error>;

    /// Returns a pointer to the bottom of the stack (the highest address, stacks grow down).
    fn bottom(&self) -> *mut usize;

    /// Returns a pointer to the top of the usable part of the stack.
    fn top(&self) -> *mut usize;

    /// Returns a pointer to the start of the whole reservation, guard included.
    /// On Windows this is the deallocation stack of the Thread Information Block.
    fn deallocation(&self) -> *mut usize;

    /// Number of usable bytes between `top` and `bottom`.
    fn size(&self) -> usize {
        self.bottom() as usize - self.top() as usize
    }
}

/// Returns page size in bytes
pub fn page_size() -> usize {
    #[cold]
    #[cfg(target_family = "unix")]
    fn sys_page_size() -> usize {
        unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
    }

    #[cold]
    #[cfg(target_family = "windows")]
    fn sys_page_size() -> usize {
        use winapi::um::sysinfoapi::GetSystemInfo;
        use winapi::um::sysinfoapi::{LPSYSTEM_INFO, SYSTEM_INFO};

        unsafe {
            let mut info: SYSTEM_INFO = std::mem::zeroed();
            GetSystemInfo(&mut info as LPSYSTEM_INFO);
            info.dwPageSize as usize
        }
    }

    static PAGE_SIZE_CACHE: AtomicUsize = AtomicUsize::new(0);
    match PAGE_SIZE_CACHE.load(Ordering::Relaxed) {
        0 => {
            let page_size = sys_page_size();
            PAGE_SIZE_CACHE.store(page_size, Ordering::Relaxed);
            page_size
        }
        page_size => page_size,
    }
}

/// Rounds `size` up to a whole number of pages, `None` if that doesn't fit in a `usize`.
pub fn round_to_pages(size: usize) -> Option<usize> {
    let page = page_size();
    Some(size.checked_add(page - 1)? / page * page)
}
