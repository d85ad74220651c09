use std::io::{Error, ErrorKind};
#[cfg(target_family = "windows")]
use std::mem::size_of;
use std::ptr;

#[cfg(target_family = "unix")]
use libc::{mmap, mprotect, munmap};
#[cfg(target_family = "unix")]
use libc::{MAP_ANON, MAP_FAILED, MAP_NORESERVE, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE};

#[cfg(target_family = "windows")]
use winapi::ctypes::c_void;
#[cfg(target_family = "windows")]
use winapi::um::memoryapi::{VirtualAlloc, VirtualFree, VirtualProtect};
#[cfg(target_family = "windows")]
use winapi::um::winnt::{
    MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_GUARD, PAGE_NOACCESS, PAGE_READWRITE,
};

use super::{page_size, round_to_pages, Stack};

#[cfg(target_family = "windows")]
const EXCEPTION_ZONE: usize = 4 * 4096;

// Usable and total size of a stack with `size` requested bytes and a `guard` area.
fn reservation(size: usize, guard: usize) -> Result<(usize, usize), Error> {
    round_to_pages(size)
        .and_then(|usable| Some((usable, usable.checked_add(guard)?)))
        .ok_or_else(|| Error::new(ErrorKind::OutOfMemory, "stack size overflows the address space"))
}

/// A fixed size stack with a guard area above its usable part.
///
/// On Unix platforms the whole region is reserved with `PROT_NONE` and the MAP_NORESERVE flag,
/// then everything except the topmost page is marked read/write. Running off the end of the
/// stack touches the guard page and raises SIGSEGV (SIGBUS on Darwin) instead of silently
/// overwriting neighbouring memory.
///
/// On Windows the region is reserved with 4 extra pages on top for the exception handler. Only the
/// bottom of the stack is commited and followed by guard pages, the way Windows expects it, so the
/// OS can grow and commit memory on demand until the stack limit is reached.
pub struct GuardedStack {
    base: *mut usize,
    top: *mut usize,
    bottom: *mut usize,
    total: usize,
}

// The memory is exclusively owned by the stack and not tied to the thread that mapped it.
unsafe impl Send for GuardedStack {}

impl GuardedStack {
    #[cfg(target_family = "unix")]
    unsafe fn alloc(size: usize) -> Result<*mut u8, Error> {
        let ptr = mmap(
            ptr::null_mut(),
            size,
            PROT_NONE,
            MAP_PRIVATE | MAP_ANON | MAP_NORESERVE,
            -1,
            0,
        );
        if ptr == MAP_FAILED {
            Err(Error::last_os_error())
        } else {
            Ok(ptr as *mut u8)
        }
    }
}

impl Stack for GuardedStack {
    #[cfg(target_family = "unix")]
    fn new(size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "stack size can't be 0"));
        }
        let (usable, total) = reservation(size, page_size())?;
        unsafe {
            let base = Self::alloc(total)?;
            let top = base.add(page_size());
            if mprotect(top as *mut libc::c_void, usable, PROT_READ | PROT_WRITE) != 0 {
                let error = Error::last_os_error();
                munmap(base as *mut libc::c_void, total);
                return Err(error);
            }
            Ok(Self {
                base: base as *mut usize,
                top: top as *mut usize,
                bottom: base.add(total) as *mut usize,
                total,
            })
        }
    }

    // Windows
    #[cfg(target_family = "windows")]
    fn new(size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "stack size can't be 0"));
        }
        let (usable, total) = reservation(size, EXCEPTION_ZONE)?;
        unsafe {
            // Cast pointer to `usize`, because calculating offsets with `c_void` is impossible.
            let ptr = VirtualAlloc(ptr::null_mut(), total, MEM_RESERVE, PAGE_NOACCESS) as *mut usize;
            if ptr.is_null() {
                return Err(Error::last_os_error());
            }
            let release = |error: Error| {
                VirtualFree(ptr as *mut c_void, 0, MEM_RELEASE);
                Err(error)
            };
            // Commit 3 bottom pages (1 read/write and 2 guard pages)
            let bottom_2 = VirtualAlloc(
                ptr.add((total - 3 * 4096) / size_of::<usize>()) as *mut c_void,
                3 * 4096,
                MEM_COMMIT,
                PAGE_GUARD | PAGE_READWRITE,
            );
            if bottom_2.is_null() {
                return release(Error::last_os_error());
            }

            let mut old_protect: u32 = 0;
            let bottom_1 = VirtualProtect(
                ptr.add((total - 4096) / size_of::<usize>()) as *mut c_void,
                4096,
                PAGE_READWRITE,
                &mut old_protect,
            );
            if bottom_1 == 0 {
                return release(Error::last_os_error());
            }

            Ok(Self {
                base: ptr,
                top: ptr.add(EXCEPTION_ZONE / size_of::<usize>()),
                bottom: ptr.add(total / size_of::<usize>()),
                total,
            })
        }
    }

    fn bottom(&self) -> *mut usize {
        self.bottom
    }

    fn top(&self) -> *mut usize {
        self.top
    }

    fn deallocation(&self) -> *mut usize {
        self.base
    }
}

impl GuardedStack {
    /// Returns true if `addr` points inside the guard area of this stack.
    pub fn is_guard_address(&self, addr: *const u8) -> bool {
        let addr = addr as usize;
        self.base as usize <= addr && addr < self.top as usize
    }

    /// Size of the whole reservation, guard area included.
    pub fn reserved(&self) -> usize {
        self.total
    }
}

#[cfg(target_family = "unix")]
impl Drop for GuardedStack {
    fn drop(&mut self) {
        let result = unsafe { munmap(self.base as *mut libc::c_void, self.total) };
        debug_assert_eq!(result, 0);
    }
}

#[cfg(target_family = "windows")]
impl Drop for GuardedStack {
    fn drop(&mut self) {
        let result = unsafe { VirtualFree(self.base as *mut c_void, 0, MEM_RELEASE) };
        debug_assert_ne!(result, 0);
    }
}
