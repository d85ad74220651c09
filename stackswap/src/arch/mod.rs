// All architectures expose the same two functions:
// * `init(stack: &Stack, f: unsafe extern "C" fn(usize, *mut usize) -> !) -> *mut usize`
// * `swap(arg: usize, new_sp: *mut usize) -> (usize, *mut usize)`
//
// ### swap
// A suspended context is nothing more than a stack pointer. Everything needed to continue it lives
// on its own stack, right under that pointer:
//
//      +------------------+
//      |     .......      |   frames of the suspended context
//      +------------------+
//      |Continuation      |   where to jump when resumed
//      +------------------+
//      |Reserved regs     |   rbx (x86_64) or x19 (aarch64), the compiler refuses to spill them for us
//      +------------------+
//      |Frame pointer     |
//      +------------------+
//      |TIB fields        |   Windows only: stack base, stack limit, deallocation stack
//      +------------------+ <- saved stack pointer
//
// `swap` pushes this record on the current stack, loads the stack pointer of the target, pops the
// target's record and jumps to its continuation. Every other register is declared as clobbered, so
// the compiler saves exactly the ones it needs around the call. The value passed as `arg` appears
// as the return value of the `swap` call that suspended the target, together with the stack pointer
// of the context we just left. Unlike an asymmetric resume/suspend pair, any context can swap to
// any other suspended context, and the one that swaps back later is not necessarily the one that
// swapped away.
//
// ### init
// `init` writes a fake record at the bottom of a fresh stack whose continuation is the entry
// function. The first `swap` to it "returns" straight into `f(arg, caller_sp)` with the stack
// aligned as the ABI expects for a function entry. The return address slot (or link register on
// aarch64) is zero, which terminates backtraces and frame walks at the start of the context.
// `f` must never return, there is nothing to return to.
//
// Windows needs to preserve some extra information across context switches, like the stack base,
// limit and deallocation values. If they are not present Windows will not know how to grow the
// stack. The [Boost.Context](https://www.boost.org/doc/libs/1_61_0/libs/context/doc/html/context/overview.html)
// library also preserves some other information, like the current
// [Fiber](https://docs.microsoft.com/en-us/windows/win32/procthread/fibers) data, but mixing
// Windows Fibers with these stacks is not supported.

#[cfg(all(target_family = "unix", target_arch = "x86_64"))]
mod unix_x64;
#[cfg(all(target_family = "unix", target_arch = "x86_64"))]
pub use self::unix_x64::*;

#[cfg(all(target_family = "unix", target_arch = "aarch64"))]
mod unix_aarch64;
#[cfg(all(target_family = "unix", target_arch = "aarch64"))]
pub use self::unix_aarch64::*;

#[cfg(all(target_family = "windows", target_arch = "x86_64"))]
mod windows_x64;
#[cfg(all(target_family = "windows", target_arch = "x86_64"))]
pub use self::windows_x64::*;

#[cfg(not(any(
    all(target_family = "unix", target_arch = "x86_64"),
    all(target_family = "unix", target_arch = "aarch64"),
    all(target_family = "windows", target_arch = "x86_64"),
)))]
compile_error!("stackswap only supports x86_64 and aarch64 on unix and x86_64 on windows");

/// Entry point of a fresh stack. Receives the `arg` of the first swap and the stack pointer of the
/// context that performed it.
pub type EntryFn = unsafe extern "C" fn(usize, *mut usize) -> !;

pub(crate) unsafe fn push(mut sp: *mut usize, val: usize) -> *mut usize {
    sp = sp.offset(-1);
    *sp = val;
    sp
}
