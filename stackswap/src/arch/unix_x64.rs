use std::arch::asm;

use super::{push, EntryFn};
use crate::stack;

/// Prepares `stack` so that the first `swap` to the returned pointer calls `f`.
pub unsafe fn init<S: stack::Stack>(stack: &S, f: EntryFn) -> *mut usize {
    let mut sp = stack.bottom();
    // Return address of `f`. Zero, there is nowhere to return to.
    sp = push(sp, 0);
    // Continuation, popped into rax and jumped to.
    sp = push(sp, f as usize);
    // rbx
    sp = push(sp, 0);
    // Frame pointer, zero terminates frame walks.
    sp = push(sp, 0);
    sp
}

/// Swap between two stacks.
/// `new_sp` is the stack we are jumping to. This stack needs to have at the top:
/// 1. Stack frame pointer
/// 2. rbx
/// 3. Pointer to the next instruction to execute on the new stack
/// If the pointer points to an `extern "C"` function then `arg` is forwarded to it through the `rdi`
/// register and the stack pointer of the current context through `rsi`.
///
/// This function pushes the same record to the current stack. When some context jumps back to it,
/// it will return the `arg` that context passed and the stack pointer it left behind.
#[inline(always)]
pub unsafe fn swap(arg: usize, new_sp: *mut usize) -> (usize, *mut usize) {
    let ret_val: usize;
    let ret_sp: *mut usize;

    asm!(
        // Save the continuation spot after we jump back here to be after this asm block.
        "lea rax, [rip + 2f]",
        "push rax",
        // rbx is reserved by LLVM and can't be marked as clobbered.
        "push rbx",
        // Save the frame pointer as it can't be marked as an output register.
        "push rbp",
        // Set the current pointer as the 2nd element (rsi) of the function we are jumping to.
        "mov rsi, rsp",
        // Change the stack pointer to the passed value.
        "mov rsp, rdx",
        // Set the frame pointer according to the new stack.
        "pop rbp",
        "pop rbx",
        // Get the next instruction to jump to.
        "pop rax",
        // Doing a pop & jmp instead of a ret helps us here with branch prediction.
        "jmp rax",
        "2:",
        inout("rdx") new_sp => _,
        inout("rdi") arg => ret_val, // 1st argument to called function
        out("rsi") ret_sp, // 2nd argument to called function
        // Callee saved registers, the code we are jumping to is free to use them.
        out("r12") _, out("r13") _, out("r14") _, out("r15") _,
        clobber_abi("C"),
    );

    (ret_val, ret_sp)
}
