use std::arch::asm;

use super::{push, EntryFn};
use crate::stack;

/// After the call to this function the stack should look like this:
/// * Deallocation stack.
/// * Stack limit.
/// * Stack base.
/// * Stack frame pointer. Zero.
/// * rbx. Zero.
/// * Pointer to the function we want to call.
/// * Return address. Also zero, as we never return from this stack. But the ABI expects it for
///   alignement reasons: "the value (%rsp + 8) is always a multiple of 16 when control is transferred to
///   the function entry point".
/// * The Home addresses, required for at least 4 arguments by Windows:
///   https://docs.microsoft.com/en-us/cpp/build/stack-usage?view=vs-2019
///
/// Returns a pointer to the new top of the stack.
/// The `swap` function will pop the first few values to set up the Thread Information Block and
/// function call.
pub unsafe fn init<S: stack::Stack>(stack: &S, f: EntryFn) -> *mut usize {
    let mut sp = stack.bottom();
    // Home addresses - zeroed
    for _ in 0..4 {
        sp = push(sp, 0);
    }
    // Return address - zeroed
    sp = push(sp, 0);
    sp = push(sp, f as usize);
    // rbx
    sp = push(sp, 0);
    // Stack frame pointer - zeroed
    sp = push(sp, 0);

    // The next few values are not really documented in windows and we rely on this Wiki page:
    // https://en.wikipedia.org/wiki/Win32_Thread_Information_Block
    // and this file from Boost's Context library:
    // https://github.com/boostorg/context/blob/develop/src/asm/jump_x86_64_ms_pe_masm.asm
    // to preserve all needed information for Windows to be able to automatically move the stack guard page.

    // Stack base
    sp = push(sp, stack.bottom() as usize);
    // Stack limit, 4 pages under the reservation start.
    sp = push(sp, stack.top() as usize);
    // Deallocation stack, where the actual memory address of the stack starts.
    sp = push(sp, stack.deallocation() as usize);

    sp
}

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

        // Load NT_TIB
        "mov r10, gs:[0x30]",
        // Save stack base
        "mov rax, [r10 + 0x08]",
        "push rax",
        // Save stack limit
        "mov rax, [r10 + 0x10]",
        "push rax",
        // Save deallocation stack
        "mov rax, [r10 + 0x1478]",
        "push rax",

        // Set the current pointer as the 2nd element (rdx) of the function we are jumping to.
        "mov rdx, rsp",
        // Change the stack pointer to the passed value.
        "mov rsp, rsi",

        // Set deallocation stack
        "pop rax",
        "mov [r10 + 0x1478], rax",
        // Set stack limit
        "pop rax",
        "mov [r10 + 0x10], rax",
        // Set stack base
        "pop rax",
        "mov [r10 + 0x08], rax",

        // Set the frame pointer according to the new stack.
        "pop rbp",
        "pop rbx",
        // Get the next instruction to jump to.
        "pop rax",
        "jmp rax",
        "2:",
        inout("rsi") new_sp => _,
        inout("rcx") arg => ret_val, // 1st argument to called function
        out("rdx") ret_sp, // 2nd argument to called function
        // Callee saved registers on Windows, the code we are jumping to is free to use them.
        out("rdi") _,
        out("r12") _, out("r13") _, out("r14") _, out("r15") _,
        out("xmm6") _, out("xmm7") _, out("xmm8") _, out("xmm9") _,
        out("xmm10") _, out("xmm11") _, out("xmm12") _, out("xmm13") _,
        out("xmm14") _, out("xmm15") _,
        clobber_abi("C"),
    );

    (ret_val, ret_sp)
}
