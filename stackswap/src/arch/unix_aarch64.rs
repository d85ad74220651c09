use std::arch::asm;

use super::{push, EntryFn};
use crate::stack;

pub unsafe fn init<S: stack::Stack>(stack: &S, f: EntryFn) -> *mut usize {
    let mut sp = stack.bottom();
    // Frame pointer and continuation pair, `f` starts with sp == bottom.
    sp = push(sp, f as usize);
    sp = push(sp, 0);
    // x19 and padding to keep sp 16 byte aligned.
    sp = push(sp, 0);
    sp = push(sp, 0);
    sp
}

#[inline(always)]
pub unsafe fn swap(arg: usize, new_sp: *mut usize) -> (usize, *mut usize) {
    let ret_val: usize;
    let ret_sp: *mut usize;

    asm!(
        "adr x3, 2f",
        "stp x29, x3, [sp, #-16]!",
        // x19 is reserved by LLVM and can't be marked as clobbered.
        "stp x19, xzr, [sp, #-16]!",
        "mov x1, sp",
        "mov sp, x2",
        "ldr x19, [sp], #16",
        "ldp x29, x3, [sp], #16",
        // A fresh stack enters its function with an empty link register.
        "mov x30, xzr",
        "br x3",
        "2:",

        inout("x2") new_sp => _,
        inout("x0") arg => ret_val,
        out("x1") ret_sp, out("x3") _, out("x30") _,

        out("x20") _, out("x21") _, out("x22") _, out("x23") _,
        out("x24") _, out("x25") _, out("x26") _, out("x27") _,
        out("x28") _,

        out("v8") _, out("v9") _, out("v10") _, out("v11") _,
        out("v12") _, out("v13") _, out("v14") _, out("v15") _,
        clobber_abi("C"),
    );

    (ret_val, ret_sp)
}
