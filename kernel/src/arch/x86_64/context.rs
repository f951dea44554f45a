//! Cooperative context switch: save callee-saved registers and the stack
//! pointer for the outgoing process, load them for the incoming one. No
//! floating-point/SSE state is saved; the core never uses it.

use core::arch::asm;

/// Swap kernel stacks. `old_rsp` receives the outgoing stack pointer after
/// its registers are pushed; `new_rsp` is loaded before the incoming
/// registers are popped off it.
///
/// # Safety
/// `new_rsp` must point into a kernel stack previously saved by an earlier
/// call to this same function (or a freshly prepared initial frame with the
/// same six-register layout), and `old_rsp` must be a valid write target.
#[inline(never)]
pub unsafe fn switch(old_rsp: *mut u64, new_rsp: u64) {
    asm!(
        "push rbx",
        "push rbp",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbp",
        "pop rbx",
        "ret",
        in("rdi") old_rsp,
        in("rsi") new_rsp,
    );
}

/// Fabricate the six-register-plus-return-address frame [`switch`] expects
/// to find on a stack it's resuming, for a process that has never actually
/// run and so has no such frame of its own. `entry` is the address `switch`
/// lands on via its trailing `ret` the first time this stack is switched
/// into; callee-saved registers are zeroed since nothing has set up real
/// values for them yet. Returns the `rsp` to store as the process's
/// `saved_rsp`.
pub fn prepare_initial_stack(kstack: &mut [u8], entry: fn() -> !) -> u64 {
    const FRAME_WORDS: usize = 7;
    let top = kstack.as_mut_ptr() as usize + kstack.len();
    let frame_addr = (top - FRAME_WORDS * 8) & !0xF;
    let frame = frame_addr as *mut u64;

    // SAFETY: frame_addr..frame_addr+56 lies within kstack (kstack is
    // always at least one page, far larger than this frame) and this
    // process's kstack isn't shared with anything else yet.
    unsafe {
        core::ptr::write(frame, 0); // r15
        core::ptr::write(frame.add(1), 0); // r14
        core::ptr::write(frame.add(2), 0); // r13
        core::ptr::write(frame.add(3), 0); // r12
        core::ptr::write(frame.add(4), 0); // rbp
        core::ptr::write(frame.add(5), 0); // rbx
        core::ptr::write(frame.add(6), entry as u64); // return address
    }
    frame_addr as u64
}
