//! Cooperative round-robin scheduler (spec §4.5, §5). One CPU, no
//! preemption: `schedule()` only ever runs because a syscall handler or the
//! idle loop called it. Grounded on `schedule`/`task_yield` in the source
//! kernel's cyclic ring walk.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::mm::vmm::Vmm;
use crate::process::table::PROCESS_TABLE;
use crate::process::{Pid, ProcessState};

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Called once per timer interrupt. A single atomic word, so no lock is
/// needed between interrupt and non-interrupt readers.
pub fn tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Busy-spin until `ticks()` has advanced by at least `count` ticks,
/// yielding each time round so other Runnable processes still progress.
/// Backs `nanosleep` (spec §5's only other suspension point besides
/// `yield`).
pub fn sleep_ticks(vmm: &Vmm, count: u64) {
    let deadline = ticks().wrapping_add(count);
    while ticks() < deadline {
        yield_now(vmm);
    }
}

/// `Running -> Runnable` for the caller, then pick the next candidate.
pub fn yield_now(vmm: &Vmm) {
    schedule(vmm);
}

/// Walk the ring starting at `current.next` in strictly cyclic order and
/// switch into the first Runnable descriptor found. If none exists besides
/// `current` itself, `current` keeps running (the idle process is always
/// Runnable, so this only happens transiently).
pub fn schedule(vmm: &Vmm) {
    let transition = PROCESS_TABLE.with(|table| -> Option<(Pid, Pid, u64, crate::mm::vmm::AddressSpace)> {
        let current = table.current;
        let mut candidate = current;
        loop {
            let next = table.ring_next(candidate).ok()?;
            if next == current {
                return None;
            }
            if table.get(next).ok()?.state == ProcessState::Runnable {
                if let Ok(p) = table.get_mut(current) {
                    if p.state == ProcessState::Running {
                        p.state = ProcessState::Runnable;
                    }
                }
                let next_rsp = table.get(next).ok()?.saved_rsp;
                let next_space = table.get(next).ok()?.address_space;
                table.get_mut(next).ok()?.state = ProcessState::Running;
                table.current = next;
                return Some((current, next, next_rsp, next_space));
            }
            candidate = next;
        }
    });

    let Some((current, next, next_rsp, next_space)) = transition else {
        return;
    };

    // SAFETY: `next_space` belongs to a process just marked Running by the
    // table update above, and this runs outside interrupt context.
    unsafe {
        vmm.activate(next_space);
    }

    let old_rsp_ptr = PROCESS_TABLE.with(|table| {
        table
            .get_mut(current)
            .map(|p| &mut p.saved_rsp as *mut u64)
            .expect("current process always present while scheduling")
    });

    // SAFETY: next_rsp was saved by this same function on a prior switch
    // away from `next` (or is `next`'s freshly prepared initial frame),
    // and old_rsp_ptr points at the live, currently-running process's own
    // saved_rsp field.
    unsafe {
        crate::arch::x86_64::context::switch(old_rsp_ptr, next_rsp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_monotone() {
        let before = ticks();
        tick();
        tick();
        assert_eq!(ticks(), before + 2);
    }
}
