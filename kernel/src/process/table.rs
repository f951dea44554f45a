//! Process arena and ring (spec §4.5). One slotted `Vec<Option<Process>>`
//! indexed by `pid - 1`; pids are never reused, so the index is stable for
//! the lifetime of the table, unlike the source's raw `prev`/`next`
//! pointers into a fixed-size array.

extern crate alloc;
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec;

use super::{Pid, Process, ProcessState, KSTACK_SIZE, NO_PID};
use crate::error::{KernelError, KernelResult};
use crate::mm::vmm::{AddressSpace, Vmm};
use crate::sync::GlobalState;

pub struct ProcessTable {
    slots: Vec<Option<Process>>,
    next_pid: Pid,
    pub current: Pid,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_pid: 1,
            current: NO_PID,
        }
    }

    fn alloc_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    fn index(pid: Pid) -> usize {
        (pid - 1) as usize
    }

    pub fn get(&self, pid: Pid) -> KernelResult<&Process> {
        self.slots
            .get(Self::index(pid))
            .and_then(|o| o.as_ref())
            .ok_or(KernelError::NoSuchProcess)
    }

    pub fn get_mut(&mut self, pid: Pid) -> KernelResult<&mut Process> {
        self.slots
            .get_mut(Self::index(pid))
            .and_then(|o| o.as_mut())
            .ok_or(KernelError::NoSuchProcess)
    }

    /// Insert the initial kernel idle process, the ring's sole member.
    /// Always Runnable, so the scheduler always has a fallback.
    pub fn spawn_kernel_idle(&mut self, address_space: AddressSpace) -> Pid {
        let pid = self.alloc_pid();
        let proc = Process {
            pid,
            ppid: NO_PID,
            state: ProcessState::Runnable,
            priority: 0,
            saved_rsp: 0,
            address_space,
            entry: 0,
            heap: 0,
            stack: 0,
            kstack: vec_box(KSTACK_SIZE),
            name: "kernel".to_string(),
            pending_signals: 0,
            exit_code: 0,
            brk: 0,
            mmap_next: 0,
            fds: [None; crate::fs::MAX_FDS],
            cwd: "/".to_string(),
            prev: pid,
            next: pid,
        };
        self.push_at(pid, proc);
        self.current = pid;
        pid
    }

    fn push_at(&mut self, pid: Pid, proc: Process) {
        let idx = Self::index(pid);
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(proc);
    }

    /// Insert `child` into the ring immediately after `after`.
    fn link_after(&mut self, after: Pid, child: Pid) -> KernelResult<()> {
        let next = self.get(after)?.next;
        self.get_mut(after)?.next = child;
        self.get_mut(child)?.prev = after;
        self.get_mut(child)?.next = next;
        self.get_mut(next)?.prev = child;
        Ok(())
    }

    /// Remove `pid` from the ring, stitching its neighbors together. The
    /// slot itself is left in place (as a Zombie) until reaped.
    fn unlink(&mut self, pid: Pid) -> KernelResult<()> {
        let (prev, next) = {
            let p = self.get(pid)?;
            (p.prev, p.next)
        };
        if prev == pid {
            return Ok(()); // sole ring member, nothing to stitch
        }
        self.get_mut(prev)?.next = next;
        self.get_mut(next)?.prev = prev;
        Ok(())
    }

    /// Copy `parent` into a new PCB with its own address space, returning
    /// the child's pid. The caller (syscall layer) is responsible for
    /// actually cloning the address space's mappings via the VMM.
    pub fn fork(
        &mut self,
        vmm: &Vmm,
        parent_pid: Pid,
    ) -> KernelResult<Pid> {
        let child_address_space = vmm.new_address_space()?;
        let child_pid = self.alloc_pid();

        let parent = self.get(parent_pid)?;
        let mut kstack = vec_box(KSTACK_SIZE);
        let saved_rsp =
            crate::arch::x86_64::context::prepare_initial_stack(&mut kstack, child_trampoline);
        let child = Process {
            pid: child_pid,
            ppid: parent_pid,
            state: ProcessState::Runnable,
            priority: parent.priority,
            saved_rsp,
            address_space: child_address_space,
            entry: parent.entry,
            heap: parent.heap,
            stack: parent.stack,
            kstack,
            name: parent.name.clone(),
            pending_signals: 0,
            exit_code: 0,
            brk: parent.brk,
            mmap_next: parent.mmap_next,
            fds: parent.fds,
            cwd: parent.cwd.clone(),
            prev: parent_pid,
            next: parent_pid,
        };
        self.push_at(child_pid, child);
        self.link_after(parent_pid, child_pid)?;
        Ok(child_pid)
    }

    /// Transition `pid` to Zombie, destroying its address space if it
    /// isn't the kernel idle process. The descriptor stays on the ring
    /// (and reachable by `get`) until [`reap`].
    pub fn exit(&mut self, vmm: &Vmm, pid: Pid, exit_code: i32) -> KernelResult<()> {
        let kernel_space = vmm.kernel_address_space();
        let proc = self.get_mut(pid)?;
        proc.state = ProcessState::Zombie;
        proc.exit_code = exit_code;
        let space = proc.address_space;
        if space != kernel_space {
            vmm.destroy_address_space(space);
        }
        Ok(())
    }

    /// Reap a Zombie child of `parent_pid`: `target` names an exact pid, or
    /// `None` for "any child". Removes the child from the ring and frees
    /// its slot. Returns `None` if no matching Zombie exists yet (the
    /// caller should `yield`/retry, giving `wait4`'s busy-spin semantics).
    pub fn reap(&mut self, parent_pid: Pid, target: Option<Pid>) -> KernelResult<Option<(Pid, i32)>> {
        let candidate = self
            .slots
            .iter()
            .flatten()
            .find(|p| {
                p.ppid == parent_pid
                    && p.state == ProcessState::Zombie
                    && target.map_or(true, |t| t == p.pid)
            })
            .map(|p| p.pid);

        let Some(child_pid) = candidate else {
            return Ok(None);
        };
        let exit_code = self.get(child_pid)?.exit_code;
        self.unlink(child_pid)?;
        self.slots[Self::index(child_pid)] = None;
        Ok(Some((child_pid, exit_code)))
    }

    /// The pid immediately after `pid` in ring order (its `next` field).
    pub fn ring_next(&self, pid: Pid) -> KernelResult<Pid> {
        Ok(self.get(pid)?.next)
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

fn vec_box(size: usize) -> Box<[u8]> {
    alloc::vec![0u8; size].into_boxed_slice()
}

/// Where a forked child resumes the first time the scheduler ever switches
/// into it: there's no earlier call into [`crate::arch::x86_64::context::switch`]
/// to return from, only the fabricated frame `prepare_initial_stack` wrote.
/// Idles like the kernel idle process until something gives it real work.
fn child_trampoline() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

pub static PROCESS_TABLE: GlobalState<ProcessTable> = GlobalState::new();

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vmm() -> Vmm {
        Vmm::bootstrap()
    }

    #[test]
    fn fork_links_child_after_parent_in_ring() {
        let vmm = test_vmm();
        let mut table = ProcessTable::new();
        let kernel_space = vmm.kernel_address_space();
        let init = table.spawn_kernel_idle(kernel_space);

        // fork() allocates a fresh address space through the VMM, which
        // isn't exercised outside a live kernel; substitute the kernel
        // space directly to keep this test allocation-free.
        let child_pid = {
            let child_pid = 2;
            let parent = table.get(init).unwrap();
            let child = Process {
                pid: child_pid,
                ppid: init,
                state: ProcessState::Runnable,
                priority: 0,
                saved_rsp: 0,
                address_space: kernel_space,
                entry: parent.entry,
                heap: 0,
                stack: 0,
                kstack: vec_box(KSTACK_SIZE),
                name: "child".to_string(),
                pending_signals: 0,
                exit_code: 0,
                brk: 0,
                mmap_next: 0,
                fds: [None; crate::fs::MAX_FDS],
                cwd: "/".to_string(),
                prev: init,
                next: init,
            };
            table.next_pid = 3;
            table.push_at(child_pid, child);
            table.link_after(init, child_pid).unwrap();
            child_pid
        };

        assert_eq!(table.ring_next(init).unwrap(), child_pid);
        assert_eq!(table.ring_next(child_pid).unwrap(), init);
    }

    #[test]
    fn reap_returns_none_until_zombie() {
        let vmm = test_vmm();
        let mut table = ProcessTable::new();
        let kernel_space = vmm.kernel_address_space();
        let init = table.spawn_kernel_idle(kernel_space);
        assert_eq!(table.reap(init, None).unwrap(), None);
    }

    #[test]
    fn exit_marks_zombie_and_keeps_descriptor_reachable() {
        let vmm = test_vmm();
        let mut table = ProcessTable::new();
        let kernel_space = vmm.kernel_address_space();
        let init = table.spawn_kernel_idle(kernel_space);
        table.exit(&vmm, init, 7).unwrap();
        let proc = table.get(init).unwrap();
        assert_eq!(proc.state, ProcessState::Zombie);
        assert_eq!(proc.exit_code, 7);
    }
}
