//! Process model (spec §3, §4.5): PCB fields, fork/exec/exit, and the
//! arena + integer-handle ring the source's raw doubly-linked pointers are
//! redesigned into (spec §9 design note).

pub mod elf;
pub mod table;

extern crate alloc;
use alloc::string::{String, ToString};

use crate::fs::{FileHandle, MAX_FDS};
use crate::mm::vmm::AddressSpace;

pub type Pid = u32;

pub const NAME_MAX: usize = 31;
pub const NO_PID: Pid = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Runnable,
    Running,
    Zombie,
}

/// One process control block. `prev`/`next` are ring neighbors by `Pid`,
/// not pointers — `NO_PID` (0) never names a live process, so it doubles
/// as the ring's "no neighbor yet" sentinel during construction.
pub struct Process {
    pub pid: Pid,
    pub ppid: Pid,
    pub state: ProcessState,
    pub priority: i32,
    pub saved_rsp: u64,
    pub address_space: AddressSpace,
    pub entry: u64,
    pub heap: u64,
    pub stack: u64,
    pub kstack: alloc::boxed::Box<[u8]>,
    pub name: String,
    pub pending_signals: u64,
    pub exit_code: i32,
    pub brk: u64,
    pub mmap_next: u64,
    pub fds: [Option<FileHandle>; MAX_FDS],
    pub cwd: String,
    pub prev: Pid,
    pub next: Pid,
}

pub const KSTACK_SIZE: usize = 16 * 1024;

impl Process {
    pub fn truncated_name(name: &str) -> String {
        if name.len() <= NAME_MAX {
            name.to_string()
        } else {
            name[..NAME_MAX].to_string()
        }
    }

    /// Find the lowest-numbered unused fd slot, per §4.4's open() contract.
    pub fn lowest_free_fd(&self) -> Option<usize> {
        self.fds.iter().position(Option::is_none)
    }

    pub fn signal(&mut self, signum: u32) {
        self.pending_signals |= 1 << (signum & 63);
    }
}
