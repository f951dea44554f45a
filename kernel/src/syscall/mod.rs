//! Syscall dispatcher (spec §4.6): a fixed 512-entry table of handlers,
//! each taking six 64-bit arguments and returning a 64-bit value, negative
//! for error. Grounded on the source kernel's `syscall_table`/`syscall_init`,
//! restructured around `KernelError` instead of scattered `-errno` literals.

pub mod handlers;
pub mod table;

use crate::error::KernelError;

pub const NUM_SYSCALLS: usize = 512;

pub type SyscallHandler = fn(u64, u64, u64, u64, u64, u64) -> i64;

/// Look up and invoke the handler for `num`. Every index in range is
/// populated (with `sys_unimplemented` where the source has no handler),
/// so this never panics on an unknown number — it returns `-ENOSYS`.
pub fn dispatch(num: u64, a0: u64, a1: u64, a2: u64, a3: u64, a4: u64, a5: u64) -> i64 {
    if num as usize >= NUM_SYSCALLS {
        return KernelError::NotImplemented.as_syscall_return();
    }
    let handler = table::SYSCALL_TABLE.get()[num as usize];
    handler(a0, a1, a2, a3, a4, a5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_index_returns_enosys() {
        assert_eq!(dispatch(511, 0, 0, 0, 0, 0, 0), -38);
    }

    #[test]
    fn out_of_range_index_returns_enosys() {
        assert_eq!(dispatch(999, 0, 0, 0, 0, 0, 0), -38);
    }
}
