//! Syscall number → handler wiring (spec §6's numbering table), built once
//! at first use exactly like the source kernel's `syscall_init` loop: fill
//! every slot with the "not implemented" sentinel, then overwrite the
//! recognized numbers.

use super::{handlers, SyscallHandler, NUM_SYSCALLS};
use crate::sync::LazyLock;

pub static SYSCALL_TABLE: LazyLock<[SyscallHandler; NUM_SYSCALLS], fn() -> [SyscallHandler; NUM_SYSCALLS]> =
    LazyLock::new(build_table);

fn build_table() -> [SyscallHandler; NUM_SYSCALLS] {
    let mut table: [SyscallHandler; NUM_SYSCALLS] = [handlers::sys_unimplemented; NUM_SYSCALLS];

    table[0] = handlers::sys_read;
    table[1] = handlers::sys_write;
    table[2] = handlers::sys_open;
    table[3] = handlers::sys_close;
    table[4] = handlers::sys_stat;
    table[5] = handlers::sys_fstat;
    table[6] = handlers::sys_uname;
    table[7] = handlers::sys_getdents;
    table[8] = handlers::sys_lseek;
    table[9] = handlers::sys_mmap;
    table[10] = handlers::sys_mprotect;
    table[11] = handlers::sys_munmap;
    table[12] = handlers::sys_brk;
    table[24] = handlers::sys_sched_yield;
    table[32] = handlers::sys_dup;
    table[33] = handlers::sys_dup2;
    table[35] = handlers::sys_nanosleep;
    table[39] = handlers::sys_getpid;
    table[57] = handlers::sys_fork;
    table[59] = handlers::sys_execve;
    table[61] = handlers::sys_wait4;
    table[62] = handlers::sys_kill;
    table[63] = handlers::sys_uname;
    table[72] = handlers::sys_fcntl;
    table[76] = handlers::sys_truncate;
    table[77] = handlers::sys_ftruncate;
    table[78] = handlers::sys_getdents;
    table[79] = handlers::sys_getcwd;
    table[80] = handlers::sys_chdir;
    table[82] = handlers::sys_rename;
    table[83] = handlers::sys_mkdir;
    table[84] = handlers::sys_rmdir;
    table[87] = handlers::sys_unlink;
    table[96] = handlers::sys_gettimeofday;
    table[102] = handlers::sys_getuid;
    table[104] = handlers::sys_getgid;
    table[107] = handlers::sys_geteuid;
    table[108] = handlers::sys_getegid;
    table[110] = handlers::sys_getppid;
    table[164] = handlers::sys_mount;
    table[165] = handlers::sys_umount;
    table[185] = handlers::sys_time;

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_numbers_are_not_the_unimplemented_sentinel() {
        let table = SYSCALL_TABLE.get();
        for &n in &[0usize, 1, 57, 59, 61, 164, 165, 185] {
            assert!(
                table[n] as usize != handlers::sys_unimplemented as usize,
                "syscall {n} should have a real handler"
            );
        }
    }

    #[test]
    fn unrecognized_number_is_the_sentinel() {
        let table = SYSCALL_TABLE.get();
        assert!(table[13] as usize == handlers::sys_unimplemented as usize);
    }
}
