//! Individual syscall handlers. Every handler takes six `u64` arguments
//! (the x86-64 ABI's register slots) and returns an `i64`: non-negative is
//! success, negative is `-errno`. Grounded on the source kernel's
//! `sys_*` functions; restructured to go through `KernelError` and this
//! crate's `Vfs`/`ProcessTable`/`Vmm` rather than raw global arrays.

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::fs::{InodeKind, SEEK_CUR, SEEK_END, SEEK_SET, VFS};
use crate::mm::vmm::{AddressSpace, PageFlags};
use crate::mm::{VirtAddr, PAGE_SIZE, PFA, VMM};
use crate::process::table::PROCESS_TABLE;
use crate::process::{elf, Pid};
use crate::sched;

const PROT_WRITE: u64 = 0x2;
const MAP_FIXED: u64 = 0x10;

/// Default fallback installed at every slot not named in spec §6's table.
pub fn sys_unimplemented(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    KernelError::NotImplemented.as_syscall_return()
}

fn err(e: KernelError) -> i64 {
    e.as_syscall_return()
}

fn check_ptr(ptr: u64) -> KernelResult<()> {
    if ptr == 0 {
        Err(KernelError::InvalidArgument)
    } else {
        Ok(())
    }
}

/// Read a NUL-terminated path string out of the current address space.
///
/// # Safety
/// `ptr` must point at memory mapped and readable in the currently active
/// address space; syscall arguments are always user pointers in that space
/// by construction of the dispatch path.
unsafe fn read_cstr(ptr: u64, max_len: usize) -> KernelResult<String> {
    check_ptr(ptr)?;
    let mut s = String::new();
    for i in 0..max_len {
        let byte = *((ptr + i as u64) as *const u8);
        if byte == 0 {
            return Ok(s);
        }
        s.push(byte as char);
    }
    Err(KernelError::InvalidArgument)
}

/// # Safety
/// Same contract as [`read_cstr`]: `ptr`/`len` must describe memory mapped
/// in the currently active address space.
unsafe fn user_slice_mut<'a>(ptr: u64, len: u64) -> &'a mut [u8] {
    core::slice::from_raw_parts_mut(ptr as *mut u8, len as usize)
}

/// # Safety
/// Same contract as [`read_cstr`]: `ptr`/`len` must describe memory mapped
/// in the currently active address space.
unsafe fn user_slice<'a>(ptr: u64, len: u64) -> &'a [u8] {
    core::slice::from_raw_parts(ptr as *const u8, len as usize)
}

fn current_pid() -> Pid {
    PROCESS_TABLE.with(|t| t.current)
}

// --- I/O -------------------------------------------------------------

pub fn sys_read(fd: u64, buf: u64, count: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if count == 0 {
        return 0;
    }
    if check_ptr(buf).is_err() {
        return err(KernelError::InvalidArgument);
    }
    // SAFETY: count != 0 and buf != 0 were just checked; buf/count come
    // straight from the calling process's own registers.
    let dst = unsafe { user_slice_mut(buf, count) };

    if fd == 0 {
        let mut n = 0usize;
        while n < dst.len() {
            match crate::drivers::console::read_input_byte() {
                Some(b) => {
                    dst[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        return n as i64;
    }

    match do_read(fd, dst) {
        Ok(n) => n as i64,
        Err(e) => err(e),
    }
}

fn do_read(fd: u64, dst: &mut [u8]) -> KernelResult<usize> {
    let handle = PROCESS_TABLE.with(|t| {
        let p = t.get(t.current)?;
        p.fds
            .get(fd as usize)
            .copied()
            .flatten()
            .ok_or(KernelError::BadDescriptor)
    })?;
    VFS.with(|vfs| vfs.read(handle, dst))
}

pub fn sys_write(fd: u64, buf: u64, count: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if count == 0 {
        return 0;
    }
    if check_ptr(buf).is_err() {
        return err(KernelError::InvalidArgument);
    }
    // SAFETY: see sys_read.
    let src = unsafe { user_slice(buf, count) };

    if fd == 1 || fd == 2 {
        for &b in src {
            crate::drivers::console::putchar(b);
        }
        return src.len() as i64;
    }

    match do_write(fd, src) {
        Ok(n) => n as i64,
        Err(e) => err(e),
    }
}

fn do_write(fd: u64, src: &[u8]) -> KernelResult<usize> {
    let handle = PROCESS_TABLE.with(|t| {
        let p = t.get(t.current)?;
        p.fds
            .get(fd as usize)
            .copied()
            .flatten()
            .ok_or(KernelError::BadDescriptor)
    })?;
    VFS.with(|vfs| vfs.write(handle, src))
}

pub fn sys_open(path_ptr: u64, flags: u64, mode: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    // SAFETY: checked for null inside read_cstr before any dereference.
    let path = match unsafe { read_cstr(path_ptr, 4096) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    match open_path(&path, flags as u32, mode as u32) {
        Ok(fd) => fd as i64,
        Err(e) => err(e),
    }
}

fn open_path(path: &str, flags: u32, mode: u32) -> KernelResult<usize> {
    let handle = VFS.with(|vfs| vfs.open(path, flags, mode))?;
    PROCESS_TABLE.with(|t| {
        let pid = t.current;
        let p = t.get_mut(pid)?;
        let fd = p.lowest_free_fd().ok_or(KernelError::TooManyFiles)?;
        p.fds[fd] = Some(handle);
        Ok(fd)
    })
}

pub fn sys_close(fd: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    let result = PROCESS_TABLE.with(|t| {
        let pid = t.current;
        let p = t.get_mut(pid)?;
        let slot = p.fds.get_mut(fd as usize).ok_or(KernelError::BadDescriptor)?;
        let handle = slot.take().ok_or(KernelError::BadDescriptor)?;
        Ok(handle)
    });
    match result {
        Ok(handle) => match VFS.with(|vfs| vfs.close(handle)) {
            Ok(()) => 0,
            Err(e) => err(e),
        },
        Err(e) => err(e),
    }
}

pub fn sys_lseek(fd: u64, offset: u64, whence: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    let whence = whence as i32;
    if ![SEEK_SET, SEEK_CUR, SEEK_END].contains(&whence) {
        return err(KernelError::InvalidArgument);
    }
    let handle = match PROCESS_TABLE.with(|t| {
        let p = t.get(t.current)?;
        p.fds.get(fd as usize).copied().flatten().ok_or(KernelError::BadDescriptor)
    }) {
        Ok(h) => h,
        Err(e) => return err(e),
    };
    match VFS.with(|vfs| vfs.lseek(handle, offset as i64, whence)) {
        Ok(pos) => pos as i64,
        Err(e) => err(e),
    }
}

pub fn sys_getdents(fd: u64, buf_ptr: u64, count: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if count == 0 {
        return 0;
    }
    if check_ptr(buf_ptr).is_err() {
        return err(KernelError::InvalidArgument);
    }
    let handle = match PROCESS_TABLE.with(|t| {
        let p = t.get(t.current)?;
        p.fds.get(fd as usize).copied().flatten().ok_or(KernelError::BadDescriptor)
    }) {
        Ok(h) => h,
        Err(e) => return err(e),
    };

    // Each synthesized dirent is written as a fixed 256-byte NUL-padded
    // name followed by a one-byte type tag, as many as fit in `count`.
    const ENTRY_SIZE: u64 = 257;
    let max_entries = count / ENTRY_SIZE;
    // SAFETY: buf_ptr/count checked non-null/non-zero above.
    let dst = unsafe { user_slice_mut(buf_ptr, count) };

    let mut offset = 0u64;
    let mut written = 0u64;
    while written < max_entries {
        match VFS.with(|vfs| vfs.getdents(handle, offset)) {
            Ok(Some(entry)) => {
                let base = (written * ENTRY_SIZE) as usize;
                let name_bytes = entry.name.as_bytes();
                let n = core::cmp::min(name_bytes.len(), 255);
                dst[base..base + n].copy_from_slice(&name_bytes[..n]);
                dst[base + n..base + 256].fill(0);
                dst[base + 256] = match entry.kind {
                    InodeKind::Directory => 1,
                    InodeKind::File => 0,
                };
                written += 1;
                offset += 1;
            }
            Ok(None) => break,
            Err(e) => return err(e),
        }
    }
    (written * ENTRY_SIZE) as i64
}

// --- metadata ----------------------------------------------------------

/// Binary layout written for `stat`/`fstat`: eight `u64`s in the order
/// `{size, mode, uid, gid, atime, mtime, ctime, links}`.
fn write_stat(buf_ptr: u64, inode: &crate::fs::Inode) -> KernelResult<()> {
    check_ptr(buf_ptr)?;
    let fields: [u64; 8] = [
        inode.size,
        inode.mode as u64,
        inode.uid as u64,
        inode.gid as u64,
        inode.atime,
        inode.mtime,
        inode.ctime,
        inode.links as u64,
    ];
    // SAFETY: buf_ptr checked non-null; caller supplies 64 bytes per the
    // fixed layout documented above.
    unsafe {
        for (i, f) in fields.iter().enumerate() {
            core::ptr::write((buf_ptr + (i as u64) * 8) as *mut u64, *f);
        }
    }
    Ok(())
}

pub fn sys_stat(path_ptr: u64, statbuf_ptr: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if check_ptr(statbuf_ptr).is_err() {
        return err(KernelError::InvalidArgument);
    }
    // SAFETY: checked for null inside read_cstr before any dereference.
    let path = match unsafe { read_cstr(path_ptr, 4096) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    let result = VFS.with(|vfs| -> KernelResult<crate::fs::Inode> {
        let handle = vfs.open(&path, 0, 0)?;
        let inode = vfs.open_files.get(handle)?.inode.clone();
        let _ = vfs.close(handle);
        inode.ok_or(KernelError::BadDescriptor)
    });
    match result {
        Ok(inode) => match write_stat(statbuf_ptr, &inode) {
            Ok(()) => 0,
            Err(e) => err(e),
        },
        Err(e) => err(e),
    }
}

pub fn sys_fstat(fd: u64, statbuf_ptr: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if check_ptr(statbuf_ptr).is_err() {
        return err(KernelError::InvalidArgument);
    }
    let handle = match PROCESS_TABLE.with(|t| {
        let p = t.get(t.current)?;
        p.fds.get(fd as usize).copied().flatten().ok_or(KernelError::BadDescriptor)
    }) {
        Ok(h) => h,
        Err(e) => return err(e),
    };
    let inode = match VFS.with(|vfs| vfs.open_files.get(handle).map(|f| f.inode.clone())) {
        Ok(Some(inode)) => inode,
        Ok(None) => return err(KernelError::BadDescriptor),
        Err(e) => return err(e),
    };
    match write_stat(statbuf_ptr, &inode) {
        Ok(()) => 0,
        Err(e) => err(e),
    }
}

pub fn sys_uname(buf_ptr: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if check_ptr(buf_ptr).is_err() {
        return err(KernelError::InvalidArgument);
    }
    // Six 65-byte NUL-padded fields: sysname, nodename, release, version,
    // machine, domainname, matching the conventional `struct utsname`.
    let fields = [
        "BXKernel",
        "localhost",
        "0.1.0",
        env!("GIT_HASH"),
        "x86_64",
        "",
    ];
    // SAFETY: buf_ptr checked non-null; caller supplies 6*65 bytes.
    unsafe {
        for (i, field) in fields.iter().enumerate() {
            let base = buf_ptr + (i as u64) * 65;
            let bytes = field.as_bytes();
            let n = core::cmp::min(bytes.len(), 64);
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), base as *mut u8, n);
            *((base + n as u64) as *mut u8) = 0;
        }
    }
    0
}

// --- memory --------------------------------------------------------

pub fn sys_mmap(addr: u64, len: u64, prot: u64, flags: u64, _fd: u64, _offset: u64) -> i64 {
    if len == 0 {
        return err(KernelError::InvalidArgument);
    }
    let num_pages = (len as usize).div_ceil(PAGE_SIZE);
    let page_flags = if prot & PROT_WRITE != 0 {
        PageFlags::WRITABLE | PageFlags::USER
    } else {
        PageFlags::USER
    };

    let result = PROCESS_TABLE.with(|t| -> KernelResult<u64> {
        let pid = t.current;
        let space: AddressSpace = t.get(pid)?.address_space;

        let base = if addr != 0 {
            addr
        } else {
            t.get(pid)?.mmap_next
        };
        let base_aligned = base & !(PAGE_SIZE as u64 - 1);

        if flags & MAP_FIXED != 0 {
            for i in 0..num_pages {
                let v = VirtAddr::new(base_aligned + (i * PAGE_SIZE) as u64);
                if VMM.with(|vmm| vmm.translate(space, v)).is_some() {
                    return Err(KernelError::InvalidArgument);
                }
            }
        }

        for i in 0..num_pages {
            let v = VirtAddr::new(base_aligned + (i * PAGE_SIZE) as u64);
            let phys = PFA.with(|pfa| pfa.alloc_zeroed_frame())?;
            VMM.with(|vmm| vmm.map(space, v, phys, page_flags))?;
        }

        if addr == 0 {
            t.get_mut(pid)?.mmap_next = base_aligned + (num_pages * PAGE_SIZE) as u64;
        }
        Ok(base_aligned)
    });

    match result {
        Ok(v) => v as i64,
        Err(e) => err(e),
    }
}

pub fn sys_munmap(addr: u64, len: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if len == 0 {
        return err(KernelError::InvalidArgument);
    }
    let num_pages = (len as usize).div_ceil(PAGE_SIZE);
    let result = PROCESS_TABLE.with(|t| -> KernelResult<()> {
        let pid = t.current;
        let space = t.get(pid)?.address_space;
        for i in 0..num_pages {
            let v = VirtAddr::new(addr + (i * PAGE_SIZE) as u64);
            if let Ok(phys) = VMM.with(|vmm| vmm.unmap(space, v)) {
                PFA.with(|pfa| pfa.free_frame(phys));
            }
        }
        Ok(())
    });
    match result {
        Ok(()) => 0,
        Err(e) => err(e),
    }
}

pub fn sys_mprotect(_addr: u64, len: u64, _prot: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if len == 0 {
        return err(KernelError::InvalidArgument);
    }
    // Permission narrowing on an existing mapping isn't modeled beyond the
    // mmap-time flags; accept the call so callers that only ever widen
    // permissions back to what they mmap'd with aren't spuriously broken.
    0
}

const USER_HEAP_SIZE: u64 = 8 * 1024 * 1024;

pub fn sys_brk(new_brk: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    PROCESS_TABLE.with(|t| {
        let pid = t.current;
        let proc = match t.get_mut(pid) {
            Ok(p) => p,
            Err(e) => return err(e),
        };
        if new_brk == 0 {
            return proc.brk as i64;
        }
        if new_brk > proc.heap + USER_HEAP_SIZE {
            return err(KernelError::OutOfMemory);
        }
        proc.brk = new_brk;
        proc.brk as i64
    })
}

// --- process control -------------------------------------------------

pub fn sys_getpid(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    current_pid() as i64
}

pub fn sys_getppid(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    match PROCESS_TABLE.with(|t| t.get(t.current).map(|p| p.ppid)) {
        Ok(ppid) => ppid as i64,
        Err(e) => err(e),
    }
}

pub fn sys_fork(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    let result = VMM.with(|vmm| {
        PROCESS_TABLE.with(|t| {
            let pid = t.current;
            t.fork(vmm, pid)
        })
    });
    let child_pid = match result {
        Ok(child_pid) => child_pid,
        Err(e) => return err(e),
    };

    // `fork()` copies the parent's fds array as-is; every inherited handle
    // now has two owners (parent and child) but only one reference counted
    // in the open-file table, so bump each one to match before either side
    // can close its copy.
    let inherited = match PROCESS_TABLE.with(|t| t.get(child_pid).map(|p| p.fds)) {
        Ok(fds) => fds,
        Err(e) => return err(e),
    };
    VFS.with(|vfs| {
        for handle in inherited.iter().flatten() {
            let _ = vfs.dup(*handle);
        }
    });

    child_pid as i64
}

pub fn sys_execve(path_ptr: u64, _argv_ptr: u64, _envp_ptr: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    // SAFETY: checked for null inside read_cstr before any dereference.
    let path = match unsafe { read_cstr(path_ptr, 4096) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };

    let result = VMM.with(|vmm| -> KernelResult<u64> {
        let space: AddressSpace = PROCESS_TABLE.with(|t| t.get(t.current).map(|p| p.address_space))?;
        let argv: Vec<Vec<u8>> = alloc::vec![path.as_bytes().to_vec()];

        let handle = VFS.with(|vfs| vfs.open(&path, 0, 0))?;
        let mut image = alloc::vec![0u8; 0];
        let size = {
            let inode = VFS.with(|vfs| vfs.open_files.get(handle).map(|f| f.inode.clone()))?
                .ok_or(KernelError::NotExecutable)?;
            inode.size as usize
        };
        image.resize(size, 0);
        VFS.with(|vfs| vfs.read(handle, &mut image))?;
        VFS.with(|vfs| vfs.close(handle))?;

        let loaded = elf::load(vmm, space, &image)?;
        let argv_refs: Vec<&[u8]> = argv.iter().map(|v| v.as_slice()).collect();
        let stack_top = VirtAddr::new(0x0000_7FFF_FFFF_F000);
        let rsp = elf::install_argv(vmm, space, stack_top, &argv_refs)?;

        PROCESS_TABLE.with(|t| {
            let pid = t.current;
            let proc = t.get_mut(pid)?;
            proc.entry = loaded.entry;
            proc.saved_rsp = rsp;
            Ok::<(), KernelError>(())
        })?;

        Ok(loaded.entry)
    });

    match result {
        Ok(entry) => entry as i64,
        Err(e) => err(e),
    }
}

pub fn sys_kill(pid: u64, signum: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    let result = PROCESS_TABLE.with(|t| {
        let p = t.get_mut(pid as Pid)?;
        p.signal(signum as u32);
        Ok::<(), KernelError>(())
    });
    match result {
        Ok(()) => 0,
        Err(e) => err(e),
    }
}

/// Not in the source's syscall table: added per the zombie-reaping open
/// question. Busy-spins (yielding each round) until a matching Zombie
/// child exists.
pub fn sys_wait4(pid: u64, status_ptr: u64, _options: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    let target = if (pid as i64) < 0 { None } else { Some(pid as Pid) };
    let parent = current_pid();

    loop {
        let reaped = PROCESS_TABLE.with(|t| t.reap(parent, target));
        match reaped {
            Ok(Some((child_pid, exit_code))) => {
                if status_ptr != 0 {
                    // SAFETY: status_ptr checked non-zero.
                    unsafe {
                        core::ptr::write(status_ptr as *mut i32, exit_code);
                    }
                }
                return child_pid as i64;
            }
            Ok(None) => {
                VMM.with(|vmm| sched::yield_now(vmm));
            }
            Err(e) => return err(e),
        }
    }
}

pub fn sys_sched_yield(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    VMM.with(|vmm| sched::yield_now(vmm));
    0
}

pub fn sys_nanosleep(req_ptr: u64, _rem_ptr: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if check_ptr(req_ptr).is_err() {
        return err(KernelError::InvalidArgument);
    }
    // SAFETY: req_ptr checked non-null; layout is {seconds: u64, nanos: u64}.
    let (secs, nanos) = unsafe {
        (
            *(req_ptr as *const u64),
            *((req_ptr + 8) as *const u64),
        )
    };
    let ticks = secs.saturating_mul(1000) + nanos / 1_000_000;
    VMM.with(|vmm| sched::sleep_ticks(vmm, ticks));
    0
}

pub fn sys_dup(fd: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    let result = PROCESS_TABLE.with(|t| -> KernelResult<usize> {
        let pid = t.current;
        let handle = {
            let p = t.get(pid)?;
            p.fds.get(fd as usize).copied().flatten().ok_or(KernelError::BadDescriptor)?
        };
        let dupped = VFS.with(|vfs| vfs.dup(handle))?;
        let p = t.get_mut(pid)?;
        let new_fd = p.lowest_free_fd().ok_or(KernelError::TooManyFiles)?;
        p.fds[new_fd] = Some(dupped);
        Ok(new_fd)
    });
    match result {
        Ok(fd) => fd as i64,
        Err(e) => err(e),
    }
}

pub fn sys_dup2(oldfd: u64, newfd: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if newfd as usize >= crate::fs::MAX_FDS {
        return err(KernelError::BadDescriptor);
    }
    let result = PROCESS_TABLE.with(|t| -> KernelResult<usize> {
        let pid = t.current;
        let handle = {
            let p = t.get(pid)?;
            p.fds.get(oldfd as usize).copied().flatten().ok_or(KernelError::BadDescriptor)?
        };
        let dupped = VFS.with(|vfs| vfs.dup(handle))?;
        let p = t.get_mut(pid)?;
        if let Some(old) = p.fds[newfd as usize].take() {
            let _ = VFS.with(|vfs| vfs.close(old));
        }
        p.fds[newfd as usize] = Some(dupped);
        Ok(newfd as usize)
    });
    match result {
        Ok(fd) => fd as i64,
        Err(e) => err(e),
    }
}

pub fn sys_fcntl(fd: u64, cmd: u64, _arg: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    const F_DUPFD: u64 = 0;
    if cmd == F_DUPFD {
        return sys_dup(fd, 0, 0, 0, 0, 0);
    }
    err(KernelError::InvalidArgument)
}

// --- filesystem --------------------------------------------------------

pub fn sys_truncate(_path_ptr: u64, _len: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    err(KernelError::ReadOnlyFs)
}

pub fn sys_ftruncate(_fd: u64, _len: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    err(KernelError::ReadOnlyFs)
}

pub fn sys_getcwd(buf_ptr: u64, len: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if check_ptr(buf_ptr).is_err() {
        return err(KernelError::InvalidArgument);
    }
    let cwd = match PROCESS_TABLE.with(|t| t.get(t.current).map(|p| p.cwd.clone())) {
        Ok(cwd) => cwd,
        Err(e) => return err(e),
    };
    let bytes = cwd.as_bytes();
    if bytes.len() as u64 + 1 > len {
        return err(KernelError::InvalidArgument);
    }
    // SAFETY: buf_ptr checked non-null; fits by the length check above.
    unsafe {
        core::ptr::copy_nonoverlapping(bytes.as_ptr(), buf_ptr as *mut u8, bytes.len());
        *((buf_ptr + bytes.len() as u64) as *mut u8) = 0;
    }
    bytes.len() as i64
}

pub fn sys_chdir(path_ptr: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    // SAFETY: checked for null inside read_cstr before any dereference.
    let path = match unsafe { read_cstr(path_ptr, 4096) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    let result = PROCESS_TABLE.with(|t| {
        let pid = t.current;
        let p = t.get_mut(pid)?;
        p.cwd = path.clone();
        Ok::<(), KernelError>(())
    });
    match result {
        Ok(()) => 0,
        Err(e) => err(e),
    }
}

pub fn sys_rename(_old_ptr: u64, _new_ptr: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    err(KernelError::ReadOnlyFs)
}

pub fn sys_mkdir(path_ptr: u64, mode: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    // SAFETY: checked for null inside read_cstr before any dereference.
    let path = match unsafe { read_cstr(path_ptr, 4096) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    let _ = (path, mode);
    err(KernelError::ReadOnlyFs)
}

pub fn sys_rmdir(path_ptr: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    // SAFETY: checked for null inside read_cstr before any dereference.
    let path = match unsafe { read_cstr(path_ptr, 4096) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    let _ = path;
    err(KernelError::ReadOnlyFs)
}

pub fn sys_unlink(path_ptr: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    // SAFETY: checked for null inside read_cstr before any dereference.
    let path = match unsafe { read_cstr(path_ptr, 4096) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    let _ = path;
    err(KernelError::ReadOnlyFs)
}

pub fn sys_mount(_source: u64, target_ptr: u64, fstype_ptr: u64, _flags: u64, _data: u64, _a5: u64) -> i64 {
    // SAFETY: checked for null inside read_cstr before any dereference.
    let target = match unsafe { read_cstr(target_ptr, 256) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    // SAFETY: checked for null inside read_cstr before any dereference.
    let fstype = match unsafe { read_cstr(fstype_ptr, 32) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    match VFS.with(|vfs| vfs.mount(&target, &fstype)) {
        Ok(()) => 0,
        Err(e) => err(e),
    }
}

pub fn sys_umount(target_ptr: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    // SAFETY: checked for null inside read_cstr before any dereference.
    let target = match unsafe { read_cstr(target_ptr, 256) } {
        Ok(p) => p,
        Err(e) => return err(e),
    };
    match VFS.with(|vfs| vfs.umount(&target)) {
        Ok(()) => 0,
        Err(e) => err(e),
    }
}

// --- identity / time --------------------------------------------------

pub fn sys_getuid(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    0
}
pub fn sys_getgid(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    0
}
pub fn sys_geteuid(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    0
}
pub fn sys_getegid(_a0: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    0
}

pub fn sys_time(time_ptr: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    let secs = (sched::ticks() / 1000) as i64;
    if time_ptr != 0 {
        // SAFETY: time_ptr checked non-zero.
        unsafe {
            core::ptr::write(time_ptr as *mut i64, secs);
        }
    }
    secs
}

pub fn sys_gettimeofday(tv_ptr: u64, _tz_ptr: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
    if check_ptr(tv_ptr).is_err() {
        return err(KernelError::InvalidArgument);
    }
    let ticks = sched::ticks();
    let secs = ticks / 1000;
    let usecs = (ticks % 1000) * 1000;
    // SAFETY: tv_ptr checked non-null; layout {seconds: u64, useconds: u64}.
    unsafe {
        core::ptr::write(tv_ptr as *mut u64, secs);
        core::ptr::write((tv_ptr + 8) as *mut u64, usecs);
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_zero_count_never_touches_buffer() {
        assert_eq!(sys_read(0, 0, 0, 0, 0, 0), 0);
    }

    #[test]
    fn write_zero_count_never_touches_buffer() {
        assert_eq!(sys_write(1, 0, 0, 0, 0, 0), 0);
    }

    #[test]
    fn open_with_null_path_is_invalid_argument() {
        assert_eq!(sys_open(0, 0, 0, 0, 0, 0), KernelError::InvalidArgument.as_syscall_return());
    }

    #[test]
    fn mmap_zero_length_is_invalid_argument() {
        assert_eq!(sys_mmap(0, 0, 0, 0, 0, 0), KernelError::InvalidArgument.as_syscall_return());
    }

    #[test]
    fn munmap_zero_length_is_invalid_argument() {
        assert_eq!(sys_munmap(0, 0, 0, 0, 0, 0), KernelError::InvalidArgument.as_syscall_return());
    }

    #[test]
    fn fcntl_unknown_command_is_invalid_argument() {
        assert_eq!(sys_fcntl(0, 999, 0, 0, 0, 0), KernelError::InvalidArgument.as_syscall_return());
    }

    #[test]
    fn uids_are_all_root() {
        assert_eq!(sys_getuid(0, 0, 0, 0, 0, 0), 0);
        assert_eq!(sys_getgid(0, 0, 0, 0, 0, 0), 0);
    }
}
