//! Virtual filesystem (spec §3, §4.4): path resolution through a
//! longest-prefix mount table, a process-scoped descriptor table backed by
//! a global, reference-counted open-file table, and the `procfs`/`tmpfs`
//! backends.
//!
//! Grounded on the teacher's `src/fs/mod.rs` (global accessor over a
//! `Vfs` struct, convenience free functions) but restructured: backends are
//! `Box<dyn Filesystem>` trait objects rather than the teacher's enum
//! dispatch, closer to the source kernel's function-pointer `fs_ops`
//! records per the capability-interface design note, and routing uses true
//! longest-prefix matching rather than first match.

pub mod procfs;
pub mod tmpfs;

extern crate alloc;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::sync::GlobalState;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_FDS: usize = 64;

bitflags::bitflags! {
    /// Which of `{read, write, open, close, ioctl}` an inode answers to.
    /// Missing capabilities fail a dispatch with `ReadOnlyFs`/`NotImplemented`
    /// rather than the backend being asked to handle something it can't.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InodeCaps: u8 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
        const OPEN  = 1 << 2;
        const CLOSE = 1 << 3;
        const IOCTL = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone)]
pub struct Inode {
    pub id: u64,
    pub size: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub blocks: u64,
    pub links: u32,
    pub fs_data: u64,
    pub caps: InodeCaps,
    pub kind: InodeKind,
    pub name: String,
}

impl Inode {
    pub fn directory(id: u64, name: &str) -> Self {
        Self {
            id,
            size: 0,
            mode: 0o755,
            uid: 0,
            gid: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            blocks: 0,
            links: 1,
            fs_data: 0,
            caps: InodeCaps::OPEN | InodeCaps::CLOSE,
            kind: InodeKind::Directory,
            name: truncate_name(name),
        }
    }
}

fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        name.to_string()
    } else {
        name[..MAX_NAME_LEN].to_string()
    }
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub inode_id: u64,
    pub kind: InodeKind,
}

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// An open file instance (spec §3's `File`). Addressed indirectly: a
/// process's `fds` array holds [`FileHandle`]s into the global
/// [`OpenFileTable`], and `dup`/`dup2`/`fork` all bump the same slot's
/// `refcount` rather than copying the struct.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub inode: Option<Inode>,
    pub fs_name: String,
    pub pos: u64,
    pub flags: u32,
    pub mode: u32,
    pub fs_data: u64,
    refcount: u32,
}

impl OpenFile {
    #[cfg(test)]
    pub(crate) fn for_test(inode: Inode) -> Self {
        Self {
            inode: Some(inode),
            fs_name: String::new(),
            pos: 0,
            flags: 0,
            mode: 0,
            fs_data: 0,
            refcount: 1,
        }
    }
}

/// Index into the global open-file table. Distinct from the small-integer
/// file descriptor a process sees: several fds across processes can share
/// one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(usize);

pub struct OpenFileTable {
    slots: Vec<Option<OpenFile>>,
    free: Vec<usize>,
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, file: OpenFile) -> FileHandle {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(file);
            FileHandle(idx)
        } else {
            self.slots.push(Some(file));
            FileHandle(self.slots.len() - 1)
        }
    }

    pub fn get(&self, handle: FileHandle) -> KernelResult<&OpenFile> {
        self.slots
            .get(handle.0)
            .and_then(|o| o.as_ref())
            .ok_or(KernelError::BadDescriptor)
    }

    pub fn get_mut(&mut self, handle: FileHandle) -> KernelResult<&mut OpenFile> {
        self.slots
            .get_mut(handle.0)
            .and_then(|o| o.as_mut())
            .ok_or(KernelError::BadDescriptor)
    }

    /// Record a new descriptor sharing an already-open file (`dup`/`fork`).
    pub fn dup(&mut self, handle: FileHandle) -> KernelResult<FileHandle> {
        self.get_mut(handle)?.refcount += 1;
        Ok(handle)
    }

    /// Drop one reference; frees the slot on the last close.
    pub fn close(&mut self, handle: FileHandle) -> KernelResult<()> {
        let file = self
            .slots
            .get_mut(handle.0)
            .and_then(|o| o.as_mut())
            .ok_or(KernelError::BadDescriptor)?;
        file.refcount -= 1;
        if file.refcount == 0 {
            self.slots[handle.0] = None;
            self.free.push(handle.0);
        }
        Ok(())
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered filesystem type: `procfs`, `tmpfs`, and any number of
/// not-yet-implemented ones kept registered so `mount` resolves the name
/// but fails on an actual operation, matching the source kernel's
/// `register_filesystem(name, NULL, 0)` placeholder entries.
pub trait Filesystem: Send {
    fn name(&self) -> &str;

    fn root_inode(&self) -> Inode;

    fn lookup(&self, residual: &str) -> KernelResult<Inode>;

    fn read(&self, _file: &mut OpenFile, _buf: &mut [u8]) -> KernelResult<usize> {
        Err(KernelError::NotImplemented)
    }

    fn write(&self, _file: &mut OpenFile, _buf: &[u8]) -> KernelResult<usize> {
        Err(KernelError::ReadOnlyFs)
    }

    fn create(&self, _residual: &str, _mode: u32) -> KernelResult<Inode> {
        Err(KernelError::ReadOnlyFs)
    }

    fn unlink(&self, _residual: &str) -> KernelResult<()> {
        Err(KernelError::ReadOnlyFs)
    }

    fn readdir(&self, _offset: u64) -> Option<DirEntry> {
        None
    }
}

struct MountEntry {
    prefix: String,
    fs_name: String,
}

pub struct Vfs {
    registry: Vec<Box<dyn Filesystem>>,
    mounts: Vec<MountEntry>,
    pub open_files: OpenFileTable,
}

impl Vfs {
    pub fn new() -> Self {
        Self {
            registry: Vec::new(),
            mounts: Vec::new(),
            open_files: OpenFileTable::new(),
        }
    }

    pub fn register_filesystem(&mut self, backend: Box<dyn Filesystem>) {
        self.registry.push(backend);
    }

    fn backend(&self, fs_name: &str) -> Option<&dyn Filesystem> {
        self.registry
            .iter()
            .find(|b| b.name() == fs_name)
            .map(|b| b.as_ref())
    }

    pub fn mount(&mut self, target: &str, fstype: &str) -> KernelResult<()> {
        if self.backend(fstype).is_none() {
            return Err(KernelError::NoDevice);
        }
        self.mounts.push(MountEntry {
            prefix: target.to_string(),
            fs_name: fstype.to_string(),
        });
        Ok(())
    }

    pub fn umount(&mut self, target: &str) -> KernelResult<()> {
        let before = self.mounts.len();
        self.mounts.retain(|m| m.prefix != target);
        if self.mounts.len() == before {
            return Err(KernelError::NoSuchFile);
        }
        Ok(())
    }

    /// Longest-prefix match over the mount table; `(fs_name, residual_path)`.
    fn resolve<'p>(&self, path: &'p str) -> KernelResult<(&str, &'p str)> {
        let mut best: Option<&MountEntry> = None;
        for m in &self.mounts {
            if path.starts_with(m.prefix.as_str()) {
                if best.map_or(true, |b| m.prefix.len() > b.prefix.len()) {
                    best = Some(m);
                }
            }
        }
        let entry = best.ok_or(KernelError::NoSuchFile)?;
        Ok((entry.fs_name.as_str(), &path[entry.prefix.len()..]))
    }

    pub fn open(&mut self, path: &str, flags: u32, mode: u32) -> KernelResult<FileHandle> {
        let (fs_name, residual) = self.resolve(path)?;
        let backend = self.backend(fs_name).ok_or(KernelError::NoSuchFile)?;
        let inode = if residual.is_empty() || residual == "/" {
            backend.root_inode()
        } else {
            backend.lookup(residual)?
        };
        let file = OpenFile {
            inode: Some(inode),
            fs_name: fs_name.to_string(),
            pos: 0,
            flags,
            mode,
            fs_data: 0,
            refcount: 1,
        };
        Ok(self.open_files.insert(file))
    }

    pub fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> KernelResult<usize> {
        let fs_name = self.open_files.get(handle)?.fs_name.clone();
        let backend = self.backend(&fs_name).ok_or(KernelError::NoSuchFile)?;
        let file = self.open_files.get_mut(handle)?;
        let n = backend.read(file, buf)?;
        file.pos += n as u64;
        Ok(n)
    }

    pub fn write(&mut self, handle: FileHandle, buf: &[u8]) -> KernelResult<usize> {
        let fs_name = self.open_files.get(handle)?.fs_name.clone();
        let backend = self.backend(&fs_name).ok_or(KernelError::NoSuchFile)?;
        let file = self.open_files.get_mut(handle)?;
        let n = backend.write(file, buf)?;
        file.pos += n as u64;
        Ok(n)
    }

    pub fn lseek(&mut self, handle: FileHandle, offset: i64, whence: i32) -> KernelResult<u64> {
        let file = self.open_files.get_mut(handle)?;
        let base = match whence {
            SEEK_SET => 0,
            SEEK_CUR => file.pos as i64,
            SEEK_END => {
                let inode = file.inode.as_ref().ok_or(KernelError::BadDescriptor)?;
                inode.size as i64
            }
            _ => return Err(KernelError::InvalidArgument),
        };
        let new_pos = base + offset;
        if new_pos < 0 {
            return Err(KernelError::InvalidArgument);
        }
        file.pos = new_pos as u64;
        Ok(file.pos)
    }

    pub fn close(&mut self, handle: FileHandle) -> KernelResult<()> {
        self.open_files.close(handle)
    }

    pub fn dup(&mut self, handle: FileHandle) -> KernelResult<FileHandle> {
        self.open_files.dup(handle)
    }

    /// `.` at offset 0, `..` at offset 1, then `backend.readdir(offset - 2)`
    /// until it returns `None`.
    pub fn getdents(&mut self, handle: FileHandle, offset: u64) -> KernelResult<Option<DirEntry>> {
        match offset {
            0 => Ok(Some(DirEntry {
                name: ".".to_string(),
                inode_id: 0,
                kind: InodeKind::Directory,
            })),
            1 => Ok(Some(DirEntry {
                name: "..".to_string(),
                inode_id: 0,
                kind: InodeKind::Directory,
            })),
            n => {
                let fs_name = self.open_files.get(handle)?.fs_name.clone();
                let backend = self.backend(&fs_name).ok_or(KernelError::NoSuchFile)?;
                Ok(backend.readdir(n - 2))
            }
        }
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

pub static VFS: GlobalState<Vfs> = GlobalState::new();

/// Register the built-in backends and the not-yet-implemented disk
/// filesystem names, mirroring the source kernel's boot-time
/// `filesystem_init`.
pub fn init() {
    let mut vfs = Vfs::new();
    vfs.register_filesystem(Box::new(procfs::ProcFs::new()));
    vfs.register_filesystem(Box::new(tmpfs::TmpFs::new()));
    for name in ["ext2", "ext3", "ext4", "fat", "fat32", "ntfs", "iso9660"] {
        vfs.register_filesystem(Box::new(UnimplementedFs::new(name)));
    }
    vfs.mount("/proc", "procfs").expect("procfs must be registered");
    vfs.mount("/tmp", "tmpfs").expect("tmpfs must be registered");
    VFS.init(vfs);
    log::info!("fs: procfs mounted at /proc, tmpfs at /tmp");
}

/// A registered name with no working backend. `mount` against it succeeds
/// (the name resolves) but every actual operation fails, same as the
/// source's `register_filesystem(name, NULL, 0)` disk filesystem stubs.
struct UnimplementedFs {
    name: String,
}

impl UnimplementedFs {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Filesystem for UnimplementedFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn root_inode(&self) -> Inode {
        Inode::directory(0, "/")
    }

    fn lookup(&self, _residual: &str) -> KernelResult<Inode> {
        Err(KernelError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubFs(&'static str);
    impl Filesystem for StubFs {
        fn name(&self) -> &str {
            self.0
        }
        fn root_inode(&self) -> Inode {
            Inode::directory(0, "/")
        }
        fn lookup(&self, residual: &str) -> KernelResult<Inode> {
            Ok(Inode::directory(1, residual))
        }
    }

    #[test]
    fn longest_prefix_wins_over_shorter() {
        let mut vfs = Vfs::new();
        vfs.register_filesystem(Box::new(StubFs("a")));
        vfs.register_filesystem(Box::new(StubFs("b")));
        vfs.mount("/", "a").unwrap();
        vfs.mount("/mnt/data", "b").unwrap();

        let (fs_name, residual) = vfs.resolve("/mnt/data/file.txt").unwrap();
        assert_eq!(fs_name, "b");
        assert_eq!(residual, "/file.txt");

        let (fs_name, _) = vfs.resolve("/etc/passwd").unwrap();
        assert_eq!(fs_name, "a");
    }

    #[test]
    fn dup_then_close_leaves_original_usable() {
        let mut vfs = Vfs::new();
        vfs.register_filesystem(Box::new(StubFs("stub")));
        vfs.mount("/", "stub").unwrap();
        let fd = vfs.open("/x", 0, 0).unwrap();
        let dupped = vfs.dup(fd).unwrap();
        vfs.close(dupped).unwrap();
        assert!(vfs.open_files.get(fd).is_ok());
        vfs.close(fd).unwrap();
        assert!(vfs.open_files.get(fd).is_err());
    }

    #[test]
    fn getdents_synthesizes_dot_and_dotdot_first() {
        let mut vfs = Vfs::new();
        vfs.register_filesystem(Box::new(procfs::ProcFs::new()));
        vfs.mount("/proc", "procfs").unwrap();
        let fd = vfs.open("/proc", 0, 0).unwrap();
        let dot = vfs.getdents(fd, 0).unwrap().unwrap();
        let dotdot = vfs.getdents(fd, 1).unwrap().unwrap();
        assert_eq!(dot.name, ".");
        assert_eq!(dotdot.name, "..");
    }

    #[test]
    fn mount_with_unregistered_name_fails() {
        let mut vfs = Vfs::new();
        assert_eq!(vfs.mount("/mnt", "nonexistent"), Err(KernelError::NoDevice));
    }
}
