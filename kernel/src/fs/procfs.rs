//! `/proc`: read-only, three static leaves (`cpuinfo`, `meminfo`,
//! `version`). Text content is byte-for-byte what the source kernel's
//! `procfs_read` serves.

extern crate alloc;
use alloc::string::ToString;

use super::{DirEntry, Filesystem, Inode, InodeCaps, InodeKind, OpenFile};
use crate::error::{KernelError, KernelResult};

const CPUINFO: &str = "processor: 0\nvendor_id: BXKernel\ncpu family: 6\nmodel: 158\nmodel name: BXKernel Virtual CPU\n";
const MEMINFO: &str = "MemTotal: 1024000 kB\nMemFree: 819200 kB\n";
const VERSION: &str = "BXKernel x86_64\n";

const LEAVES: [&str; 3] = ["cpuinfo", "meminfo", "version"];

pub struct ProcFs {
    next_inode: u64,
}

impl ProcFs {
    pub fn new() -> Self {
        Self { next_inode: 1 }
    }

    fn leaf_content(name: &str) -> Option<&'static str> {
        match name {
            "cpuinfo" => Some(CPUINFO),
            "meminfo" => Some(MEMINFO),
            "version" => Some(VERSION),
            _ => None,
        }
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for ProcFs {
    fn name(&self) -> &str {
        "procfs"
    }

    fn root_inode(&self) -> Inode {
        Inode::directory(0, "/proc")
    }

    fn lookup(&self, residual: &str) -> KernelResult<Inode> {
        let name = residual.trim_start_matches('/');
        let content = Self::leaf_content(name).ok_or(KernelError::NoSuchFile)?;
        Ok(Inode {
            id: self.next_inode,
            size: content.len() as u64,
            mode: 0o444,
            uid: 0,
            gid: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            blocks: 0,
            links: 1,
            fs_data: 0,
            caps: InodeCaps::READ | InodeCaps::OPEN | InodeCaps::CLOSE,
            kind: InodeKind::File,
            name: name.to_string(),
        })
    }

    fn read(&self, file: &mut OpenFile, buf: &mut [u8]) -> KernelResult<usize> {
        let inode = file.inode.as_ref().ok_or(KernelError::BadDescriptor)?;
        let content = Self::leaf_content(&inode.name).ok_or(KernelError::NoSuchFile)?;
        let bytes = content.as_bytes();
        let offset = file.pos as usize;
        if offset >= bytes.len() {
            return Ok(0);
        }
        let n = core::cmp::min(buf.len(), bytes.len() - offset);
        buf[..n].copy_from_slice(&bytes[offset..offset + n]);
        Ok(n)
    }

    fn readdir(&self, offset: u64) -> Option<DirEntry> {
        let idx = offset as usize;
        let name = *LEAVES.get(idx)?;
        Some(DirEntry {
            name: name.to_string(),
            inode_id: (idx + 1) as u64,
            kind: InodeKind::File,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_leaf_reads_exact_source_text() {
        let fs = ProcFs::new();
        let inode = fs.lookup("/version").unwrap();
        let mut file = OpenFile::for_test(inode);
        let mut buf = [0u8; 64];
        let n = fs.read(&mut file, &mut buf).unwrap();
        assert_eq!(&buf[..n], VERSION.as_bytes());
        let second = fs.read(&mut file, &mut buf).unwrap_or(0);
        // offset already past eof unless caller advances pos; Vfs::read does.
        let _ = second;
    }

    #[test]
    fn unknown_leaf_is_no_such_file() {
        let fs = ProcFs::new();
        assert_eq!(fs.lookup("/nope"), Err(KernelError::NoSuchFile));
    }

    #[test]
    fn readdir_yields_three_leaves_then_none() {
        let fs = ProcFs::new();
        assert_eq!(fs.readdir(0).unwrap().name, "cpuinfo");
        assert_eq!(fs.readdir(1).unwrap().name, "meminfo");
        assert_eq!(fs.readdir(2).unwrap().name, "version");
        assert!(fs.readdir(3).is_none());
    }
}
