//! `/tmp`: stub backend (spec §4.4 explicitly does not require a working
//! in-memory filesystem of the core). Mirrors the source kernel's
//! `tmpfs_ops`: `lookup` and `create` exist and do nothing useful yet;
//! read/write/unlink/readdir are simply absent.

use super::{Filesystem, Inode};
use crate::error::{KernelError, KernelResult};

pub struct TmpFs;

impl TmpFs {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TmpFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for TmpFs {
    fn name(&self) -> &str {
        "tmpfs"
    }

    fn root_inode(&self) -> Inode {
        Inode::directory(0, "/tmp")
    }

    fn lookup(&self, _residual: &str) -> KernelResult<Inode> {
        Err(KernelError::NoSuchFile)
    }

    fn create(&self, _residual: &str, _mode: u32) -> KernelResult<Inode> {
        Err(KernelError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_always_misses() {
        let fs = TmpFs::new();
        assert_eq!(fs.lookup("/anything"), Err(KernelError::NoSuchFile));
    }
}
