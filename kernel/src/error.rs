//! Kernel-wide error type and the errno mapping that crosses the syscall
//! boundary.
//!
//! Every fallible operation inside the core returns a [`KernelResult`].
//! Syscall handlers convert the `Err` arm to a negative errno exactly once,
//! at [`KernelError::errno`], rather than scattering `-ENOENT`-style
//! literals through the call graph.

use core::fmt;

/// Unified kernel error type, one variant per error kind the core must
/// distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    NoSuchFile,
    BadDescriptor,
    OutOfMemory,
    TooManyFiles,
    NotADirectory,
    InvalidArgument,
    NotImplemented,
    ReadOnlyFs,
    NoSuchProcess,
    NoDevice,
    NotExecutable,
}

impl KernelError {
    /// The positive errno magnitude a negative syscall return carries.
    pub const fn errno(self) -> i64 {
        match self {
            KernelError::NoSuchFile => 2,       // ENOENT
            KernelError::NoSuchProcess => 3,    // ESRCH (kept distinct from NoSuchFile)
            KernelError::BadDescriptor => 9,    // EBADF
            KernelError::OutOfMemory => 12,     // ENOMEM
            KernelError::InvalidArgument => 22, // EINVAL
            KernelError::NotADirectory => 20,   // ENOTDIR
            KernelError::TooManyFiles => 24,    // EMFILE
            KernelError::ReadOnlyFs => 30,      // EROFS
            KernelError::NotExecutable => 8,    // ENOEXEC
            KernelError::NoDevice => 19,        // ENODEV
            KernelError::NotImplemented => 38,  // ENOSYS
        }
    }

    /// The negative syscall return value for this error.
    pub const fn as_syscall_return(self) -> i64 {
        -self.errno()
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::NoSuchFile => "no such file",
            KernelError::BadDescriptor => "bad file descriptor",
            KernelError::OutOfMemory => "out of memory",
            KernelError::TooManyFiles => "too many open files",
            KernelError::NotADirectory => "not a directory",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::NotImplemented => "not implemented",
            KernelError::ReadOnlyFs => "read-only filesystem",
            KernelError::NoSuchProcess => "no such process",
            KernelError::NoDevice => "no such device",
            KernelError::NotExecutable => "exec format error",
        };
        f.write_str(msg)
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Errno sentinel returned by an unpopulated syscall table slot.
pub const ENOSYS: i64 = KernelError::NotImplemented.errno();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_values_are_positive_and_distinct() {
        let all = [
            KernelError::NoSuchFile,
            KernelError::BadDescriptor,
            KernelError::OutOfMemory,
            KernelError::TooManyFiles,
            KernelError::NotADirectory,
            KernelError::InvalidArgument,
            KernelError::NotImplemented,
            KernelError::ReadOnlyFs,
            KernelError::NoSuchProcess,
            KernelError::NoDevice,
            KernelError::NotExecutable,
        ];
        for e in all {
            assert!(e.errno() > 0);
            assert_eq!(e.as_syscall_return(), -e.errno());
        }
    }
}
