//! Synchronization primitives used to avoid `static mut` for kernel
//! singletons.

mod once_lock;

pub use once_lock::{GlobalState, LazyLock, OnceLock};
