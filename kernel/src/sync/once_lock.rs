//! `OnceLock`, `LazyLock` and `GlobalState` — small building blocks for
//! kernel singletons that avoid `static mut`.

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, Ordering},
};

use spin::Mutex;

/// A cell that can be written at most once, after which reads never block.
pub struct OnceLock<T> {
    initialized: AtomicBool,
    value: UnsafeCell<Option<T>>,
}

// SAFETY: access to `value` is gated by `initialized`, which is only ever
// flipped true after the write in `set` completes (Release), and readers
// synchronize with Acquire. Concurrent `set` calls race on `initialized`
// but only one wins; the loser's value is simply dropped.
unsafe impl<T: Send> Sync for OnceLock<T> {}

impl<T> OnceLock<T> {
    pub const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            value: UnsafeCell::new(None),
        }
    }

    /// Set the value. Returns `Err(value)` if already initialized.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self.initialized.load(Ordering::Acquire) {
            return Err(value);
        }
        // SAFETY: the caller observed `initialized == false`; only the
        // first successful `compare_exchange` below actually writes.
        unsafe {
            *self.value.get() = Some(value);
        }
        match self
            .initialized
            .compare_exchange(false, true, Ordering::Release, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(_) => {
                // Someone beat us to it; undo our write.
                // SAFETY: we are the only writer left, since the winner's
                // value is already committed and visible.
                unsafe {
                    *self.value.get() = None;
                }
                Err(value)
            }
        }
    }

    pub fn get(&self) -> Option<&T> {
        if self.initialized.load(Ordering::Acquire) {
            // SAFETY: initialized is true, so the write in `set` happened-before
            // this read under the Acquire/Release pair above.
            unsafe { (*self.value.get()).as_ref() }
        } else {
            None
        }
    }
}

impl<T> Default for OnceLock<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A value computed on first access from a const-constructible closure.
pub struct LazyLock<T, F = fn() -> T> {
    cell: OnceLock<T>,
    init: Mutex<Option<F>>,
}

impl<T, F: FnOnce() -> T> LazyLock<T, F> {
    pub const fn new(f: F) -> Self {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(Some(f)),
        }
    }

    pub fn get(&self) -> &T {
        if let Some(v) = self.cell.get() {
            return v;
        }
        let mut guard = self.init.lock();
        if let Some(f) = guard.take() {
            // Ignore the Err case: another thread raced us and won, which is fine.
            let _ = self.cell.set(f());
        }
        drop(guard);
        self.cell.get().expect("LazyLock initializer did not run")
    }
}

/// A `Mutex<Option<T>>` wrapper for kernel subsystems that are constructed
/// once at boot and then accessed from many call sites without threading an
/// explicit handle through every function signature.
pub struct GlobalState<T> {
    inner: Mutex<Option<T>>,
}

impl<T> GlobalState<T> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub fn init(&self, value: T) {
        *self.inner.lock() = Some(value);
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        let value = guard.as_mut().expect("GlobalState used before init");
        f(value)
    }

    pub fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.inner.lock();
        guard.as_mut().map(f)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().is_some()
    }
}

impl<T> Default for GlobalState<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_lock_set_once() {
        let lock: OnceLock<u32> = OnceLock::new();
        assert!(lock.get().is_none());
        assert_eq!(lock.set(42), Ok(()));
        assert_eq!(lock.get(), Some(&42));
        assert_eq!(lock.set(7), Err(7));
        assert_eq!(lock.get(), Some(&42));
    }

    #[test]
    fn lazy_lock_runs_once() {
        static CALLS: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);
        let lazy = LazyLock::new(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            99
        });
        assert_eq!(*lazy.get(), 99);
        assert_eq!(*lazy.get(), 99);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn global_state_with() {
        let state: GlobalState<i32> = GlobalState::new();
        assert!(!state.is_initialized());
        state.init(10);
        state.with(|v| *v += 5);
        assert_eq!(state.with(|v| *v), 15);
    }
}
