//! Scoped silencing of the process-wide stderr descriptor.
//!
//! Native decoders print diagnostics straight to fd 2 even when they report the
//! failure through their return value. [`suppress_stderr`] points fd 2 at the
//! null device for the duration of a closure and restores it on the way out,
//! including when the closure panics.

use std::sync::Mutex;

/// fd 2 is shared by every thread, so suppression windows must not overlap.
static SUPPRESS_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` with stderr redirected to the null device. Not reentrant.
pub fn suppress_stderr<T>(f: impl FnOnce() -> T) -> T {
    let _serial = SUPPRESS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = StderrGuard::acquire();
    f()
}

#[cfg(unix)]
struct StderrGuard {
    saved: Option<libc::c_int>,
}

#[cfg(unix)]
impl StderrGuard {
    fn acquire() -> Self {
        // SAFETY: plain descriptor juggling; every fd opened here is closed or
        // handed to the guard, which restores and closes it on drop.
        unsafe {
            let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
            if devnull < 0 {
                return Self { saved: None };
            }
            let saved = libc::dup(libc::STDERR_FILENO);
            if saved < 0 {
                libc::close(devnull);
                return Self { saved: None };
            }
            if libc::dup2(devnull, libc::STDERR_FILENO) < 0 {
                libc::close(saved);
                libc::close(devnull);
                return Self { saved: None };
            }
            libc::close(devnull);
            Self { saved: Some(saved) }
        }
    }
}

#[cfg(unix)]
impl Drop for StderrGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            // SAFETY: `saved` is a descriptor this guard owns.
            unsafe {
                libc::dup2(saved, libc::STDERR_FILENO);
                libc::close(saved);
            }
        }
    }
}

#[cfg(not(unix))]
struct StderrGuard;

#[cfg(not(unix))]
impl StderrGuard {
    fn acquire() -> Self {
        StderrGuard
    }
}
