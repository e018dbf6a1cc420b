/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use core::{mem, ptr::null_mut};

use libc::{c_int, c_void, siginfo_t, SA_SIGINFO, SIGSEGV, SIG_DFL};
use try_lock::{Locked, TryLock};

use crate::{page_fault::FaultOutcome, userswap_error::UserSwapError};

/// Something that can resolve faults inside of managed memory
pub(crate) trait FaultHandler {
    /// Called from inside of the `SIGSEGV` handler.
    ///
    /// Implementations must not allocate, block or use any other
    /// function that is not safe to be called from a signal handler.
    fn handle_fault(&mut self, addr: usize) -> FaultOutcome;
}

/// The manager that currently receives the faults of this process.
///
/// We need this as the signal handler can not receive any arguments,
/// so the manager has to be reachable from a static.
pub(crate) static FAULT_ACCESS_POINT: FaultAccessPoint = FaultAccessPoint::empty();

pub(crate) struct FaultAccessPoint {
    inner: TryLock<Option<FaultAccessPointInner>>,
}

pub(crate) struct FaultAccessPointInner {
    handler: *mut dyn FaultHandler,

    /// signal action that was active before we installed ours
    previous_action: libc::sigaction,
}

/// As long as this guard lives, faults are not forwarded to the registered handler
pub(crate) struct FaultBlocker<'a> {
    _guard: Locked<'a, Option<FaultAccessPointInner>>,
}

impl FaultAccessPoint {
    pub(crate) const fn empty() -> Self {
        Self {
            inner: TryLock::new(None),
        }
    }

    /// Registers `handler` and installs the `SIGSEGV` handler.
    ///
    /// ### Safety
    ///
    /// You need to make sure that `handler` remains valid until `unset` is called
    /// and that it is not accessed otherwise while no `FaultBlocker` is held.
    ///
    /// If not, this will result in **Undefined Behavior**!
    pub(crate) unsafe fn set(&self, handler: *mut dyn FaultHandler) -> Result<(), UserSwapError> {
        let mut lock_guard = self
            .inner
            .try_lock()
            .ok_or(UserSwapError::HandlerInstall)?;

        if lock_guard.is_some() {
            // there can only be one manager that receives faults
            return Err(UserSwapError::HandlerInstall);
        }

        let previous_action = install_sigsegv_handler()?;
        *lock_guard = Some(FaultAccessPointInner {
            handler,
            previous_action,
        });

        Ok(())
    }

    /// Unregisters `handler` and restores the signal action that was active before `set`
    pub(crate) fn unset(&self, handler: *mut dyn FaultHandler) -> Result<(), UserSwapError> {
        let mut lock_guard = self
            .inner
            .try_lock()
            .ok_or(UserSwapError::HandlerInstall)?;

        match lock_guard.as_ref() {
            Some(inner) if inner.handler as *mut u8 == handler as *mut u8 => {
                let code =
                    unsafe { libc::sigaction(SIGSEGV, &inner.previous_action, null_mut()) };
                *lock_guard = None;

                if code != 0 {
                    return Err(UserSwapError::HandlerInstall);
                }

                Ok(())
            }
            _ => Err(UserSwapError::HandlerInstall),
        }
    }

    /// Keeps faults away from the registered handler while the guard lives.
    ///
    /// Returns `None` if the access point is locked already.
    pub(crate) fn block_faults(&self) -> Option<FaultBlocker<'_>> {
        self.inner
            .try_lock()
            .map(|guard| FaultBlocker { _guard: guard })
    }

    /// Forwards a fault to the registered handler
    pub(crate) fn handle(&self, addr: usize) -> FaultOutcome {
        let lock_guard = match self.inner.try_lock() {
            Some(guard) => guard,
            None => {
                // the manager itself is running right now (or is being set/unset),
                // a fault in there is a bug and should not be resolved
                print_fault_debug("fault while access point is locked\n");
                return FaultOutcome::Untracked;
            }
        };

        match lock_guard.as_ref() {
            Some(inner) => unsafe { (*inner.handler).handle_fault(addr) },
            None => FaultOutcome::Untracked,
        }
    }
}

// the raw handler pointer is only dereferenced while the lock is held
unsafe impl Send for FaultAccessPoint {}
unsafe impl Sync for FaultAccessPoint {}

extern "C" fn sigsegv_handler(_sig: c_int, info: *mut siginfo_t, _context: *mut c_void) {
    let addr = unsafe { (*info).si_addr() } as usize;

    if FAULT_ACCESS_POINT.handle(addr) == FaultOutcome::Untracked {
        print_fault_debug("fault outside of managed memory, using default action\n");

        // the access will be repeated once we return and the default action terminates the process
        unsafe { libc::signal(SIGSEGV, SIG_DFL) };
    }
}

fn install_sigsegv_handler() -> Result<libc::sigaction, UserSwapError> {
    let mut new: libc::sigaction = unsafe { mem::zeroed() };
    new.sa_sigaction = sigsegv_handler as *const () as usize;
    new.sa_flags = SA_SIGINFO;
    unsafe { libc::sigemptyset(&mut new.sa_mask) };

    let mut previous: libc::sigaction = unsafe { mem::zeroed() };
    if unsafe { libc::sigaction(SIGSEGV, &new, &mut previous) } != 0 {
        return Err(UserSwapError::HandlerInstall);
    }

    Ok(previous)
}

/// Writes `text` to stderr, no matter which features are enabled.
///
/// Safe to be called from a signal handler.
pub(crate) fn print_fault_error(text: &str) {
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            text.as_ptr() as *const c_void,
            text.len(),
        )
    };
}

#[cfg(not(feature = "fault_debug_prints"))]
pub(crate) fn print_fault_debug(_text: &str) {
    // do nothing
}

#[cfg(feature = "fault_debug_prints")]
pub(crate) fn print_fault_debug(text: &str) {
    // this could be called from a signal handler, so do not use print
    print_fault_error(text);
}

#[cfg(test)]
mod test {
    use super::{FaultAccessPoint, FaultHandler};
    use crate::page_fault::FaultOutcome;

    struct CountingHandler {
        calls: usize,
        last_addr: usize,
    }

    impl FaultHandler for CountingHandler {
        fn handle_fault(&mut self, addr: usize) -> FaultOutcome {
            self.calls += 1;
            self.last_addr = addr;
            FaultOutcome::Handled
        }
    }

    #[test]
    fn test_empty_access_point_is_untracked() {
        let access_point = FaultAccessPoint::empty();
        assert_eq!(access_point.handle(0x1000), FaultOutcome::Untracked);
    }

    #[test]
    fn test_blocked_access_point_is_untracked() {
        let access_point = FaultAccessPoint::empty();
        let mut handler = CountingHandler {
            calls: 0,
            last_addr: 0,
        };

        // register without installing a real signal handler
        *access_point.inner.try_lock().unwrap() = Some(super::FaultAccessPointInner {
            handler: &mut handler as *mut CountingHandler as *mut dyn FaultHandler,
            previous_action: unsafe { core::mem::zeroed() },
        });

        assert_eq!(access_point.handle(0x1234), FaultOutcome::Handled);

        {
            let _blocker = access_point.block_faults().unwrap();
            assert_eq!(access_point.handle(0x5678), FaultOutcome::Untracked);
        }

        *access_point.inner.try_lock().unwrap() = None;
        assert_eq!(handler.calls, 1);
        assert_eq!(handler.last_addr, 0x1234);
    }
}
