/*!
 * Pending Inspector
 * Read-only queries of kernel signal state
 */

use crate::mask::MaskController;
use crate::set::SignalSet;
use crate::types::{Signal, SignalDisposition, SignalError, SignalResult, NSIG};
use nix::errno::Errno;
use nix::libc;
use std::mem::MaybeUninit;

/// Read-only view of pending/blocked sets and dispositions
///
/// Never mutates kernel state; every method is a single query syscall.
#[derive(Debug, Default, Clone, Copy)]
pub struct PendingInspector;

impl PendingInspector {
    /// Signals that arrived while blocked and are pending at the kernel
    pub fn pending_signals(&self) -> SignalResult<SignalSet> {
        let raw = unsafe {
            let mut raw = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigemptyset(raw.as_mut_ptr());
            // SAFETY: sigpending fills the full sigset_t behind the pointer.
            if libc::sigpending(raw.as_mut_ptr()) != 0 {
                return Err(SignalError::QueryFailed(format!(
                    "sigpending: {}",
                    Errno::last()
                )));
            }
            raw.assume_init()
        };
        Ok(set_from_raw(&raw))
    }

    /// The calling thread's current mask
    pub fn blocked_signals(&self) -> SignalResult<SignalSet> {
        MaskController::current_mask().map_err(|e| SignalError::QueryFailed(e.to_string()))
    }

    /// What the OS will currently do when `sig` is delivered
    pub fn disposition(&self, sig: Signal) -> SignalResult<SignalDisposition> {
        let old = unsafe {
            let mut old = MaybeUninit::<libc::sigaction>::uninit();
            // SAFETY: a null act pointer makes sigaction query-only.
            if libc::sigaction(sig.number(), std::ptr::null(), old.as_mut_ptr()) != 0 {
                return Err(SignalError::QueryFailed(format!(
                    "sigaction query for {}: {}",
                    sig,
                    Errno::last()
                )));
            }
            old.assume_init()
        };
        Ok(match old.sa_sigaction {
            libc::SIG_DFL => SignalDisposition::Default,
            libc::SIG_IGN => SignalDisposition::Ignore,
            _ => SignalDisposition::Handler,
        })
    }
}

fn set_from_raw(raw: &libc::sigset_t) -> SignalSet {
    let mut set = SignalSet::empty();
    for n in 1..NSIG {
        // SAFETY: n is a valid signal number for sigismember.
        if unsafe { libc::sigismember(raw, n) } == 1 {
            if let Ok(sig) = Signal::from_number(n) {
                set.add(sig);
            }
        }
    }
    set
}
