/*!
 * Mask Controller
 * Scoped save-and-restore ownership of the thread signal mask
 */

use crate::set::SignalSet;
use crate::types::{SignalError, SignalResult};
use log::error;
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow};
use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    // Nesting depth of live snapshots on this thread; restores must come
    // back in LIFO order or the saved masks would be clobbered
    static MASK_DEPTH: Cell<u64> = const { Cell::new(0) };
}

/// The thread mask as it was before a block/unblock/replace operation
///
/// Not `Send`: a saved mask is only meaningful on the thread that captured
/// it. Restoring is mandatory on every exit path; `MaskGuard` does it on
/// drop for the common case.
pub struct MaskSnapshot {
    prior: SigSet,
    depth: u64,
    _thread_bound: PhantomData<*const ()>,
}

impl MaskSnapshot {
    /// The mask that will be reinstated by the restore
    pub fn prior_mask(&self) -> SignalSet {
        SignalSet::from_os(&self.prior)
    }
}

/// Owns block/unblock/replace operations on the calling thread's mask
///
/// Signals added to the mask are deferred rather than delivered; they show
/// up in the kernel pending set until the mask is restored.
pub struct MaskController;

impl MaskController {
    /// Add `set` to the thread mask, returning a guard holding the prior mask
    pub fn block(set: SignalSet) -> SignalResult<MaskGuard> {
        Self::change(SigmaskHow::SIG_BLOCK, set)
    }

    /// Remove `set` from the thread mask, returning a guard holding the
    /// prior mask
    pub fn unblock(set: SignalSet) -> SignalResult<MaskGuard> {
        Self::change(SigmaskHow::SIG_UNBLOCK, set)
    }

    /// Replace the thread mask with `set`, returning a guard holding the
    /// prior mask
    pub fn replace(set: SignalSet) -> SignalResult<MaskGuard> {
        Self::change(SigmaskHow::SIG_SETMASK, set)
    }

    /// Read-only query of the current thread mask
    pub fn current_mask() -> SignalResult<SignalSet> {
        let mut prior = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, None, Some(&mut prior))
            .map_err(|e| SignalError::MaskOperationFailed(format!("mask query: {}", e)))?;
        Ok(SignalSet::from_os(&prior))
    }

    /// Reinstate a saved mask
    ///
    /// Fails with `MaskOperationFailed` on an out-of-order restore (the
    /// snapshot is not the innermost live one on this thread) instead of
    /// corrupting outer snapshots. Call at most once per snapshot;
    /// `MaskGuard` enforces that.
    pub fn restore(snapshot: &MaskSnapshot) -> SignalResult<()> {
        let depth = MASK_DEPTH.with(|d| d.get());
        if depth != snapshot.depth {
            return Err(SignalError::MaskOperationFailed(format!(
                "out-of-order mask restore: {} scopes live, snapshot taken at {}",
                depth, snapshot.depth
            )));
        }
        pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&snapshot.prior), None)
            .map_err(|e| SignalError::MaskOperationFailed(format!("mask restore: {}", e)))?;
        MASK_DEPTH.with(|d| d.set(snapshot.depth - 1));
        Ok(())
    }

    fn change(how: SigmaskHow, set: SignalSet) -> SignalResult<MaskGuard> {
        let os_set = set.to_os()?;
        let mut prior = SigSet::empty();
        pthread_sigmask(how, Some(&os_set), Some(&mut prior))
            .map_err(|e| SignalError::MaskOperationFailed(format!("{:?}: {}", how, e)))?;
        let depth = MASK_DEPTH.with(|d| {
            let next = d.get() + 1;
            d.set(next);
            next
        });
        Ok(MaskGuard {
            snapshot: Some(MaskSnapshot {
                prior,
                depth,
                _thread_bound: PhantomData,
            }),
        })
    }
}

/// Scoped mask change; restores the saved mask when dropped
pub struct MaskGuard {
    snapshot: Option<MaskSnapshot>,
}

impl MaskGuard {
    /// Explicitly restore, surfacing the error
    ///
    /// The snapshot is retained on failure so a retry, or the drop
    /// fallback, can still run.
    pub fn restore(&mut self) -> SignalResult<()> {
        if let Some(snapshot) = &self.snapshot {
            MaskController::restore(snapshot)?;
            self.snapshot = None;
        }
        Ok(())
    }

    /// The saved mask, if not yet restored
    pub fn snapshot(&self) -> Option<&MaskSnapshot> {
        self.snapshot.as_ref()
    }

    /// Take ownership of the snapshot, defusing the drop restore
    ///
    /// The caller becomes responsible for passing it to
    /// `MaskController::restore` on every exit path.
    pub fn into_snapshot(mut self) -> Option<MaskSnapshot> {
        self.snapshot.take()
    }
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            if let Err(first) = MaskController::restore(&snapshot) {
                // a stuck mask starves a whole signal class; retry once,
                // then report loudly
                if let Err(second) = MaskController::restore(&snapshot) {
                    error!(
                        "mask restore failed twice, mask may be stuck: {}; retry: {}",
                        first, second
                    );
                }
            }
        }
    }
}
