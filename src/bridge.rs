/*!
 * Bridge Lifecycle
 * Process-wide install and uninstall of signal capture
 */

use crate::capture;
use crate::channel::{ChannelShared, SignalChannel};
use crate::mask::MaskController;
use crate::set::SignalSet;
use crate::types::{CaptureMode, Signal, SignalError, SignalResult};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use nix::sys::signal::SigAction;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

/// Install-time knobs
#[derive(Debug, Clone, Copy)]
pub struct InstallOptions {
    /// Capture policy: `Counting` collapses repeats per signal, `Ordered`
    /// preserves arrival order across signals
    pub mode: CaptureMode,
    /// Replace an existing installation instead of failing with
    /// `AlreadyInstalled`
    pub replace: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Counting,
            replace: false,
        }
    }
}

/// Registry entry: the pre-install OS action plus the owning channel
///
/// `original` is kept across replacements so uninstall always restores the
/// true pre-install disposition.
struct Installed {
    original: SigAction,
    shared: Arc<ChannelShared>,
}

// All disposition mutation funnels through this registry; signals are a
// process-wide resource, so the table is process-wide too.
fn registry() -> &'static DashMap<i32, Installed, RandomState> {
    static REGISTRY: OnceLock<DashMap<i32, Installed, RandomState>> = OnceLock::new();
    REGISTRY.get_or_init(|| DashMap::with_hasher(RandomState::new()))
}

// Serializes install/uninstall so a multi-signal install is never observed
// half-applied by a concurrent lifecycle call
static LIFECYCLE: Mutex<()> = Mutex::new(());

/// Install capture for every signal in `set`, returning the consumer channel
///
/// Re-installing an already-captured signal fails with `AlreadyInstalled`
/// unless `options.replace` is set; a replaced signal moves to the new
/// channel and its old channel is closed once it has no signals left. A
/// failure partway rolls back every signal this call already installed, so
/// a failed install leaves system state unchanged.
pub fn install(set: SignalSet, options: InstallOptions) -> SignalResult<SignalChannel> {
    let _lifecycle = LIFECYCLE.lock();

    if set.is_empty() {
        return Err(SignalError::InstallFailed("empty signal set".to_string()));
    }
    // validate before touching process state
    for sig in set.iter() {
        if !sig.can_catch() {
            return Err(SignalError::InvalidSignal(sig.number()));
        }
        if !options.replace && registry().contains_key(&sig.number()) {
            return Err(SignalError::AlreadyInstalled(sig));
        }
    }

    let shared = Arc::new(ChannelShared::new(set, options.mode)?);
    let mut installed: Vec<Signal> = Vec::with_capacity(set.len());

    for sig in set.iter() {
        match install_one(sig, &shared) {
            Ok(()) => installed.push(sig),
            Err(e) => {
                warn!(
                    "install of {} failed, rolling back {} signals: {}",
                    sig,
                    installed.len(),
                    e
                );
                for prior in installed {
                    if let Err(rollback) = uninstall_locked(prior) {
                        warn!("rollback of {} failed: {}", prior, rollback);
                    }
                }
                return Err(e);
            }
        }
    }

    info!("installed capture for {}", set);
    Ok(SignalChannel::new(shared))
}

fn install_one(sig: Signal, shared: &Arc<ChannelShared>) -> SignalResult<()> {
    // keep the signal from firing on this thread mid-swap
    let mut guard = MaskController::block(SignalSet::of(&[sig]))?;

    let prior_action = capture::install_os_handler(sig)?;
    let displaced = capture::publish(sig, shared.clone());

    match registry().entry(sig.number()) {
        Entry::Occupied(mut entry) => {
            // replacement: keep the pre-install action from the first install
            entry.get_mut().shared = shared.clone();
        }
        Entry::Vacant(entry) => {
            entry.insert(Installed {
                original: prior_action,
                shared: shared.clone(),
            });
        }
    }

    if let Some(displaced) = displaced {
        if displaced.release_signal(sig) {
            displaced.close();
        }
    }

    guard.restore()?;
    debug!("capture installed for {}", sig);
    Ok(())
}

/// Restore the pre-install disposition for `sig` and release its capture
///
/// Closes the owning channel once its last signal is uninstalled.
/// Uninstalling a signal that was never installed is a logged no-op.
pub fn uninstall(sig: Signal) -> SignalResult<()> {
    let _lifecycle = LIFECYCLE.lock();
    uninstall_locked(sig)
}

fn uninstall_locked(sig: Signal) -> SignalResult<()> {
    let Some((_, entry)) = registry().remove(&sig.number()) else {
        debug!("uninstall of {} skipped: not installed", sig);
        return Ok(());
    };

    let mut guard = MaskController::block(SignalSet::of(&[sig]))?;
    if let Err(e) = capture::restore_os_action(sig, &entry.original) {
        // keep the registry consistent with the still-installed handler
        registry().insert(sig.number(), entry);
        return Err(e);
    }
    capture::unpublish(sig);
    guard.restore()?;

    if entry.shared.release_signal(sig) {
        entry.shared.close();
    }
    info!("uninstalled capture for {}", sig);
    Ok(())
}

/// Signals currently captured by the bridge
pub fn installed_signals() -> SignalSet {
    registry()
        .iter()
        .filter_map(|entry| Signal::from_number(*entry.key()).ok())
        .collect()
}
