/*!
 * Signal Capture
 * The async-signal-safe producer installed as the process signal handler
 */

use crate::channel::ChannelShared;
use crate::types::{Signal, SignalError, SignalResult, NSIG};
use arc_swap::ArcSwapOption;
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};
use std::sync::Arc;

const SLOT_COUNT: usize = NSIG as usize;

/// One handler-visible slot per signal number
struct CaptureSlot {
    channel: ArcSwapOption<ChannelShared>,
}

// Process-wide slot table read by the handler. Index 0 is unused; slot `n`
// belongs to signal number `n`.
static SLOTS: [CaptureSlot; SLOT_COUNT] =
    [const { CaptureSlot { channel: ArcSwapOption::const_empty() } }; SLOT_COUNT];

#[inline]
fn slot_index(signo: libc::c_int) -> Option<usize> {
    if (1..NSIG).contains(&signo) {
        Some(signo as usize)
    } else {
        None
    }
}

/// The installed handler
///
/// Runs in signal context, possibly nested, possibly on any thread not
/// blocking the signal. It records the occurrence and posts the wake,
/// nothing else: atomics, a lock-free queue push, and one `write(2)`.
/// `errno` is saved and restored for the interrupted thread.
pub(crate) extern "C" fn capture_handler(signo: libc::c_int) {
    let saved_errno = Errno::last_raw();
    if let Some(idx) = slot_index(signo) {
        let chan = SLOTS[idx].channel.load();
        if let Some(chan) = chan.as_ref() {
            chan.record(signo);
        }
    }
    Errno::set_raw(saved_errno);
}

/// Publish `channel` as the capture target for `sig`, returning the
/// displaced target if one was installed
pub(crate) fn publish(sig: Signal, channel: Arc<ChannelShared>) -> Option<Arc<ChannelShared>> {
    SLOTS[sig.number() as usize].channel.swap(Some(channel))
}

/// Clear the capture target for `sig`
pub(crate) fn unpublish(sig: Signal) -> Option<Arc<ChannelShared>> {
    SLOTS[sig.number() as usize].channel.swap(None)
}

/// Swap in the capture handler for `sig`, returning the prior OS action
///
/// The prior action must be kept for the matching uninstall.
pub(crate) fn install_os_handler(sig: Signal) -> SignalResult<SigAction> {
    let os_sig = nix::sys::signal::Signal::try_from(sig)?;
    let action = SigAction::new(
        SigHandler::Handler(capture_handler),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: capture_handler restricts itself to async-signal-safe
    // operations and never touches locks or the allocator.
    unsafe { sigaction(os_sig, &action) }.map_err(|_| SignalError::InvalidSignal(sig.number()))
}

/// Reinstate an OS action saved by `install_os_handler`
pub(crate) fn restore_os_action(sig: Signal, action: &SigAction) -> SignalResult<()> {
    let os_sig = nix::sys::signal::Signal::try_from(sig)?;
    // SAFETY: reinstates an action captured from a prior sigaction call.
    unsafe { sigaction(os_sig, action) }
        .map(|_| ())
        .map_err(|_| SignalError::InvalidSignal(sig.number()))
}
