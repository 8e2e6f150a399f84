/*!
 * Signal Bridge Library
 * Converts asynchronous signal delivery into consumable events
 *
 * The capture side runs in signal context and restricts itself to
 * async-signal-safe operations: atomics, a lock-free queue, and a one-byte
 * self-pipe wake. The consumer side drains in normal context through
 * `SignalChannel`. Mask save/restore is scoped through `MaskController`,
 * and all disposition mutation funnels through `install`/`uninstall`.
 */

#![cfg(unix)]

mod bridge;
mod capture;
mod channel;
mod inspect;
mod mask;
mod set;
mod stats;
pub mod traits;
mod types;

// Re-export public API
pub use bridge::{install, installed_signals, uninstall, InstallOptions};
pub use channel::{Recv, SignalChannel};
pub use inspect::PendingInspector;
pub use mask::{MaskController, MaskGuard, MaskSnapshot};
pub use set::{SignalSet, SignalSetIter};
pub use stats::ChannelStats;
pub use traits::{SignalSource, SignalStateView};
pub use types::{
    CaptureMode, Signal, SignalDisposition, SignalError, SignalEvent, SignalResult, NSIG,
};
