/*!
 * Bridge Traits
 * Seams for consumers that take signal sources generically
 */

use crate::channel::{Recv, SignalChannel};
use crate::inspect::PendingInspector;
use crate::set::SignalSet;
use crate::types::{SignalEvent, SignalResult};
use std::time::Duration;

/// Blocking/pollable source of signal events
pub trait SignalSource: Send + Sync {
    /// Block until an event, a timeout, or close
    fn receive(&self, timeout: Option<Duration>) -> SignalResult<Recv>;

    /// Non-blocking drain
    fn try_receive(&self) -> SignalResult<Option<SignalEvent>>;

    /// Close the source, waking blocked receivers
    fn close(&self);

    fn is_closed(&self) -> bool;
}

impl SignalSource for SignalChannel {
    fn receive(&self, timeout: Option<Duration>) -> SignalResult<Recv> {
        SignalChannel::receive(self, timeout)
    }

    fn try_receive(&self) -> SignalResult<Option<SignalEvent>> {
        SignalChannel::try_receive(self)
    }

    fn close(&self) {
        SignalChannel::close(self)
    }

    fn is_closed(&self) -> bool {
        SignalChannel::is_closed(self)
    }
}

/// Read-only view of kernel signal state
pub trait SignalStateView: Send + Sync {
    /// Signals pending delivery because they are masked
    fn pending_signals(&self) -> SignalResult<SignalSet>;

    /// Signals blocked on the calling thread
    fn blocked_signals(&self) -> SignalResult<SignalSet>;
}

impl SignalStateView for PendingInspector {
    fn pending_signals(&self) -> SignalResult<SignalSet> {
        PendingInspector::pending_signals(self)
    }

    fn blocked_signals(&self) -> SignalResult<SignalSet> {
        PendingInspector::blocked_signals(self)
    }
}
