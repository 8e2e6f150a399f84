/*!
 * Signal Channel
 * Normal-context consumer side of the bridge
 */

use crate::set::SignalSet;
use crate::stats::{AtomicChannelStats, ChannelStats};
use crate::types::{CaptureMode, Signal, SignalError, SignalEvent, SignalResult, NSIG};
use crossbeam_queue::ArrayQueue;
use log::debug;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CELL_COUNT: usize = NSIG as usize;

/// Per-signal capture cells, written in signal context
struct SignalCell {
    /// Occurrences since the last drain (counting mode)
    count: AtomicU64,
    /// Occurrences coalesced while the queue was full (ordered mode)
    overflow: AtomicU64,
}

/// State shared by the capture handler and every channel clone
///
/// The capture side touches only the cells, the queue, and the write end of
/// the self-pipe; all of it is lock-free. The consumer side drains in
/// normal context.
pub(crate) struct ChannelShared {
    set: SignalSet,
    queue: Option<ArrayQueue<u64>>,
    seq: AtomicU64,
    cells: [SignalCell; CELL_COUNT],
    cursor: AtomicUsize,
    /// Bitmask of signals still installed for this channel
    live: AtomicU64,
    closed: AtomicBool,
    wake_rx: OwnedFd,
    wake_tx: OwnedFd,
    stats: AtomicChannelStats,
}

impl ChannelShared {
    pub(crate) fn new(set: SignalSet, mode: CaptureMode) -> SignalResult<Self> {
        let (wake_rx, wake_tx) = unistd::pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)
            .map_err(|e| SignalError::InstallFailed(format!("self-pipe: {}", e)))?;
        let queue = match mode {
            CaptureMode::Counting => None,
            CaptureMode::Ordered { capacity } => Some(ArrayQueue::new(capacity.max(1))),
        };
        Ok(Self {
            set,
            queue,
            seq: AtomicU64::new(0),
            cells: std::array::from_fn(|_| SignalCell {
                count: AtomicU64::new(0),
                overflow: AtomicU64::new(0),
            }),
            cursor: AtomicUsize::new(1),
            live: AtomicU64::new(set.bits()),
            closed: AtomicBool::new(false),
            wake_rx,
            wake_tx,
            stats: AtomicChannelStats::new(),
        })
    }

    /// Record one occurrence of `signo`
    ///
    /// Signal context: atomics, a lock-free push, and one `write(2)` only.
    /// The wake byte is posted only after the record is published, so a
    /// woken consumer always finds a matching occurrence.
    pub(crate) fn record(&self, signo: libc::c_int) {
        let idx = signo as usize;
        match &self.queue {
            Some(queue) => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                let packed = (seq << 8) | signo as u64;
                if queue.push(packed).is_err() {
                    // full: coalesce by counting, surfaced on the next drain
                    self.cells[idx].overflow.fetch_add(1, Ordering::Release);
                    self.stats.inc_overflowed();
                } else {
                    self.stats.inc_captured();
                }
            }
            None => {
                self.cells[idx].count.fetch_add(1, Ordering::Release);
                self.stats.inc_captured();
            }
        }
        self.post_wake();
    }

    /// One byte on the self-pipe; EAGAIN means wakes are already queued
    fn post_wake(&self) {
        let buf = [1u8];
        // SAFETY: write(2) is async-signal-safe and the fd lives as long as
        // this shared state.
        let _ = unsafe {
            libc::write(
                self.wake_tx.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                1,
            )
        };
    }

    /// Drain one occurrence, if any
    fn try_drain(&self) -> Option<SignalEvent> {
        match &self.queue {
            Some(queue) => {
                let packed = queue.pop()?;
                let signo = (packed & 0xff) as i32;
                let signal = Signal::from_number(signo).ok()?;
                let overflowed = self.cells[signo as usize].overflow.swap(0, Ordering::AcqRel) > 0;
                self.stats.inc_delivered();
                Some(SignalEvent { signal, overflowed })
            }
            None => {
                // rotate the scan start so no signal number starves
                let start = self.cursor.load(Ordering::Relaxed);
                for offset in 0..CELL_COUNT {
                    let idx = (start + offset) % CELL_COUNT;
                    if idx == 0 {
                        continue;
                    }
                    let count = self.cells[idx].count.swap(0, Ordering::AcqRel);
                    if count > 0 {
                        self.cursor.store((idx + 1) % CELL_COUNT, Ordering::Relaxed);
                        if count > 1 {
                            self.stats.add_coalesced(count - 1);
                        }
                        self.stats.inc_delivered();
                        let signal = Signal::from_number(idx as i32).ok()?;
                        return Some(SignalEvent {
                            signal,
                            overflowed: false,
                        });
                    }
                }
                None
            }
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the channel closed and wake every blocked receiver
    ///
    /// The close wake byte is deliberately left unconsumed by receivers so
    /// all of them observe it.
    pub(crate) fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("signal channel for {} closed", self.set);
            self.post_wake();
        }
    }

    /// Drop `sig` from the live set; true when no installed signals remain
    pub(crate) fn release_signal(&self, sig: Signal) -> bool {
        let bit = 1u64 << sig.number();
        let prior = self.live.fetch_and(!bit, Ordering::AcqRel);
        prior & !bit == 0
    }
}

/// Outcome of a blocking receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recv {
    /// An occurrence was drained
    Event(SignalEvent),
    /// The timeout elapsed with nothing to drain
    Timeout,
}

/// Consumer handle for installed signals
///
/// Clones share one occurrence store; every occurrence is drained exactly
/// once across all clones. Receiving blocks only in normal context; the
/// capture side never waits on a consumer.
#[derive(Clone)]
pub struct SignalChannel {
    shared: Arc<ChannelShared>,
}

impl SignalChannel {
    pub(crate) fn new(shared: Arc<ChannelShared>) -> Self {
        Self { shared }
    }

    /// Signals this channel was installed for
    pub fn signals(&self) -> SignalSet {
        self.shared.set
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Get activity counters for this channel
    pub fn stats(&self) -> ChannelStats {
        self.shared.stats.snapshot()
    }

    /// Block until an occurrence is available, the timeout elapses, or the
    /// channel is closed
    ///
    /// `None` blocks indefinitely; `Some(Duration::ZERO)` polls once.
    /// Already-captured occurrences drain before a closed channel reports
    /// `ChannelClosed`.
    pub fn receive(&self, timeout: Option<Duration>) -> SignalResult<Recv> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(event) = self.shared.try_drain() {
                return Ok(Recv::Event(event));
            }
            if self.shared.is_closed() {
                // a capture may have landed between the drain and the check
                return match self.shared.try_drain() {
                    Some(event) => Ok(Recv::Event(event)),
                    None => Err(SignalError::ChannelClosed),
                };
            }
            if !self.wait_readable(deadline)? {
                // timed out; a capture racing the timeout still wins
                return match self.shared.try_drain() {
                    Some(event) => Ok(Recv::Event(event)),
                    None => Ok(Recv::Timeout),
                };
            }
            if self.shared.is_closed() {
                // leave the close byte for the other receivers
                continue;
            }
            self.drain_wake_bytes();
        }
    }

    /// Non-blocking drain
    pub fn try_receive(&self) -> SignalResult<Option<SignalEvent>> {
        if let Some(event) = self.shared.try_drain() {
            return Ok(Some(event));
        }
        if self.shared.is_closed() {
            return Err(SignalError::ChannelClosed);
        }
        Ok(None)
    }

    /// Close the channel and wake all blocked receivers
    pub fn close(&self) {
        self.shared.close();
    }

    /// Wait for the wake pipe; Ok(true) readable, Ok(false) timed out
    fn wait_readable(&self, deadline: Option<Instant>) -> SignalResult<bool> {
        let timeout = match deadline {
            None => PollTimeout::NONE,
            Some(d) => {
                let remaining = d.saturating_duration_since(Instant::now());
                let mut millis = remaining.as_millis().min(i32::MAX as u128) as i32;
                if millis == 0 && !remaining.is_zero() {
                    millis = 1;
                }
                PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX)
            }
        };
        let mut fds = [PollFd::new(self.shared.wake_rx.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            // interrupted by a capture on this thread; re-check the store
            Err(Errno::EINTR) => Ok(true),
            Err(e) => Err(SignalError::QueryFailed(format!("poll: {}", e))),
        }
    }

    /// Swallow queued wake bytes; the occurrences themselves live in the
    /// store, so over-draining here only costs a spurious re-poll
    fn drain_wake_bytes(&self) {
        let mut buf = [0u8; 64];
        loop {
            match unistd::read(self.shared.wake_rx.as_raw_fd(), &mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(_) => break,
            }
        }
    }
}

impl std::fmt::Debug for SignalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalChannel")
            .field("signals", &self.shared.set)
            .field("closed", &self.shared.is_closed())
            .finish()
    }
}
