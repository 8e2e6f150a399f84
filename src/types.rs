/*!
 * Signal Types
 * Signal numbers, events, and result types for the bridge
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Signal operation result
pub type SignalResult<T> = Result<T, SignalError>;

/// Signal errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalError {
    #[error("Invalid signal: {0}")]
    InvalidSignal(i32),

    #[error("Mask operation failed: {0}")]
    MaskOperationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Signal already installed: {0}")]
    AlreadyInstalled(Signal),

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Upper bound of the classic signal number range `[1, NSIG)`.
/// Real-time signals are not covered.
pub const NSIG: i32 = 32;

/// A validated OS signal number in `[1, NSIG)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Signal(i32);

impl Signal {
    /// Hangup detected on controlling terminal or death of controlling process
    pub const SIGHUP: Signal = Signal(1);
    /// Interrupt from keyboard (Ctrl+C)
    pub const SIGINT: Signal = Signal(2);
    /// Quit from keyboard (Ctrl+\)
    pub const SIGQUIT: Signal = Signal(3);
    /// Illegal instruction
    pub const SIGILL: Signal = Signal(4);
    /// Trace/breakpoint trap
    pub const SIGTRAP: Signal = Signal(5);
    /// Abort signal
    pub const SIGABRT: Signal = Signal(6);
    /// Bus error (bad memory access)
    pub const SIGBUS: Signal = Signal(7);
    /// Floating-point exception
    pub const SIGFPE: Signal = Signal(8);
    /// Kill signal (cannot be caught or ignored)
    pub const SIGKILL: Signal = Signal(9);
    /// User-defined signal 1
    pub const SIGUSR1: Signal = Signal(10);
    /// Invalid memory reference
    pub const SIGSEGV: Signal = Signal(11);
    /// User-defined signal 2
    pub const SIGUSR2: Signal = Signal(12);
    /// Broken pipe
    pub const SIGPIPE: Signal = Signal(13);
    /// Timer signal
    pub const SIGALRM: Signal = Signal(14);
    /// Termination signal
    pub const SIGTERM: Signal = Signal(15);
    /// Child process stopped or terminated
    pub const SIGCHLD: Signal = Signal(17);
    /// Continue if stopped
    pub const SIGCONT: Signal = Signal(18);
    /// Stop process (cannot be caught or ignored)
    pub const SIGSTOP: Signal = Signal(19);
    /// Stop typed at terminal (Ctrl+Z)
    pub const SIGTSTP: Signal = Signal(20);
    /// Terminal input for background process
    pub const SIGTTIN: Signal = Signal(21);
    /// Terminal output for background process
    pub const SIGTTOU: Signal = Signal(22);
    /// Urgent condition on socket
    pub const SIGURG: Signal = Signal(23);
    /// CPU time limit exceeded
    pub const SIGXCPU: Signal = Signal(24);
    /// File size limit exceeded
    pub const SIGXFSZ: Signal = Signal(25);
    /// Virtual alarm clock
    pub const SIGVTALRM: Signal = Signal(26);
    /// Profiling timer expired
    pub const SIGPROF: Signal = Signal(27);
    /// Window resize signal
    pub const SIGWINCH: Signal = Signal(28);
    /// I/O now possible
    pub const SIGIO: Signal = Signal(29);
    /// Power failure
    pub const SIGPWR: Signal = Signal(30);
    /// Bad system call
    pub const SIGSYS: Signal = Signal(31);

    /// Convert from signal number
    pub fn from_number(n: i32) -> SignalResult<Self> {
        if (1..NSIG).contains(&n) {
            Ok(Signal(n))
        } else {
            Err(SignalError::InvalidSignal(n))
        }
    }

    /// Get signal number
    #[inline]
    pub fn number(&self) -> i32 {
        self.0
    }

    /// Check if signal can be caught/blocked
    pub fn can_catch(&self) -> bool {
        !matches!(*self, Signal::SIGKILL | Signal::SIGSTOP)
    }

    /// Symbolic name, if the number maps to a classic signal
    pub fn name(&self) -> Option<&'static str> {
        Some(match self.0 {
            1 => "SIGHUP",
            2 => "SIGINT",
            3 => "SIGQUIT",
            4 => "SIGILL",
            5 => "SIGTRAP",
            6 => "SIGABRT",
            7 => "SIGBUS",
            8 => "SIGFPE",
            9 => "SIGKILL",
            10 => "SIGUSR1",
            11 => "SIGSEGV",
            12 => "SIGUSR2",
            13 => "SIGPIPE",
            14 => "SIGALRM",
            15 => "SIGTERM",
            17 => "SIGCHLD",
            18 => "SIGCONT",
            19 => "SIGSTOP",
            20 => "SIGTSTP",
            21 => "SIGTTIN",
            22 => "SIGTTOU",
            23 => "SIGURG",
            24 => "SIGXCPU",
            25 => "SIGXFSZ",
            26 => "SIGVTALRM",
            27 => "SIGPROF",
            28 => "SIGWINCH",
            29 => "SIGIO",
            30 => "SIGPWR",
            31 => "SIGSYS",
            _ => return None,
        })
    }

    /// Get human-readable description (diagnostics only)
    pub fn description(&self) -> &'static str {
        match self.0 {
            1 => "Hangup",
            2 => "Interrupt",
            3 => "Quit",
            4 => "Illegal instruction",
            5 => "Trace/breakpoint trap",
            6 => "Aborted",
            7 => "Bus error",
            8 => "Floating point exception",
            9 => "Killed",
            10 => "User defined signal 1",
            11 => "Segmentation fault",
            12 => "User defined signal 2",
            13 => "Broken pipe",
            14 => "Alarm clock",
            15 => "Terminated",
            17 => "Child status changed",
            18 => "Continued",
            19 => "Stopped (signal)",
            20 => "Stopped",
            21 => "Stopped (tty input)",
            22 => "Stopped (tty output)",
            23 => "Urgent I/O condition",
            24 => "CPU time limit exceeded",
            25 => "File size limit exceeded",
            26 => "Virtual timer expired",
            27 => "Profiling timer expired",
            28 => "Window size changed",
            29 => "I/O possible",
            30 => "Power failure",
            31 => "Bad system call",
            _ => "Unknown signal",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", name, self.0),
            None => write!(f, "SIG{}", self.0),
        }
    }
}

// Deserialization re-validates the range; a raw derive would accept any i32
impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let n = i32::deserialize(deserializer)?;
        Signal::from_number(n).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<Signal> for nix::sys::signal::Signal {
    type Error = SignalError;

    fn try_from(sig: Signal) -> SignalResult<Self> {
        nix::sys::signal::Signal::try_from(sig.number())
            .map_err(|_| SignalError::InvalidSignal(sig.number()))
    }
}

/// A drained signal occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub signal: Signal,
    /// True if occurrences of this signal were coalesced since the last
    /// drain because the capture queue was full
    pub overflowed: bool,
}

/// What the OS currently does when a signal is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDisposition {
    /// Default action for the signal
    Default,
    /// Ignore the signal
    Ignore,
    /// Call a custom handler
    Handler,
}

/// How occurrences are recorded in signal context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// One atomic counter per signal; repeats since the last drain collapse
    /// into a single event
    Counting,
    /// Fixed-capacity FIFO preserving arrival order across signals; a full
    /// queue coalesces by counting per signal
    Ordered { capacity: usize },
}
