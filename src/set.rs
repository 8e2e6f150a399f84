/*!
 * Signal Sets
 * Fixed-size bitfield over the signal number range
 */

use crate::types::{Signal, SignalError, SignalResult, NSIG};
use serde::{Deserialize, Serialize};
use std::fmt;

// Bits representable as valid signals; everything else stays zero
const VALID_BITS: u64 = ((1u64 << NSIG) - 1) & !1;

/// An immutable-value set of signals
///
/// Bit `n` of the backing word corresponds to signal number `n`. All
/// operations are pure, allocation-free, and lock-free, so they are safe to
/// call from any execution context including signal context. Equal sets are
/// interchangeable values; the type is `Copy`, so iteration is restartable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SignalSet(u64);

impl SignalSet {
    /// Create an empty set
    pub const fn empty() -> Self {
        SignalSet(0)
    }

    /// Create a set from a slice of signals
    pub fn of(signals: &[Signal]) -> Self {
        signals.iter().copied().collect()
    }

    /// Add a signal to the set
    #[inline]
    pub fn add(&mut self, sig: Signal) {
        self.0 |= 1 << sig.number();
    }

    /// Remove a signal from the set
    #[inline]
    pub fn remove(&mut self, sig: Signal) {
        self.0 &= !(1 << sig.number());
    }

    /// Membership test
    #[inline]
    pub fn contains(&self, sig: Signal) -> bool {
        self.0 & (1 << sig.number()) != 0
    }

    /// Set of signals present in either operand
    pub fn union(&self, other: &SignalSet) -> SignalSet {
        SignalSet(self.0 | other.0)
    }

    /// Set of signals present in `self` but not in `other`
    pub fn difference(&self, other: &SignalSet) -> SignalSet {
        SignalSet(self.0 & !other.0)
    }

    /// Number of member signals
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Check if the set has no members
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate members in ascending signal-number order
    pub fn iter(&self) -> SignalSetIter {
        SignalSetIter { bits: self.0 }
    }

    #[inline]
    pub(crate) fn bits(&self) -> u64 {
        self.0
    }

    /// Convert to the OS representation for mask syscalls
    pub(crate) fn to_os(&self) -> SignalResult<nix::sys::signal::SigSet> {
        let mut os = nix::sys::signal::SigSet::empty();
        for sig in self.iter() {
            let os_sig = nix::sys::signal::Signal::try_from(sig.number())
                .map_err(|_| SignalError::InvalidSignal(sig.number()))?;
            os.add(os_sig);
        }
        Ok(os)
    }

    /// Convert from the OS representation
    pub(crate) fn from_os(set: &nix::sys::signal::SigSet) -> SignalSet {
        let mut out = SignalSet::empty();
        for n in 1..NSIG {
            if let Ok(os_sig) = nix::sys::signal::Signal::try_from(n) {
                if set.contains(os_sig) {
                    if let Ok(sig) = Signal::from_number(n) {
                        out.add(sig);
                    }
                }
            }
        }
        out
    }
}

// Deserialization masks to the valid range so iteration never meets a bit
// that is not a signal
impl<'de> Deserialize<'de> for SignalSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(SignalSet(bits & VALID_BITS))
    }
}

impl FromIterator<Signal> for SignalSet {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut set = SignalSet::empty();
        for sig in iter {
            set.add(sig);
        }
        set
    }
}

impl IntoIterator for SignalSet {
    type Item = Signal;
    type IntoIter = SignalSetIter;

    fn into_iter(self) -> SignalSetIter {
        self.iter()
    }
}

impl IntoIterator for &SignalSet {
    type Item = Signal;
    type IntoIter = SignalSetIter;

    fn into_iter(self) -> SignalSetIter {
        self.iter()
    }
}

/// Iterator over the members of a `SignalSet`
pub struct SignalSetIter {
    bits: u64,
}

impl Iterator for SignalSetIter {
    type Item = Signal;

    fn next(&mut self) -> Option<Signal> {
        if self.bits == 0 {
            return None;
        }
        let n = self.bits.trailing_zeros() as i32;
        self.bits &= self.bits - 1;
        Signal::from_number(n).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bits.count_ones() as usize;
        (n, Some(n))
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<empty signal set>");
        }
        let mut first = true;
        for sig in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", sig)?;
            first = false;
        }
        Ok(())
    }
}
