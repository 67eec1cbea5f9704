//! Allocation-failure injection
//!
//! Every allocation made by the tree API is charged against a byte budget.
//! Once a charge would exceed the budget it is refused, the operation sees
//! [`DomError::OutOfMemory`], and the injector remembers that a failure
//! happened until the caller resets it.

use crate::{DomError, DomResult};

/// Approximate cost of one node slot
pub const NODE_COST: usize = 96;
/// Approximate cost of one namespace slot
pub const NS_COST: usize = 48;
/// Approximate cost of one table entry
pub const ENTRY_COST: usize = 32;

/// Allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Charges granted
    pub granted: u64,
    /// Charges refused
    pub refused: u64,
    /// Bytes granted so far
    pub bytes: usize,
}

/// Budgeted allocator front-end
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Budget in bytes (0 = unlimited)
    limit: usize,
    failed: bool,
    forced: bool,
    stats: AllocStats,
}

impl FailureInjector {
    /// Create an unlimited injector
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the budget (0 = unlimited); usage restarts from zero
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.stats.bytes = 0;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Charge an allocation of `size` bytes
    pub fn charge(&mut self, size: usize) -> DomResult<()> {
        if self.limit > 0 && size > self.limit.saturating_sub(self.stats.bytes) {
            self.failed = true;
            self.stats.refused += 1;
            tracing::trace!("allocation of {} bytes refused ({} of {} used)", size, self.stats.bytes, self.limit);
            return Err(DomError::OutOfMemory);
        }
        self.stats.granted += 1;
        self.stats.bytes += size;
        Ok(())
    }

    /// Charge a string copy
    #[inline]
    pub fn charge_str(&mut self, s: &str) -> DomResult<()> {
        self.charge(s.len() + 1)
    }

    /// Whether a charge was refused since the last reset
    pub fn failed(&self) -> bool {
        self.failed || self.forced
    }

    /// Clear the failure flag
    pub fn reset_failed(&mut self) {
        self.failed = false;
    }

    /// Make [`failed`](Self::failed) report true regardless of charges
    pub fn force_failure(&mut self, forced: bool) {
        self.forced = forced;
    }

    pub fn stats(&self) -> AllocStats {
        self.stats
    }
}
