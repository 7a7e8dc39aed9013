//! Per-kernel execution context.

use colsort_core::config::SortConfig;
use colsort_mem::{Reservation, SortBudget};

use crate::error::Result;

/// Memory budget shared by every kernel built from this context. Clones
/// share the same budget.
#[derive(Debug, Clone)]
pub struct ExecContext {
    budget: SortBudget,
}

impl ExecContext {
    pub fn new(mem_cap_bytes: usize) -> Self {
        Self {
            budget: SortBudget::new(mem_cap_bytes),
        }
    }

    pub fn from_config(config: &SortConfig) -> Self {
        Self::new(config.mem_cap_bytes)
    }

    /// Reserve `bytes` for a sorted buffer; held as long as the reservation.
    pub fn reserve(&self, bytes: usize, tag: &'static str) -> Result<Reservation> {
        Ok(self.budget.reserve(bytes, tag)?)
    }

    pub fn budget(&self) -> &SortBudget {
        &self.budget
    }

    pub fn used_bytes(&self) -> usize {
        self.budget.used_bytes()
    }

    pub fn peak_bytes(&self) -> usize {
        self.budget.peak_bytes()
    }

    /// Sorted buffers still alive, across all kernels of this context.
    pub fn live_buffers(&self) -> usize {
        self.budget.live_reservations()
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::from_config(&SortConfig::default())
    }
}
