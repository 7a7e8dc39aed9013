//! Byte budget shared by the sort kernels of one execution context.
//!
//! A kernel reserves the bytes of its index or value buffer when it
//! finalizes and keeps the [`Reservation`] next to the buffer, so the bytes
//! come back when the last reader of the sorted state goes away. The budget
//! also remembers its high-water mark.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

struct Ledger {
    capacity: usize,
    used: AtomicUsize,
    peak: AtomicUsize,
    live: AtomicUsize,
}

impl Ledger {
    /// Add `bytes` unless that would cross the capacity.
    fn take(&self, bytes: usize) -> std::result::Result<usize, usize> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                cur.checked_add(bytes).filter(|next| *next <= self.capacity)
            })
            .map(|prev| prev + bytes)
    }
}

/// Hard cap on sort buffer bytes. Clones share one ledger.
#[derive(Clone)]
pub struct SortBudget {
    ledger: Arc<Ledger>,
}

impl SortBudget {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            ledger: Arc::new(Ledger {
                capacity: capacity_bytes,
                used: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
            }),
        }
    }

    /// Reserve `bytes` for the buffer named by `tag`.
    ///
    /// Zero-byte reservations always succeed, so sorting empty input never
    /// fails on an exhausted budget.
    pub fn reserve(&self, bytes: usize, tag: &'static str) -> Result<Reservation> {
        let used = match self.ledger.take(bytes) {
            Ok(used) => used,
            Err(used) => {
                return Err(Error::BudgetExceeded {
                    tag,
                    requested: bytes,
                    capacity: self.ledger.capacity,
                    used,
                })
            }
        };
        let peak = self.ledger.peak.fetch_max(used, Ordering::AcqRel).max(used);
        self.ledger.live.fetch_add(1, Ordering::AcqRel);

        #[cfg(feature = "tracing")]
        tracing::trace!(tag, bytes, used, peak, "reserved sort buffer");
        #[cfg(not(feature = "tracing"))]
        let _ = peak;

        Ok(Reservation {
            ledger: Arc::clone(&self.ledger),
            bytes,
            tag,
        })
    }

    pub fn capacity_bytes(&self) -> usize {
        self.ledger.capacity
    }

    pub fn used_bytes(&self) -> usize {
        self.ledger.used.load(Ordering::Acquire)
    }

    /// Highest `used_bytes` ever observed after a reservation.
    pub fn peak_bytes(&self) -> usize {
        self.ledger.peak.load(Ordering::Acquire)
    }

    /// Reservations not yet dropped.
    pub fn live_reservations(&self) -> usize {
        self.ledger.live.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SortBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortBudget")
            .field("capacity", &self.ledger.capacity)
            .field("used", &self.used_bytes())
            .field("peak", &self.peak_bytes())
            .finish()
    }
}

/// Bytes held for one sorted buffer; returned to the budget on drop.
pub struct Reservation {
    ledger: Arc<Ledger>,
    bytes: usize,
    tag: &'static str,
}

impl Reservation {
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.ledger.used.fetch_sub(self.bytes, Ordering::AcqRel);
        self.ledger.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("bytes", &self.bytes)
            .field("tag", &self.tag)
            .finish()
    }
}
