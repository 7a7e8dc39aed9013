#![forbid(unsafe_code)]
//! colsort-mem: hard memory budgeting for sort kernels.
//!
//! Sort engines reserve the bytes of their index or value buffer before
//! allocating it and hold the [`Reservation`] for as long as the buffer lives.

pub mod budget;
pub mod error;

pub use budget::{Reservation, SortBudget};
pub use error::{Error, Result};
