//! Convenient re-exports for downstream crates.

pub use crate::config::SortConfig;
pub use crate::describe::{ColumnType, Container, TypeDescriptor};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::index::ArrayItemIndex;
pub use crate::signature::Signature;
pub use crate::spec::{Direction, NullOrder, SortSpec};
