//! `ArrayItemIndex`: the address of one row inside the buffered batch set.

use serde::{Deserialize, Serialize};

/// `{batch_id, row_id}` pair reordered by the index-based sort engine
/// instead of the row data itself.
///
/// Ordering on this type is arrival order (batch, then row), which is the
/// tie-break every engine must preserve for equal keys.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(C)]
pub struct ArrayItemIndex {
    pub batch_id: u32,
    pub row_id: u32,
}

impl ArrayItemIndex {
    /// Encoded width in bytes (two little-endian `u32`s).
    pub const WIDTH: usize = 8;

    pub const fn new(batch_id: u32, row_id: u32) -> Self {
        Self { batch_id, row_id }
    }

    #[inline]
    pub fn batch(self) -> usize {
        self.batch_id as usize
    }

    #[inline]
    pub fn row(self) -> usize {
        self.row_id as usize
    }

    pub fn to_le_bytes(self) -> [u8; Self::WIDTH] {
        let mut out = [0u8; Self::WIDTH];
        out[..4].copy_from_slice(&self.batch_id.to_le_bytes());
        out[4..].copy_from_slice(&self.row_id.to_le_bytes());
        out
    }

    pub fn from_le_bytes(bytes: [u8; Self::WIDTH]) -> Self {
        let batch_id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let row_id = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self { batch_id, row_id }
    }
}

impl std::fmt::Display for ArrayItemIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.batch_id, self.row_id)
    }
}
