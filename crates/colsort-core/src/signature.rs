//! Signature builder: a deterministic fingerprint of everything that changes
//! the generated kernel, hashed into the cache key.

use std::fmt::Write as _;

use crate::hash::{hash_str, Hash256};
use crate::spec::SortSpec;

/// Canonical description of a kernel plus its blake3 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    canonical: String,
    hash: Hash256,
}

impl Signature {
    /// Build the signature for `spec` with output batches of `batch_size` rows.
    ///
    /// Key fields are rendered with their position, so reordering keys changes
    /// the signature. Every output field contributes its name and canonical
    /// type because each one gets its own cache and builder in the kernel.
    /// Nullability and field metadata are left out: they never change the
    /// generated kernel.
    pub fn of(spec: &SortSpec, batch_size: usize) -> Self {
        let mut s = String::with_capacity(128);
        let _ = write!(
            s,
            "[Sorter]{}|{}[batch_size]{}",
            spec.null_order().label(),
            spec.direction().label(),
            batch_size
        );
        for (i, &idx) in spec.key_indices().iter().enumerate() {
            let _ = write!(
                s,
                "[sort_key_{i}]{}: {}",
                spec.schema().field(idx).name(),
                spec.column_types()[idx]
            );
        }
        s.push_str("[schema]");
        for (i, (field, ty)) in spec
            .schema()
            .fields()
            .iter()
            .zip(spec.column_types())
            .enumerate()
        {
            if i > 0 {
                s.push_str(", ");
            }
            let _ = write!(s, "{}: {}", field.name(), ty);
        }

        let hash = hash_str(&s);
        tracing::debug!(signature = %hash, canonical = %s, "computed kernel signature");
        Self { canonical: s, hash }
    }

    /// Hex cache key used to name artifacts.
    pub fn key(&self) -> String {
        self.hash.to_hex()
    }

    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}
