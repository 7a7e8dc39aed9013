//! LSD radix sort over order-preserving unsigned keys.
//!
//! Every fixed-width native type maps to an unsigned integer whose natural
//! order equals the type's sort order:
//! - unsigned ints: identity
//! - signed ints: flip the sign bit
//! - floats: flip all bits of negatives, the sign bit of positives; every NaN
//!   is first canonicalized to the positive quiet NaN, so NaN sorts greatest
//! - bool: `false < true`
//!
//! The comparison path uses the same mapping, so radix and comparison sorts
//! agree on every input.

use std::cmp::Ordering;

/// Unsigned key consumed one byte per pass, least significant first.
pub trait RadixKey: Copy + Ord {
    const BYTES: usize;

    fn radix_byte(self, pass: usize) -> u8;
}

macro_rules! radix_key {
    ($($t:ty),*) => {$(
        impl RadixKey for $t {
            const BYTES: usize = std::mem::size_of::<$t>();

            #[inline]
            fn radix_byte(self, pass: usize) -> u8 {
                (self >> (pass * 8)) as u8
            }
        }
    )*};
}

radix_key!(u8, u16, u32, u64, u128);

/// A native scalar a kernel can sort by value.
pub trait SortNative: Copy + Send + Sync + 'static {
    type Ordered: RadixKey;

    fn ordered(self) -> Self::Ordered;

    /// Total order consistent with [`SortNative::ordered`].
    #[inline]
    fn total_cmp(&self, other: &Self) -> Ordering {
        self.ordered().cmp(&other.ordered())
    }
}

macro_rules! sort_native_unsigned {
    ($($t:ty),*) => {$(
        impl SortNative for $t {
            type Ordered = $t;

            #[inline]
            fn ordered(self) -> $t {
                self
            }
        }
    )*};
}

macro_rules! sort_native_signed {
    ($($t:ty => $u:ty),*) => {$(
        impl SortNative for $t {
            type Ordered = $u;

            #[inline]
            fn ordered(self) -> $u {
                (self as $u) ^ (1 << (<$u>::BITS - 1))
            }
        }
    )*};
}

macro_rules! sort_native_float {
    ($($t:ty => $u:ty),*) => {$(
        impl SortNative for $t {
            type Ordered = $u;

            #[inline]
            fn ordered(self) -> $u {
                let bits = if self.is_nan() { <$t>::NAN.to_bits() } else { self.to_bits() };
                let sign = 1 << (<$u>::BITS - 1);
                if bits & sign != 0 {
                    !bits
                } else {
                    bits | sign
                }
            }
        }
    )*};
}

sort_native_unsigned!(u8, u16, u32, u64);
sort_native_signed!(i8 => u8, i16 => u16, i32 => u32, i64 => u64, i128 => u128);
sort_native_float!(f32 => u32, f64 => u64);

impl SortNative for bool {
    type Ordered = u8;

    #[inline]
    fn ordered(self) -> u8 {
        self as u8
    }
}

/// Stable LSD radix sort of `items` by `key`.
///
/// Passes where every key shares the same byte are skipped, so narrow value
/// ranges in wide types cost only the passes they need.
pub fn radix_sort_by_key<T, K, F>(items: &mut [T], key: F)
where
    T: Copy,
    K: RadixKey,
    F: Fn(&T) -> K,
{
    if items.len() < 2 {
        return;
    }
    let mut src: Vec<(K, T)> = items.iter().map(|t| (key(t), *t)).collect();
    let mut dst = src.clone();

    for pass in 0..K::BYTES {
        let mut counts = [0usize; 256];
        for (k, _) in &src {
            counts[k.radix_byte(pass) as usize] += 1;
        }
        if counts.iter().any(|&c| c == src.len()) {
            continue;
        }

        let mut offsets = [0usize; 256];
        let mut sum = 0;
        for (slot, count) in offsets.iter_mut().zip(counts) {
            *slot = sum;
            sum += count;
        }
        for entry in &src {
            let b = entry.0.radix_byte(pass) as usize;
            dst[offsets[b]] = *entry;
            offsets[b] += 1;
        }
        std::mem::swap(&mut src, &mut dst);
    }

    for (slot, (_, t)) in items.iter_mut().zip(src) {
        *slot = t;
    }
}

/// Radix sort plain values ascending.
pub fn radix_sort<T: SortNative>(values: &mut [T]) {
    radix_sort_by_key(values, |v| v.ordered());
}
