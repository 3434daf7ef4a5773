//! Debug-only structural checks.
//!
//! In debug builds these walk chains and panic on a broken invariant:
//! a key stored in the wrong bucket, two equivalent keys in one chain,
//! or a live count that disagrees with the chains. In release builds
//! they compile to nothing.

use crate::chain::Chain;
use crate::hash::{KeyEquivalence, KeyHasher};

#[inline]
pub(crate) fn bucket_index(hash: u32, bucket_count: usize) -> usize {
    (hash as usize) % bucket_count
}

/// Assert that every key in `chain` maps to `bucket` and that no two keys
/// in it are equivalent.
#[inline]
#[allow(unused_variables)]
pub(crate) fn check_chain<K, V, H, E>(
    chain: &Chain<K, V>,
    bucket: usize,
    bucket_count: usize,
    hasher: &H,
    key_eq: &E,
) where
    H: KeyHasher<K>,
    E: KeyEquivalence<K>,
{
    #[cfg(debug_assertions)]
    {
        let keys: Vec<&K> = chain.iter().map(|e| e.key()).collect();
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(
                bucket_index(hasher.hash_key(k), bucket_count),
                bucket,
                "entry stored in bucket {bucket} hashes elsewhere"
            );
            assert!(
                !keys[i + 1..].iter().any(|other| key_eq.equivalent(other, k)),
                "duplicate key in chain of bucket {bucket}"
            );
        }
    }
}

/// Assert that `len` equals the total number of chained entries.
#[inline]
#[allow(unused_variables)]
pub(crate) fn check_count<K, V>(buckets: &[Chain<K, V>], len: usize) {
    #[cfg(debug_assertions)]
    {
        let walked: usize = buckets.iter().map(Chain::len).sum();
        assert_eq!(walked, len, "live count disagrees with chain walk");
    }
}
