//! Key hashing and key equivalence.
//!
//! The table never calls `core::hash::Hash`; it asks a `KeyHasher` for a
//! 32-bit value and reduces it modulo the bucket count. The default is a
//! PJW/ELF-style string hash that gives the same result on every
//! platform.

const BITS_IN_U32: u32 = u32::BITS;
const THREE_QUARTERS: u32 = (BITS_IN_U32 * 3) / 4;
const ONE_EIGHTH: u32 = BITS_IN_U32 / 8;
const HIGH_BITS: u32 = !(u32::MAX >> ONE_EIGHTH);

/// PJW hash over a byte string.
///
/// Hashing stops at the first NUL byte, so `b"ab\0cd"` and `b"ab"` hash
/// alike. The empty string hashes to 0.
pub fn pjw_hash(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &b in bytes.iter().take_while(|&&b| b != 0) {
        hash = (hash << ONE_EIGHTH).wrapping_add(u32::from(b));
        let high = hash & HIGH_BITS;
        if high != 0 {
            hash = (hash ^ (high >> THREE_QUARTERS)) & !HIGH_BITS;
        }
    }
    hash
}

/// Maps a key to an unsigned hash. Must be deterministic for the life of
/// a table.
pub trait KeyHasher<Q: ?Sized> {
    fn hash_key(&self, key: &Q) -> u32;
}

/// Default hasher: `pjw_hash` over the key's bytes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Pjw;

impl<Q> KeyHasher<Q> for Pjw
where
    Q: ?Sized + AsRef<[u8]>,
{
    #[inline]
    fn hash_key(&self, key: &Q) -> u32 {
        pjw_hash(key.as_ref())
    }
}

impl<Q, F> KeyHasher<Q> for F
where
    Q: ?Sized,
    F: Fn(&Q) -> u32,
{
    #[inline]
    fn hash_key(&self, key: &Q) -> u32 {
        self(key)
    }
}

/// Key equality predicate used to resolve collisions inside a chain.
pub trait KeyEquivalence<Q: ?Sized> {
    fn equivalent(&self, stored: &Q, lookup: &Q) -> bool;
}

/// Default equivalence: `Eq`. For string keys this is byte equality.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DefaultEq;

impl<Q> KeyEquivalence<Q> for DefaultEq
where
    Q: ?Sized + Eq,
{
    #[inline]
    fn equivalent(&self, stored: &Q, lookup: &Q) -> bool {
        stored == lookup
    }
}

impl<Q, F> KeyEquivalence<Q> for F
where
    Q: ?Sized,
    F: Fn(&Q, &Q) -> bool,
{
    #[inline]
    fn equivalent(&self, stored: &Q, lookup: &Q) -> bool {
        self(stored, lookup)
    }
}
