//! ChainedTable: fixed bucket array with separate chaining.

use crate::chain::{Chain, Entry};
use crate::config::TableConfig;
use crate::error::TableError;
use crate::hash::{DefaultEq, KeyEquivalence, KeyHasher, Pjw};
use crate::invariants::{bucket_index, check_chain, check_count};
use crate::release::Release;
use core::borrow::Borrow;
use core::fmt::Display;
use core::iter::Rev;
use core::slice;
use log::{debug, trace};
use std::io;

/// Hash table with a fixed number of buckets, each holding a chain of
/// entries. The newest entry of a bucket is the head of its chain.
///
/// The table does no locking of its own. Structural changes take
/// `&mut self`; concurrent readers share `&self` and may coordinate with
/// a host through `apply_until` and a `BucketLocks` implementation. For
/// inserts and deletes that run alongside scans, see `SharedTable`.
pub struct ChainedTable<K, V, H = Pjw, E = DefaultEq> {
    buckets: Vec<Chain<K, V>>,
    len: usize,
    hasher: H,
    key_eq: E,
}

impl<K, V> ChainedTable<K, V> {
    /// Create a table with `bucket_count` buckets and the default hasher
    /// and key equality.
    pub fn new(bucket_count: usize) -> Result<Self, TableError> {
        TableConfig::new(bucket_count).build()
    }
}

/// Iterator over entries in bucket order, then chain order.
pub struct Iter<'a, K, V> {
    buckets: slice::Iter<'a, Chain<K, V>>,
    chain: Option<Rev<slice::Iter<'a, Entry<K, V>>>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a Entry<K, V>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.chain.as_mut().and_then(Iterator::next) {
                return Some(e);
            }
            self.chain = Some(self.buckets.next()?.iter());
        }
    }
}

impl<K, V, H, E> ChainedTable<K, V, H, E> {
    pub fn with_config(config: TableConfig<H, E>) -> Result<Self, TableError> {
        let TableConfig {
            bucket_count,
            hasher,
            key_eq,
        } = config;
        if bucket_count == 0 {
            return Err(TableError::ZeroBuckets);
        }
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(bucket_count)
            .map_err(|_| TableError::OutOfMemory {
                buckets: bucket_count,
            })?;
        buckets.resize_with(bucket_count, Chain::new);
        debug!("created chained table with {bucket_count} buckets");
        Ok(Self {
            buckets,
            len: 0,
            hasher,
            key_eq,
        })
    }

    /// Reassemble a table from chains already placed by `hasher`.
    pub(crate) fn from_parts(buckets: Vec<Chain<K, V>>, len: usize, hasher: H, key_eq: E) -> Self {
        check_count(&buckets, len);
        Self {
            buckets,
            len,
            hasher,
            key_eq,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets; fixed at creation.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of entries chained in `bucket`. Panics if `bucket` is out of
    /// range.
    pub fn chain_len(&self, bucket: usize) -> usize {
        self.buckets[bucket].len()
    }

    /// Entries of one bucket in chain order. Panics if `bucket` is out of
    /// range.
    pub fn bucket_entries(&self, bucket: usize) -> impl Iterator<Item = &Entry<K, V>> + '_ {
        self.buckets[bucket].iter()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            chain: None,
        }
    }

    /// Keys with mutable values, in bucket then chain order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> + '_ {
        self.buckets
            .iter_mut()
            .flat_map(|chain| chain.iter_mut())
            .map(Entry::parts_mut)
    }

    pub(crate) fn chains(&self) -> &[Chain<K, V>] {
        &self.buckets
    }

    /// Bucket that `key` hashes to.
    pub fn bucket_of<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized,
        H: KeyHasher<Q>,
    {
        bucket_index(self.hasher.hash_key(key), self.buckets.len())
    }

    fn locate<Q>(&self, key: &Q) -> (usize, Option<usize>)
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
    {
        let bucket = self.bucket_of(key);
        let pos = self.buckets[bucket].position(|k| self.key_eq.equivalent(k.borrow(), key));
        (bucket, pos)
    }

    /// Look up the entry for `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
    {
        match self.locate(key) {
            (bucket, Some(pos)) => Some(self.buckets[bucket].get(pos)),
            (_, None) => None,
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
    {
        self.find(key).map(Entry::value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
    {
        match self.locate(key) {
            (bucket, Some(pos)) => Some(self.buckets[bucket].get_mut(pos).value_mut()),
            (_, None) => None,
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
    {
        self.locate(key).1.is_some()
    }

    /// Insert `key -> value`, replacing any entry with an equivalent key.
    ///
    /// The new entry becomes the head of its chain. A replaced entry is
    /// unlinked and handed back; the table keeps no reference to it.
    ///
    /// On `ChainOutOfMemory` nothing was changed: the chain slot is
    /// reserved before any entry is unlinked.
    pub fn update_insert(&mut self, key: K, value: V) -> Result<Option<Entry<K, V>>, TableError>
    where
        H: KeyHasher<K>,
        E: KeyEquivalence<K>,
    {
        let bucket = self.bucket_of(&key);
        let key_eq = &self.key_eq;
        let chain = &mut self.buckets[bucket];
        let replaced = match chain.position(|k| key_eq.equivalent(k, &key)) {
            Some(pos) => {
                trace!("replacing entry in bucket {bucket}");
                Some(chain.replace(pos, Entry::new(key, value)))
            }
            None => {
                chain
                    .try_reserve_one()
                    .map_err(|_| TableError::ChainOutOfMemory { bucket })?;
                chain.push_front(Entry::new(key, value));
                self.len += 1;
                None
            }
        };
        check_chain(
            &self.buckets[bucket],
            bucket,
            self.buckets.len(),
            &self.hasher,
            &self.key_eq,
        );
        Ok(replaced)
    }

    /// Unlink the entry for `key` and hand it back.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
    {
        let (bucket, pos) = self.locate(key);
        let entry = self.buckets[bucket].unlink(pos?);
        self.len -= 1;
        trace!("unlinked entry from bucket {bucket}");
        Some(entry)
    }

    /// Remove the entry for `key`, passing its key and value to the given
    /// release capabilities. Returns `false`, leaving the table untouched,
    /// when no entry matches.
    pub fn delete<Q, FK, FV>(&mut self, key: &Q, mut free_key: FK, mut free_value: FV) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
        FK: Release<K>,
        FV: Release<V>,
    {
        match self.remove(key) {
            Some(entry) => {
                let (k, v) = entry.into_parts();
                free_key.release(k);
                free_value.release(v);
                true
            }
            None => false,
        }
    }

    /// Tear the table down, releasing every surviving key and value once,
    /// in bucket then chain order. Returns the number of entries released.
    pub fn destroy<FK, FV>(mut self, mut free_key: FK, mut free_value: FV) -> usize
    where
        FK: Release<K>,
        FV: Release<V>,
    {
        check_count(&self.buckets, self.len);
        let mut released = 0;
        for chain in self.buckets.iter_mut() {
            for entry in chain.drain() {
                let (k, v) = entry.into_parts();
                free_key.release(k);
                free_value.release(v);
                released += 1;
            }
        }
        debug!(
            "destroyed chained table with {} buckets, released {released} entries",
            self.buckets.len()
        );
        released
    }

    /// Write one `"<key>: <value address>"` line per entry, in bucket then
    /// chain order. For debugging only; the format is not stable.
    pub fn dump<W>(&self, sink: &mut W) -> io::Result<()>
    where
        W: io::Write + ?Sized,
        K: Display,
    {
        for entry in self.iter() {
            writeln!(sink, "{}: {:p}", entry.key(), entry.value())?;
        }
        Ok(())
    }

    /// Walk every chain and assert the structural invariants. Debug builds
    /// only; a no-op in release.
    pub fn check_invariants(&self)
    where
        H: KeyHasher<K>,
        E: KeyEquivalence<K>,
    {
        for (bucket, chain) in self.buckets.iter().enumerate() {
            check_chain(chain, bucket, self.buckets.len(), &self.hasher, &self.key_eq);
        }
        check_count(&self.buckets, self.len);
    }
}

impl<'a, K, V, H, E> IntoIterator for &'a ChainedTable<K, V, H, E> {
    type Item = &'a Entry<K, V>;
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, H, E> core::fmt::Debug for ChainedTable<K, V, H, E>
where
    K: core::fmt::Debug,
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|e| (e.key(), e.value())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::DropRelease;
    use std::cell::Cell;

    // Places "a" and "c" in bucket 1 and "b" in bucket 3 of a 4-bucket table.
    struct Placed;
    impl<Q: ?Sized + AsRef<str>> KeyHasher<Q> for Placed {
        fn hash_key(&self, key: &Q) -> u32 {
            match key.as_ref() {
                "a" | "c" => 1,
                "b" => 3,
                _ => 0,
            }
        }
    }

    fn placed_table() -> ChainedTable<String, u32, Placed> {
        let mut t = TableConfig::new(4).hasher(Placed).build().unwrap();
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            assert!(t.update_insert(k.to_string(), i as u32).unwrap().is_none());
        }
        t
    }

    /// Deleting one key of a shared chain leaves its neighbour reachable.
    #[test]
    fn shared_bucket_survives_delete() {
        let mut t = placed_table();
        assert_eq!(t.chain_len(1), 2);
        assert_eq!(t.chain_len(3), 1);
        assert_eq!(t.get("a"), Some(&0));
        assert_eq!(t.get("b"), Some(&1));
        assert_eq!(t.get("c"), Some(&2));

        assert!(t.delete("a", DropRelease, DropRelease));
        assert!(t.find("a").is_none());
        assert_eq!(t.get("c"), Some(&2));
        assert_eq!(t.len(), 2);
        t.check_invariants();
    }

    /// Chains are newest-first.
    #[test]
    fn newest_entry_heads_its_chain() {
        let t = placed_table();
        let chain: Vec<&str> = t.bucket_entries(1).map(|e| e.key().as_str()).collect();
        assert_eq!(chain, ["c", "a"]);
    }

    /// Replacing hands back the old entry and keeps exactly one entry per key.
    #[test]
    fn update_insert_replaces_and_returns_old() {
        let mut t = placed_table();
        let old = t.update_insert("a".to_string(), 10).unwrap().expect("old entry");
        assert_eq!(old.into_parts(), ("a".to_string(), 0));
        assert_eq!(t.len(), 3);
        assert_eq!(t.chain_len(1), 2);
        assert_eq!(t.get("a"), Some(&10));
        // The replacement is the new head.
        assert_eq!(t.bucket_entries(1).next().map(|e| e.key().as_str()), Some("a"));
        t.check_invariants();
    }

    /// A failed chain reservation leaves the table exactly as it was.
    #[test]
    fn chain_out_of_memory_leaves_table_untouched() {
        let mut t = placed_table();
        t.update_insert("d".to_string(), 3).unwrap();
        let before: Vec<(String, u32)> = t.iter().map(|e| (e.key().clone(), *e.value())).collect();

        crate::chain::fail_next_reserve();
        let r = t.update_insert("e".to_string(), 4);
        assert_eq!(r.err(), Some(TableError::ChainOutOfMemory { bucket: 0 }));

        let after: Vec<(String, u32)> = t.iter().map(|e| (e.key().clone(), *e.value())).collect();
        assert_eq!(after, before);
        assert_eq!(t.len(), 4);
        assert_eq!(t.chain_len(0), 1);
        assert!(t.find("e").is_none());
        t.check_invariants();

        // The next insert goes through.
        assert!(t.update_insert("e".to_string(), 4).unwrap().is_none());
        assert_eq!(t.bucket_entries(0).next().map(|e| e.key().as_str()), Some("e"));
    }

    /// Replacing reuses the slot and never reserves.
    #[test]
    fn replace_does_not_reserve() {
        let mut t = placed_table();
        crate::chain::fail_next_reserve();
        let old = t.update_insert("c".to_string(), 9).unwrap();
        assert_eq!(old.map(|e| *e.value()), Some(2));
        // The armed failure is still pending and hits the next real insert.
        assert!(t.update_insert("z".to_string(), 0).is_err());
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn delete_missing_key_changes_nothing() {
        let mut t = placed_table();
        let calls = Cell::new(0);
        let ok = t.delete("zzz", |_: String| calls.set(calls.get() + 1), |_: u32| {
            calls.set(calls.get() + 1)
        });
        assert!(!ok);
        assert_eq!(calls.get(), 0);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn delete_releases_key_and_value_once() {
        let mut t = placed_table();
        let mut keys = Vec::new();
        let mut values = Vec::new();
        assert!(t.delete("b", |k| keys.push(k), |v| values.push(v)));
        assert_eq!(keys, ["b"]);
        assert_eq!(values, [1]);
        assert!(!t.contains_key("b"));
        assert_eq!(t.chain_len(3), 0);
    }

    #[test]
    fn destroy_releases_every_survivor() {
        let mut t = placed_table();
        t.update_insert("d".to_string(), 3).unwrap();
        t.remove("b").unwrap();
        let mut keys = Vec::new();
        let mut values = 0;
        let n = t.destroy(|k: String| keys.push(k), |_: u32| values += 1);
        assert_eq!(n, 3);
        assert_eq!(values, 3);
        // Bucket order, then chain order.
        assert_eq!(keys, ["d", "c", "a"]);
    }

    #[test]
    fn get_mut_updates_value() {
        let mut t = placed_table();
        *t.get_mut("c").unwrap() += 40;
        assert_eq!(t.get("c"), Some(&42));
        assert!(t.get_mut("nope").is_none());
    }

    #[test]
    fn dump_lists_entries_in_table_order() {
        let t = placed_table();
        let mut out = Vec::new();
        t.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let keys: Vec<&str> = text
            .lines()
            .map(|l| l.split_once(": ").expect("key: address").0)
            .collect();
        assert_eq!(keys, ["c", "a", "b"]);
        let addr = format!("{:p}", t.get("b").unwrap());
        assert!(text.lines().last().unwrap().ends_with(&addr));
    }

    #[test]
    fn iter_mut_reaches_every_value() {
        let mut t = placed_table();
        for (_k, v) in t.iter_mut() {
            *v *= 2;
        }
        let mut values: Vec<u32> = t.iter().map(|e| *e.value()).collect();
        values.sort_unstable();
        assert_eq!(values, [0, 2, 4]);
    }

    #[test]
    fn iter_matches_len() {
        let t = placed_table();
        assert_eq!(t.iter().count(), t.len());
        assert_eq!((&t).into_iter().count(), 3);
    }

    #[test]
    fn debug_prints_as_map() {
        let mut t: ChainedTable<&str, u8> = ChainedTable::new(1).unwrap();
        t.update_insert("k", 1).unwrap();
        assert_eq!(format!("{t:?}"), r#"{"k": 1}"#);
    }
}
