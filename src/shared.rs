//! SharedTable: chains sharded inside the partition mutexes.
//!
//! Every bucket's chain lives inside the mutex of the lock that owns it,
//! so the partition lock is the only way to reach a chain. Inserts,
//! deletes and lookups take `&self` and lock one partition; a scan holds
//! one partition at a time, leaving writers on every other partition free
//! to proceed.
//!
//! The partition is checked against the bucket count when the table is
//! built and the lock runs are computed once, so a scan never re-derives
//! lock boundaries and never fails.

use crate::chain::{Chain, Entry};
use crate::config::TableConfig;
use crate::error::TableError;
use crate::hash::{DefaultEq, KeyEquivalence, KeyHasher, Pjw};
use crate::invariants::{bucket_index, check_chain};
use crate::partition::{partition_runs, LockPartition, LockRun};
use crate::release::Release;
use crate::table::ChainedTable;
use core::borrow::Borrow;
use core::sync::atomic::{AtomicUsize, Ordering};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::TryReserveError;

/// Where a bucket's chain lives: the owning lock and the slot inside
/// that lock's shard.
#[derive(Copy, Clone, Debug)]
struct Slot {
    lock: usize,
    index: usize,
}

/// Fixed-size chained table whose buckets are guarded by a lock
/// partition, for hosts that insert and delete while other threads scan.
pub struct SharedTable<K, V, H = Pjw, E = DefaultEq> {
    shards: Vec<Mutex<Vec<Chain<K, V>>>>,
    slots: Vec<Slot>,
    runs: Vec<LockRun>,
    len: AtomicUsize,
    hasher: H,
    key_eq: E,
}

impl<K, V> SharedTable<K, V> {
    /// `bucket_count` buckets spread over `lock_count` locks by `partition`,
    /// with the default hasher and key equality.
    pub fn new<P>(bucket_count: usize, lock_count: usize, partition: &P) -> Result<Self, TableError>
    where
        P: LockPartition + ?Sized,
    {
        TableConfig::new(bucket_count).build_shared(lock_count, partition)
    }
}

impl<K, V, H, E> SharedTable<K, V, H, E> {
    pub fn with_config<P>(
        config: TableConfig<H, E>,
        lock_count: usize,
        partition: &P,
    ) -> Result<Self, TableError>
    where
        P: LockPartition + ?Sized,
    {
        let TableConfig {
            bucket_count,
            hasher,
            key_eq,
        } = config;
        if bucket_count == 0 {
            return Err(TableError::ZeroBuckets);
        }
        let runs = partition_runs(bucket_count, lock_count, partition)?;

        let oom = |_: TryReserveError| TableError::OutOfMemory {
            buckets: bucket_count,
        };
        let mut slots = Vec::new();
        slots.try_reserve_exact(bucket_count).map_err(oom)?;
        let mut shard_chains: Vec<Vec<Chain<K, V>>> = Vec::new();
        shard_chains.try_reserve_exact(lock_count).map_err(oom)?;
        shard_chains.resize_with(lock_count, Vec::new);
        for run in &runs {
            let shard = &mut shard_chains[run.lock];
            shard.try_reserve(run.buckets.len()).map_err(oom)?;
            for _ in run.buckets.clone() {
                slots.push(Slot {
                    lock: run.lock,
                    index: shard.len(),
                });
                shard.push(Chain::new());
            }
        }
        debug!(
            "created shared table with {bucket_count} buckets over {lock_count} locks in {} runs",
            runs.len()
        );
        Ok(Self {
            shards: shard_chains.into_iter().map(Mutex::new).collect(),
            slots,
            runs,
            len: AtomicUsize::new(0),
            hasher,
            key_eq,
        })
    }

    /// Entries across all partitions. Exact only when no writer is active.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.slots.len()
    }

    pub fn lock_count(&self) -> usize {
        self.shards.len()
    }

    /// Lock owning `bucket`. Panics if `bucket` is out of range.
    pub fn lock_of(&self, bucket: usize) -> usize {
        self.slots[bucket].lock
    }

    /// The coalesced runs a scan walks, in bucket order.
    pub fn runs(&self) -> &[LockRun] {
        &self.runs
    }

    pub fn bucket_of<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized,
        H: KeyHasher<Q>,
    {
        bucket_index(self.hasher.hash_key(key), self.slots.len())
    }

    /// Run `f` on the entry for `key`, or on `None`, while its partition
    /// is locked.
    pub fn find_with<Q, R, F>(&self, key: &Q, f: F) -> R
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
        F: FnOnce(Option<&Entry<K, V>>) -> R,
    {
        let slot = self.slots[self.bucket_of(key)];
        let shard = self.shards[slot.lock].lock();
        let chain = &shard[slot.index];
        let found = chain
            .position(|k| self.key_eq.equivalent(k.borrow(), key))
            .map(|pos| chain.get(pos));
        f(found)
    }

    pub fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
        V: Clone,
    {
        self.find_with(key, |e| e.map(|e| e.value().clone()))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
    {
        self.find_with(key, |e| e.is_some())
    }

    /// Insert or replace under the owning partition lock. Same contract as
    /// `ChainedTable::update_insert`.
    pub fn update_insert(&self, key: K, value: V) -> Result<Option<Entry<K, V>>, TableError>
    where
        H: KeyHasher<K>,
        E: KeyEquivalence<K>,
    {
        let bucket = self.bucket_of(&key);
        let slot = self.slots[bucket];
        let mut shard = self.shards[slot.lock].lock();
        let chain = &mut shard[slot.index];
        let replaced = match chain.position(|k| self.key_eq.equivalent(k, &key)) {
            Some(pos) => Some(chain.replace(pos, Entry::new(key, value))),
            None => {
                chain
                    .try_reserve_one()
                    .map_err(|_| TableError::ChainOutOfMemory { bucket })?;
                chain.push_front(Entry::new(key, value));
                self.len.fetch_add(1, Ordering::AcqRel);
                None
            }
        };
        check_chain(chain, bucket, self.slots.len(), &self.hasher, &self.key_eq);
        trace!("update_insert in bucket {bucket} under lock {}", slot.lock);
        Ok(replaced)
    }

    /// Unlink the entry for `key` under its partition lock.
    pub fn remove<Q>(&self, key: &Q) -> Option<Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        H: KeyHasher<Q>,
        E: KeyEquivalence<Q>,
    {
        let slot = self.slots[self.bucket_of(key)];
        let mut shard = self.shards[slot.lock].lock();
        let chain = &mut shard[slot.index];
        let pos = chain.position(|k| self.key_eq.equivalent(k.borrow(), key))?;
        let entry = chain.unlink(pos);
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(entry)
    }

    /// Remove the entry for `key` and release its parts. The partition
    /// lock is dropped before the release capabilities run.
    pub fn delete<Q, FK, FV>(&self, key: &Q, mut free_key: FK, mut free_value: FV) -> bool
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

    /// Visit entries in bucket then chain order until `pred` returns
    /// `true`, holding one partition lock at a time. Returns whether a
    /// match stopped the scan.
    ///
    /// Writers on partitions the scan has not reached yet are seen; those
    /// on partitions already passed are not.
    pub fn apply_until<F>(&self, mut pred: F) -> bool
    where
        F: FnMut(&Entry<K, V>) -> bool,
    {
        for run in &self.runs {
            let shard = self.shards[run.lock].lock();
            for bucket in run.buckets.clone() {
                if shard[self.slots[bucket].index].iter().any(&mut pred) {
                    debug!("apply_until matched in bucket {bucket} under lock {}", run.lock);
                    return true;
                }
            }
        }
        false
    }

    /// Flatten back into a `ChainedTable`, keeping every entry and its
    /// chain position.
    pub fn into_table(self) -> ChainedTable<K, V, H, E> {
        let mut shards: Vec<Vec<Chain<K, V>>> =
            self.shards.into_iter().map(Mutex::into_inner).collect();
        let buckets: Vec<Chain<K, V>> = self
            .slots
            .iter()
            .map(|s| core::mem::replace(&mut shards[s.lock][s.index], Chain::new()))
            .collect();
        ChainedTable::from_parts(buckets, self.len.into_inner(), self.hasher, self.key_eq)
    }

    /// Release every surviving key and value once, in bucket then chain
    /// order. Returns the number of entries released.
    pub fn destroy<FK, FV>(self, free_key: FK, free_value: FV) -> usize
    where
        FK: Release<K>,
        FV: Release<V>,
    {
        self.into_table().destroy(free_key, free_value)
    }
}
