//! Bucket-to-lock partitions used by `ChainedTable::apply_until`.
//!
//! A partition assigns every bucket to exactly one lock. The mapping must
//! be stable: the same bucket always maps to the same lock for the life of
//! the table. Consecutive buckets sharing a lock are coalesced into a
//! `LockRun` so a scan takes each lock once per run rather than once per
//! bucket.

use crate::error::TableError;
use core::ops::Range;
use parking_lot::{Mutex, MutexGuard};

/// Maps a bucket index to the index of the lock that owns it.
pub trait LockPartition {
    fn lock_for(&self, bucket: usize) -> usize;
}

/// Runs of `span` consecutive buckets share one lock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Contiguous {
    span: usize,
}

impl Contiguous {
    /// Spread `bucket_count` buckets over `lock_count` locks in equal
    /// contiguous runs; the last run may be shorter.
    pub fn new(bucket_count: usize, lock_count: usize) -> Self {
        let span = bucket_count.div_ceil(lock_count.max(1)).max(1);
        Self { span }
    }

    pub fn span(&self) -> usize {
        self.span
    }
}

impl LockPartition for Contiguous {
    #[inline]
    fn lock_for(&self, bucket: usize) -> usize {
        bucket / self.span
    }
}

/// Bucket `i` belongs to lock `i % locks`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Striped {
    locks: usize,
}

impl Striped {
    pub fn new(locks: usize) -> Self {
        Self {
            locks: locks.max(1),
        }
    }
}

impl LockPartition for Striped {
    #[inline]
    fn lock_for(&self, bucket: usize) -> usize {
        bucket % self.locks
    }
}

impl<F> LockPartition for F
where
    F: Fn(usize) -> usize,
{
    #[inline]
    fn lock_for(&self, bucket: usize) -> usize {
        self(bucket)
    }
}

/// A set of locks covering a table's buckets, as seen by the scan.
pub trait BucketLocks {
    /// Held while the lock is owned; dropping it releases the lock.
    type Guard<'a>
    where
        Self: 'a;

    fn lock_count(&self) -> usize;

    /// Lock index owning `bucket`; must be `< lock_count()`.
    fn partition_of(&self, bucket: usize) -> usize;

    /// Block until lock `lock` is held. `lock` is always `< lock_count()`.
    fn acquire(&self, lock: usize) -> Self::Guard<'_>;
}

/// Consecutive buckets `buckets` all owned by lock `lock`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LockRun {
    pub lock: usize,
    pub buckets: Range<usize>,
}

/// Coalesce buckets `0..bucket_count` into maximal runs that share a lock
/// of `locks`.
///
/// Fails with `LockOutOfRange` if any bucket maps past `lock_count()`.
pub fn lock_runs<L>(bucket_count: usize, locks: &L) -> Result<Vec<LockRun>, TableError>
where
    L: BucketLocks + ?Sized,
{
    partition_runs(bucket_count, locks.lock_count(), &|b: usize| locks.partition_of(b))
}

/// `lock_runs` for a bare partition over `lock_count` locks.
pub fn partition_runs<P>(
    bucket_count: usize,
    lock_count: usize,
    partition: &P,
) -> Result<Vec<LockRun>, TableError>
where
    P: LockPartition + ?Sized,
{
    let mut runs: Vec<LockRun> = Vec::new();
    for bucket in 0..bucket_count {
        let lock = partition.lock_for(bucket);
        if lock >= lock_count {
            return Err(TableError::LockOutOfRange {
                bucket,
                lock,
                locks: lock_count,
            });
        }
        match runs.last_mut() {
            Some(run) if run.lock == lock => run.buckets.end = bucket + 1,
            _ => runs.push(LockRun {
                lock,
                buckets: bucket..bucket + 1,
            }),
        }
    }
    Ok(runs)
}

/// Array of mutexes plus the partition assigning buckets to them.
///
/// Host writers take `lock_bucket` before touching state tied to a
/// bucket; scans take the same locks through `BucketLocks`.
#[derive(Debug)]
pub struct LockSet<P> {
    locks: Vec<Mutex<()>>,
    partition: P,
}

impl<P> LockSet<P>
where
    P: LockPartition,
{
    /// `lock_count` is clamped to at least one.
    pub fn new(lock_count: usize, partition: P) -> Self {
        let locks = (0..lock_count.max(1)).map(|_| Mutex::new(())).collect();
        Self { locks, partition }
    }

    pub fn partition(&self) -> &P {
        &self.partition
    }

    fn lock_of(&self, bucket: usize) -> Result<&Mutex<()>, TableError> {
        let lock = self.partition.lock_for(bucket);
        self.locks.get(lock).ok_or(TableError::LockOutOfRange {
            bucket,
            lock,
            locks: self.locks.len(),
        })
    }

    /// Lock owning `bucket`.
    pub fn lock_bucket(&self, bucket: usize) -> Result<MutexGuard<'_, ()>, TableError> {
        Ok(self.lock_of(bucket)?.lock())
    }

    /// `Ok(None)` if the owning lock is currently held.
    pub fn try_lock_bucket(&self, bucket: usize) -> Result<Option<MutexGuard<'_, ()>>, TableError> {
        Ok(self.lock_of(bucket)?.try_lock())
    }
}

impl LockSet<Contiguous> {
    pub fn contiguous(bucket_count: usize, lock_count: usize) -> Self {
        Self::new(lock_count, Contiguous::new(bucket_count, lock_count))
    }
}

impl LockSet<Striped> {
    pub fn striped(lock_count: usize) -> Self {
        Self::new(lock_count, Striped::new(lock_count))
    }
}

impl<P> BucketLocks for LockSet<P>
where
    P: LockPartition,
{
    type Guard<'a>
        = MutexGuard<'a, ()>
    where
        Self: 'a;

    fn lock_count(&self) -> usize {
        self.locks.len()
    }

    #[inline]
    fn partition_of(&self, bucket: usize) -> usize {
        self.partition.lock_for(bucket)
    }

    #[inline]
    fn acquire(&self, lock: usize) -> Self::Guard<'_> {
        self.locks[lock].lock()
    }
}
