//! Locked apply-until scan.

use crate::chain::Entry;
use crate::error::TableError;
use crate::partition::{lock_runs, BucketLocks};
use crate::table::ChainedTable;
use log::debug;

impl<K, V, H, E> ChainedTable<K, V, H, E> {
    /// Visit entries in bucket then chain order until `pred` returns
    /// `true`. Returns whether a match stopped the scan.
    ///
    /// Buckets are visited in runs that share a lock: each run's lock is
    /// acquired once before its first bucket and released after its last,
    /// so at most one lock is held at a time and writers on other
    /// partitions can make progress during a long scan. A match releases
    /// the current lock before returning.
    ///
    /// Fails with `LockOutOfRange`, before any lock is taken, if `locks`
    /// maps a bucket of this table past its lock count.
    pub fn apply_until<L, F>(&self, locks: &L, mut pred: F) -> Result<bool, TableError>
    where
        L: BucketLocks + ?Sized,
        F: FnMut(&Entry<K, V>) -> bool,
    {
        let chains = self.chains();
        for run in lock_runs(chains.len(), locks)? {
            let _guard = locks.acquire(run.lock);
            for bucket in run.buckets.clone() {
                if chains[bucket].iter().any(&mut pred) {
                    debug!("apply_until matched in bucket {bucket} under lock {}", run.lock);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TableError;
    use crate::partition::LockSet;
    use crate::table::ChainedTable;

    fn table(n: u32) -> ChainedTable<String, u32> {
        let mut t = ChainedTable::new(7).unwrap();
        for i in 0..n {
            t.update_insert(format!("key{i}"), i).unwrap();
        }
        t
    }

    #[test]
    fn never_matching_predicate_visits_everything_in_table_order() {
        let t = table(40);
        let locks = LockSet::contiguous(t.bucket_count(), 3);
        let mut seen = Vec::new();
        let matched = t.apply_until(&locks, |e| {
            seen.push(e.key().clone());
            false
        });
        assert_eq!(matched, Ok(false));
        let expected: Vec<String> = t.iter().map(|e| e.key().clone()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn match_stops_the_scan() {
        let t = table(40);
        let locks = LockSet::striped(2);
        let mut visits = 0;
        let matched = t.apply_until(&locks, |e| {
            visits += 1;
            e.key() == "key17"
        });
        assert_eq!(matched, Ok(true));
        let position = t.iter().position(|e| e.key() == "key17").unwrap();
        assert_eq!(visits, position + 1);
        // All locks are free again.
        for b in 0..t.bucket_count() {
            assert!(locks.try_lock_bucket(b).unwrap().is_some());
        }
    }

    #[test]
    fn empty_table_scans_nothing() {
        let t: ChainedTable<String, u32> = ChainedTable::new(4).unwrap();
        let locks = LockSet::contiguous(4, 4);
        assert_eq!(t.apply_until(&locks, |_| true), Ok(false));
    }

    #[test]
    fn undersized_lock_set_is_rejected_before_locking() {
        let t = table(40);
        // Contiguous over 4 buckets sends buckets 4.. past the last lock.
        let locks = LockSet::contiguous(4, 2);
        let mut visits = 0;
        let r = t.apply_until(&locks, |_| {
            visits += 1;
            false
        });
        assert!(matches!(r, Err(TableError::LockOutOfRange { bucket: 4, .. })));
        assert_eq!(visits, 0);
        assert!(locks.try_lock_bucket(0).unwrap().is_some());
    }
}
