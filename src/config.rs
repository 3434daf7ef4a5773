//! Table construction parameters.

use crate::error::TableError;
use crate::hash::{DefaultEq, Pjw};
use crate::partition::LockPartition;
use crate::shared::SharedTable;
use crate::table::ChainedTable;

/// Creation-time configuration for a `ChainedTable`.
///
/// Defaults: `Pjw` hashing and `DefaultEq` key equality. The bucket count
/// is fixed for the life of the table.
#[derive(Clone, Debug)]
pub struct TableConfig<H = Pjw, E = DefaultEq> {
    pub(crate) bucket_count: usize,
    pub(crate) hasher: H,
    pub(crate) key_eq: E,
}

impl TableConfig {
    pub fn new(bucket_count: usize) -> Self {
        Self {
            bucket_count,
            hasher: Pjw,
            key_eq: DefaultEq,
        }
    }
}

impl<H, E> TableConfig<H, E> {
    /// Replace the hash function.
    pub fn hasher<H2>(self, hasher: H2) -> TableConfig<H2, E> {
        TableConfig {
            bucket_count: self.bucket_count,
            hasher,
            key_eq: self.key_eq,
        }
    }

    /// Replace the key equality predicate.
    pub fn key_eq<E2>(self, key_eq: E2) -> TableConfig<H, E2> {
        TableConfig {
            bucket_count: self.bucket_count,
            hasher: self.hasher,
            key_eq,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn build<K, V>(self) -> Result<ChainedTable<K, V, H, E>, TableError> {
        ChainedTable::with_config(self)
    }

    /// Build a `SharedTable` whose buckets are assigned to `lock_count`
    /// locks by `partition`.
    pub fn build_shared<K, V, P>(
        self,
        lock_count: usize,
        partition: &P,
    ) -> Result<SharedTable<K, V, H, E>, TableError>
    where
        P: LockPartition + ?Sized,
    {
        SharedTable::with_config(self, lock_count, partition)
    }
}
