//! chained-table: a fixed-size hash table with separate chaining and a
//! lock-partitioned scan for multi-threaded hosts.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: an associative container whose bucket layout is fixed at
//!   creation, so a host can shard the buckets across a fixed set of
//!   mutexes and scan the whole table without holding every mutex.
//! - Layers:
//!   - `hash`: `KeyHasher` (default `Pjw`, a PJW/ELF string hash) and
//!     `KeyEquivalence` (default `DefaultEq`).
//!   - `chain`: `Entry<K, V>` and the per-bucket chain. Newest entry is
//!     the head.
//!   - `table`: `ChainedTable<K, V, H, E>`; find, insert-or-replace,
//!     delete, destroy, dump.
//!   - `partition` + `scan`: `LockPartition`, `BucketLocks`, `LockSet`
//!     and `ChainedTable::apply_until`.
//!   - `shared`: `SharedTable`, the same chains sharded inside the
//!     partition mutexes so inserts and deletes run beside scans.
//!
//! Constraints
//! - Bucket count is strictly positive and never changes; there is no
//!   rehashing.
//! - At most one entry per equivalent key in a chain. `update_insert`
//!   replaces rather than duplicates and stops at the first equivalent
//!   key. Debug builds assert this after every insert.
//! - `len()` always equals the number of chained entries.
//! - Allocation failure is reported (`TableError`), never a corrupted
//!   table: chain slots are reserved before anything is unlinked.
//!
//! Ownership
//! - The table owns its keys and values. Removal paths either hand the
//!   `Entry` back (`remove`, `update_insert`) or pass key and value to a
//!   caller-supplied `Release` (`delete`, `destroy`). `destroy` consumes
//!   the table.
//!
//! Concurrency
//! - `ChainedTable` performs no locking. Structural mutation needs `&mut`.
//!   `apply_until` takes `&self` plus a `BucketLocks`; it acquires each
//!   lock once per run of consecutive buckets owned by that lock and never
//!   holds two locks at once. Hosts that mutate per-entry state
//!   concurrently with scans do so through interior mutability in `V`
//!   while holding `LockSet::lock_bucket` for the entry's bucket.
//! - `SharedTable` moves each chain inside the mutex of its owning lock.
//!   Every operation takes `&self` and one partition lock, so writers on
//!   partitions a scan is not holding make progress during the scan.
//! - A partition that maps a bucket past the lock count is reported as
//!   `LockOutOfRange`: by `apply_until` before it locks anything, and by
//!   `SharedTable` construction.
//!
//! Notes and non-goals
//! - No resizing, no iteration order beyond bucket index then chain
//!   order, no locking inside `ChainedTable`.
//! - `dump` output is diagnostic only and not a stable format.

mod chain;
mod config;
mod error;
pub mod hash;
mod invariants;
pub mod partition;
mod release;
mod scan;
mod shared;
mod table;
mod table_proptest;

// Public surface
pub use chain::Entry;
pub use config::TableConfig;
pub use error::TableError;
pub use hash::{pjw_hash, DefaultEq, KeyEquivalence, KeyHasher, Pjw};
pub use partition::{
    lock_runs, partition_runs, BucketLocks, Contiguous, LockPartition, LockRun, LockSet, Striped,
};
pub use release::{DropRelease, Release};
pub use shared::SharedTable;
pub use table::{ChainedTable, Iter};
