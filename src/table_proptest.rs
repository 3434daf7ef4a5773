#![cfg(test)]

// Property tests for ChainedTable kept inside the crate so they can reach
// chain-level invariants through `check_invariants`.

use crate::hash::{DefaultEq, KeyHasher, Pjw};
use crate::partition::LockSet;
use crate::release::DropRelease;
use crate::table::ChainedTable;
use crate::TableConfig;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Delete(usize),
    Remove(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Scan(usize),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            idx.clone().prop_map(OpI::Delete),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Find),
            prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            idx.clone().prop_map(OpI::Scan),
            Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Always bucket 0: every key shares one chain.
struct ConstHasher;
impl<Q: ?Sized> KeyHasher<Q> for ConstHasher {
    fn hash_key(&self, _key: &Q) -> u32 {
        0
    }
}

// State-machine equivalence against std::collections::HashMap.
// Invariants exercised after every op:
// - `len()` equals the model size and the sum of chain lengths.
// - No chain holds two equivalent keys; every key sits in its own bucket.
// - `update_insert` hands back the replaced entry exactly when the key existed.
// - `delete` on a missing key reports false and changes nothing.
// - `apply_until` visits entries in `iter()` order and stops at the match.
fn run_state_machine<H>(
    mut sut: ChainedTable<Key, i32, H>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    H: KeyHasher<Key> + KeyHasher<str>,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    let locks = LockSet::contiguous(sut.bucket_count(), 3);

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let replaced = sut.update_insert(k.clone(), v).expect("insert");
                let prev = model.insert(k.clone(), v);
                prop_assert_eq!(replaced.as_ref().map(|e| *e.value()), prev);
                if let Some(old) = replaced {
                    prop_assert!(*old.key() == k);
                }
                let bucket = sut.bucket_of(&k);
                let head = sut.bucket_entries(bucket).next().map(|e| e.key().clone());
                prop_assert_eq!(head, Some(k), "new entry must head its chain");
            }
            OpI::Delete(i) => {
                let k = key_from(&pool, i);
                let mut released = 0;
                let ok = sut.delete(&k, |_: Key| released += 1, DropRelease);
                prop_assert_eq!(ok, model.remove(&k).is_some());
                prop_assert_eq!(released, usize::from(ok));
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                let got = sut.remove(k.0.as_str()).map(|e| e.into_parts());
                prop_assert_eq!(got, model.remove(&k).map(|v| (k.clone(), v)));
            }
            OpI::Find(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.find(&k).map(|e| *e.value()), model.get(&k).copied());
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(v) = sut.get_mut(&k) {
                    *v = v.saturating_add(d);
                    let mv = model.get_mut(&k).expect("present in model");
                    *mv = mv.saturating_add(d);
                } else {
                    prop_assert!(!model.contains_key(&k));
                }
            }
            OpI::Scan(i) => {
                let k = key_from(&pool, i);
                let mut visited = Vec::new();
                let matched = sut.apply_until(&locks, |e| {
                    visited.push(e.key().clone());
                    *e.key() == k
                });
                prop_assert_eq!(matched, Ok(model.contains_key(&k)));
                let order: Vec<Key> = sut.iter().map(|e| e.key().clone()).collect();
                let expect_len = match order.iter().position(|o| *o == k) {
                    Some(p) => p + 1,
                    None => order.len(),
                };
                prop_assert_eq!(&visited[..], &order[..expect_len]);
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|e| e.key().clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        sut.check_invariants();
        let walked: usize = (0..sut.bucket_count()).map(|b| sut.chain_len(b)).sum();
        prop_assert_eq!(walked, sut.len());
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }

    let expected = sut.len();
    let mut released = 0;
    prop_assert_eq!(sut.destroy(|_: Key| released += 1, DropRelease), expected);
    prop_assert_eq!(released, expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario(), buckets in 1usize..=16) {
        let sut: ChainedTable<Key, i32, Pjw, DefaultEq> = ChainedTable::new(buckets).unwrap();
        run_state_machine(sut, pool, ops)?;
    }
}

// Same invariants under worst-case collisions: one chain holds everything.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = TableConfig::new(4).hasher(ConstHasher).build().unwrap();
        run_state_machine(sut, pool, ops)?;
    }
}
