//! Entries and per-bucket chains.

use core::iter::Rev;
use core::slice;
use std::collections::TryReserveError;

#[cfg(test)]
thread_local! {
    static FAIL_NEXT_RESERVE: core::cell::Cell<bool> = const { core::cell::Cell::new(false) };
}

/// Make the next `Chain::try_reserve_one` on this thread fail.
#[cfg(test)]
pub(crate) fn fail_next_reserve() {
    FAIL_NEXT_RESERVE.with(|f| f.set(true));
}

#[cfg(test)]
fn reserve_fault() -> bool {
    FAIL_NEXT_RESERVE.with(|f| f.replace(false))
}

#[cfg(not(test))]
#[inline(always)]
fn reserve_fault() -> bool {
    false
}

/// One key/value pair stored in a bucket chain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Entry<K, V> {
    key: K,
    value: V,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub(crate) fn parts_mut(&mut self) -> (&K, &mut V) {
        (&self.key, &mut self.value)
    }

    /// Take ownership of the key and value.
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

/// Sequence of entries sharing a bucket.
///
/// Logically a singly linked list whose head is the most recently
/// inserted entry. Stored as a `Vec` with the head at the end, so
/// prepending is a push and chain order is reverse storage order.
/// Positions handed out by `position` are storage indices and stay valid
/// until the next mutation.
#[derive(Debug)]
pub(crate) struct Chain<K, V> {
    entries: Vec<Entry<K, V>>,
}

impl<K, V> Chain<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in chain order, head first.
    pub(crate) fn iter(&self) -> Rev<slice::Iter<'_, Entry<K, V>>> {
        self.entries.iter().rev()
    }

    pub(crate) fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Entry<K, V>> + '_ {
        self.entries.iter_mut().rev()
    }

    /// Storage index of the first entry, in chain order, matching `pred`.
    pub(crate) fn position<P>(&self, mut pred: P) -> Option<usize>
    where
        P: FnMut(&K) -> bool,
    {
        self.entries.iter().rposition(|e| pred(&e.key))
    }

    pub(crate) fn get(&self, pos: usize) -> &Entry<K, V> {
        &self.entries[pos]
    }

    pub(crate) fn get_mut(&mut self, pos: usize) -> &mut Entry<K, V> {
        &mut self.entries[pos]
    }

    /// Make room for one more entry without touching the chain contents.
    pub(crate) fn try_reserve_one(&mut self) -> Result<(), TryReserveError> {
        if reserve_fault() {
            return Vec::<u64>::new().try_reserve(usize::MAX);
        }
        self.entries.try_reserve(1)
    }

    /// Prepend `entry`. Callers reserve first when allocation failure must
    /// be reported instead of aborting.
    pub(crate) fn push_front(&mut self, entry: Entry<K, V>) {
        self.entries.push(entry);
    }

    /// Unlink the entry at storage index `pos`, preserving the order of
    /// the rest of the chain.
    pub(crate) fn unlink(&mut self, pos: usize) -> Entry<K, V> {
        self.entries.remove(pos)
    }

    /// Swap the entry at `pos` out for `entry`, which becomes the new head.
    /// Never allocates: the chain length is unchanged.
    pub(crate) fn replace(&mut self, pos: usize, entry: Entry<K, V>) -> Entry<K, V> {
        let tail = &mut self.entries[pos..];
        tail.rotate_left(1);
        let last = tail.len() - 1;
        core::mem::replace(&mut tail[last], entry)
    }

    /// Remove every entry, yielding them in chain order.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Entry<K, V>> + '_ {
        self.entries.drain(..).rev()
    }
}
