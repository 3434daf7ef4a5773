//! Destruction capabilities for keys and values leaving the table.
//!
//! `delete` and `destroy` hand each removed key and value to a `Release`
//! instead of dropping them directly, so the caller decides what happens
//! to them: drop, recycle into a pool, count, or hand off elsewhere.

/// Consumes an item leaving the table.
pub trait Release<T> {
    fn release(&mut self, item: T);
}

/// Drops the item. Use this where a no-op destructor would be passed to a
/// C-style API: for borrowed keys such as `&str` dropping does nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct DropRelease;

impl<T> Release<T> for DropRelease {
    #[inline]
    fn release(&mut self, item: T) {
        drop(item);
    }
}

impl<T, F> Release<T> for F
where
    F: FnMut(T),
{
    #[inline]
    fn release(&mut self, item: T) {
        self(item)
    }
}
