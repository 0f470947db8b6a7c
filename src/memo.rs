//! Derived data cached next to immutable values
//!
//! Schemas and containers never change after construction, so anything derived from their
//! content (name indexes, locales in use) can be computed once and kept. A `Memo` takes no
//! part in equality and is skipped by serde: it is rebuilt on first access after
//! deserialization.

use std::fmt;
use std::sync::OnceLock;

pub(crate) struct Memo<T>(OnceLock<T>);

impl<T> Memo<T> {
    pub(crate) fn new() -> Self {
        Self(OnceLock::new())
    }

    /// A memo that is already filled.
    pub(crate) fn ready(value: T) -> Self {
        Self(OnceLock::from(value))
    }

    pub(crate) fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.0.get_or_init(init)
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> PartialEq for Memo<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T> Eq for Memo<T> {}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.get().is_some() { "Memo(ready)" } else { "Memo(empty)" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_initializes_once() {
        let memo = Memo::new();
        assert_eq!(*memo.get_or_init(|| 1), 1);
        assert_eq!(*memo.get_or_init(|| 2), 1);
    }

    #[test]
    fn test_memo_ignored_by_equality() {
        let empty: Memo<u32> = Memo::new();
        assert_eq!(empty, Memo::ready(7));
    }
}
