use std::{fmt::Debug, marker::PhantomData};

use crossbeam::atomic::AtomicCell;

pub type IdType = u64;
/// Shared by every kind of id, so values never repeat within a process
static ID_COUNTER: AtomicCell<IdType> = AtomicCell::new(1);

/// A process-local identifier for in-memory things like connections.
/// These are never persisted, use database keys for that.
pub struct Id<T> {
    value: IdType,
    kind: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new() -> Self {
        Self {
            value: ID_COUNTER.fetch_add(1),
            kind: PhantomData,
        }
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}
impl<T> Eq for Id<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing;

    #[test]
    fn test_ids_are_unique() {
        let a = Id::<Thing>::new();
        let b = Id::<Thing>::new();

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
