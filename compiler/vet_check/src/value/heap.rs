//! Shared payloads of composite values.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Reference-counted, immutable storage for the elements of a composite
/// `Value`.
///
/// Only `Value` constructors create one, so cloning a value is a reference
/// count bump however large or deep it is.
pub struct Heap<T>(Arc<T>);

impl<T> Heap<T> {
    #[inline]
    pub(super) fn new(value: T) -> Self {
        Heap(Arc::new(value))
    }

    /// The payload, if this is its only owner.
    #[inline]
    pub(super) fn get_mut(&mut self) -> Option<&mut T> {
        Arc::get_mut(&mut self.0)
    }

    /// Whether both handles share one allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Heap<T> {
    #[inline]
    fn clone(&self) -> Self {
        Heap(Arc::clone(&self.0))
    }
}

impl<T> Deref for Heap<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: PartialEq> PartialEq for Heap<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Heap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (*self.0).fmt(f)
    }
}

#[cfg(test)]
mod tests;
