//! Generation-checked handles into a [`MemoryPool`](super::MemoryPool)

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed reference to a pooled object
///
/// A handle records the slot index and the slot generation at the time it was
/// handed out. Destroying the object bumps the slot generation, so handles held
/// across a destroy/create cycle stop resolving instead of observing the new
/// occupant of the slot.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    type_marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            type_marker: PhantomData,
        }
    }

    /// A handle that never resolves in any pool
    pub fn null() -> Self {
        Self::new(u32::MAX, u32::MAX)
    }

    /// Check whether this is the null handle
    pub fn is_null(&self) -> bool {
        self.index == u32::MAX && self.generation == u32::MAX
    }

    /// Slot index in the owning pool
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation this handle was issued for
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// Manual impls so `T` itself needn't be Clone/Eq/Hash/Debug.

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &std::any::type_name::<T>())
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}
