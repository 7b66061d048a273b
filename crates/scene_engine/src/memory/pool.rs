//! Fixed-capacity object pool
//!
//! Every object the pool will ever hand out is constructed up front in a single
//! boxed slice. The slice is never reallocated, so an object stays at the same
//! address from `create` until it is destroyed, and destroying resets it in place
//! rather than freeing memory.
//!
//! # Free list
//!
//! ```text
//! slots:  [0] -> [1] -> [2] -> ... -> [n-1] -> None
//!          ^
//!      free_head
//! ```
//!
//! `create` pops the head and `destroy` pushes the released slot back on the
//! front, so the most recently freed object is the next one handed out. The
//! links live in the slot wrapper, not in `T`; pooled types only need `Default`.

use super::Handle;
use std::any::type_name;
use std::fmt;
use std::mem::size_of;

/// Errors produced by pools and the pool cluster
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// `create` was called with no free slot left
    #[error("Pool of {type_name} is exhausted (capacity {capacity})")]
    PoolExhausted {
        /// Pooled type
        type_name: &'static str,
        /// Fixed capacity of the pool
        capacity: usize,
    },

    /// No pool is registered for the requested type
    #[error("No pool registered for {type_name}")]
    PoolNotFound {
        /// Type used as the registry key
        type_name: &'static str,
    },

    /// Random access past the end of the pool
    #[error("Index {index} out of range for pool of {type_name} (capacity {capacity})")]
    IndexOutOfRange {
        /// Pooled type
        type_name: &'static str,
        /// Requested index
        index: usize,
        /// Fixed capacity of the pool
        capacity: usize,
    },

    /// Requested capacity is zero or does not fit the handle index space
    #[error("Invalid capacity {capacity} for pool of {type_name}")]
    InvalidCapacity {
        /// Pooled type
        type_name: &'static str,
        /// Requested capacity
        capacity: usize,
    },

    /// A pool exists under the key but holds a different concrete type
    #[error("Pool registered under {key} does not hold {requested}")]
    TypeMismatch {
        /// Type used as the registry key
        key: &'static str,
        /// Concrete type the caller asked for
        requested: &'static str,
    },
}

/// Usage snapshot of a single pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Name of the pooled type
    pub type_name: &'static str,
    /// Objects currently handed out
    pub active: usize,
    /// Fixed capacity
    pub capacity: usize,
    /// Memory held by the pooled objects
    pub size_in_bytes: usize,
}

struct Slot<T> {
    value: T,
    in_use: bool,
    generation: u32,
    next_free: Option<u32>,
}

impl<T: Default> Slot<T> {
    /// Return the slot to its freshly constructed state and invalidate old handles
    fn reset(&mut self) {
        self.value = T::default();
        self.in_use = false;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Fixed-capacity pool with O(1) create/destroy and stable object addresses
pub struct MemoryPool<T> {
    slots: Box<[Slot<T>]>,
    capacity: u32,
    free_head: Option<u32>,
    active_count: usize,
}

impl<T: Default> MemoryPool<T> {
    /// Create a pool holding `capacity` default-constructed objects
    ///
    /// Capacity must be non-zero and below `u32::MAX`, which is reserved for
    /// [`Handle::null`].
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        let count = u32::try_from(capacity)
            .ok()
            .filter(|&count| count > 0 && count < u32::MAX)
            .ok_or(PoolError::InvalidCapacity {
                type_name: type_name::<T>(),
                capacity,
            })?;

        let slots = (0..count)
            .map(|index| Slot {
                value: T::default(),
                in_use: false,
                generation: 0,
                next_free: (index + 1 < count).then_some(index + 1),
            })
            .collect();

        log::debug!(
            "Created MemoryPool<{}> with {} objects ({} bytes)",
            type_name::<T>(),
            capacity,
            size_of::<T>() * capacity
        );

        Ok(Self {
            slots,
            capacity: count,
            free_head: Some(0),
            active_count: 0,
        })
    }

    /// Hand out a free object
    ///
    /// The object is in its default state. Fails with
    /// [`PoolError::PoolExhausted`] when every slot is in use; pools never grow.
    pub fn create(&mut self) -> Result<Handle<T>, PoolError> {
        let index = self.free_head.ok_or(PoolError::PoolExhausted {
            type_name: type_name::<T>(),
            capacity: self.capacity(),
        })?;

        let slot = &mut self.slots[index as usize];
        debug_assert!(
            !slot.in_use,
            "free list of MemoryPool<{}> yielded live slot {}",
            type_name::<T>(),
            index
        );

        self.free_head = slot.next_free.take();
        slot.in_use = true;
        self.active_count += 1;

        Ok(Handle::new(index, slot.generation))
    }

    /// Reset an object to its default state and return it to the pool
    ///
    /// Returns `false` without touching the free list when the handle does not
    /// refer to a live object (double destroy, stale handle, or a slot that was
    /// never handed out).
    pub fn destroy(&mut self, handle: Handle<T>) -> bool {
        let capacity = self.capacity();
        let Some(slot) = self.slots.get_mut(handle.index() as usize) else {
            log::warn!(
                "Ignoring destroy of {:?}: index outside pool capacity {}",
                handle,
                capacity
            );
            return false;
        };

        if !slot.in_use {
            log::warn!("Ignoring destroy of {:?}: object is not in use", handle);
            return false;
        }

        if slot.generation != handle.generation() {
            log::warn!(
                "Ignoring destroy of {:?}: slot now holds generation {}",
                handle,
                slot.generation
            );
            return false;
        }

        slot.reset();
        slot.next_free = self.free_head;
        self.free_head = Some(handle.index());
        self.active_count -= 1;

        true
    }

    /// Destroy every live object
    ///
    /// Afterwards the pool is indistinguishable from a freshly constructed one,
    /// except that handles issued before the call no longer resolve.
    pub fn destroy_all(&mut self) {
        let released = self.active_count;

        for slot in self.slots.iter_mut().filter(|slot| slot.in_use) {
            slot.reset();
        }

        for (index, slot) in (0..self.capacity).zip(self.slots.iter_mut()) {
            slot.next_free = (index + 1 < self.capacity).then_some(index + 1);
        }
        self.free_head = Some(0);
        self.active_count = 0;

        if released > 0 {
            log::debug!("MemoryPool<{}> released {} objects", type_name::<T>(), released);
        }
    }
}

impl<T> MemoryPool<T> {
    fn live_slot(&self, handle: Handle<T>) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.in_use && slot.generation == handle.generation())
    }

    /// Check whether a handle still refers to a live object
    pub fn is_alive(&self, handle: Handle<T>) -> bool {
        self.live_slot(handle).is_some()
    }

    /// Get a live object
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.live_slot(handle).map(|slot| &slot.value)
    }

    /// Get a live object mutably
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.in_use && slot.generation == handle.generation())
            .map(|slot| &mut slot.value)
    }

    /// Bounds-checked access to the object stored at `index`, live or not
    pub fn get_object_at(&self, index: usize) -> Result<&T, PoolError> {
        self.slots
            .get(index)
            .map(|slot| &slot.value)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Bounds-checked mutable access to the object stored at `index`, live or not
    pub fn get_object_at_mut(&mut self, index: usize) -> Result<&mut T, PoolError> {
        let error = self.out_of_range(index);
        self.slots
            .get_mut(index)
            .map(|slot| &mut slot.value)
            .ok_or(error)
    }

    /// Handle of the live object at `index`, if any
    pub fn handle_at(&self, index: usize) -> Option<Handle<T>> {
        let slot = self.slots.get(index).filter(|slot| slot.in_use)?;
        let index = u32::try_from(index).ok()?;
        Some(Handle::new(index, slot.generation))
    }

    /// Iterate over live objects in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        (0..self.capacity)
            .zip(self.slots.iter())
            .filter(|(_, slot)| slot.in_use)
            .map(|(index, slot)| (Handle::new(index, slot.generation), &slot.value))
    }

    /// Iterate mutably over live objects in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> + '_ {
        (0..self.capacity)
            .zip(self.slots.iter_mut())
            .filter(|(_, slot)| slot.in_use)
            .map(|(index, slot)| (Handle::new(index, slot.generation), &mut slot.value))
    }

    /// Memory held by the pooled objects
    pub fn size_in_bytes(&self) -> usize {
        size_of::<T>() * self.capacity()
    }

    /// Number of objects currently handed out
    pub fn active_object_count(&self) -> usize {
        self.active_count
    }

    /// Number of objects the pool owns
    pub fn total_object_count(&self) -> usize {
        self.capacity()
    }

    /// Number of objects available to `create`
    pub fn free_object_count(&self) -> usize {
        self.capacity() - self.active_count
    }

    /// Fixed capacity of the pool
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Usage snapshot
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            type_name: type_name::<T>(),
            active: self.active_count,
            capacity: self.capacity(),
            size_in_bytes: self.size_in_bytes(),
        }
    }

    fn out_of_range(&self, index: usize) -> PoolError {
        PoolError::IndexOutOfRange {
            type_name: type_name::<T>(),
            index,
            capacity: self.capacity(),
        }
    }

    #[cfg(test)]
    fn free_list_len(&self) -> usize {
        let mut len = 0;
        let mut cursor = self.free_head;
        while let Some(index) = cursor {
            assert!(!self.slots[index as usize].in_use, "live slot {index} on the free list");
            len += 1;
            cursor = self.slots[index as usize].next_free;
        }
        len
    }
}

impl<T> fmt::Debug for MemoryPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPool")
            .field("type", &type_name::<T>())
            .field("capacity", &self.capacity)
            .field("active", &self.active_count)
            .field("free_head", &self.free_head)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        label: String,
        value: i32,
    }

    impl Default for Widget {
        fn default() -> Self {
            Self {
                label: "unnamed".to_string(),
                value: -1,
            }
        }
    }

    fn widget_pool(capacity: usize) -> MemoryPool<Widget> {
        MemoryPool::new(capacity).expect("valid capacity")
    }

    #[test]
    fn test_new_pool_is_all_free() {
        let pool = widget_pool(4);

        assert_eq!(pool.total_object_count(), 4);
        assert_eq!(pool.active_object_count(), 0);
        assert_eq!(pool.free_list_len(), 4);
        assert_eq!(pool.size_in_bytes(), size_of::<Widget>() * 4);
        assert!((0..4).all(|index| pool.handle_at(index).is_none()));
    }

    #[test]
    fn test_invalid_capacity() {
        assert!(matches!(
            MemoryPool::<Widget>::new(0),
            Err(PoolError::InvalidCapacity { capacity: 0, .. })
        ));
    }

    #[test]
    fn test_create_hands_out_slots_in_order() {
        let mut pool = widget_pool(3);

        let handles: Vec<_> = (0..3).map(|_| pool.create().unwrap()).collect();
        let indices: Vec<_> = handles.iter().map(|handle| handle.index()).collect();

        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_capacity_bound() {
        let mut pool = widget_pool(5);

        for _ in 0..5 {
            pool.create().unwrap();
        }

        assert_eq!(
            pool.create(),
            Err(PoolError::PoolExhausted {
                type_name: type_name::<Widget>(),
                capacity: 5,
            })
        );
        assert_eq!(pool.active_object_count(), 5);
    }

    #[test]
    fn test_live_objects_never_share_an_address() {
        let mut pool = widget_pool(8);

        let first = pool.create().unwrap();
        let first_address: *const Widget = pool.get(first).unwrap();

        let mut addresses = vec![first_address];
        for _ in 0..7 {
            let handle = pool.create().unwrap();
            let address: *const Widget = pool.get(handle).unwrap();
            assert!(!addresses.contains(&address));
            addresses.push(address);
        }

        assert!(std::ptr::eq(pool.get(first).unwrap(), first_address));
    }

    #[test]
    fn test_address_stable_while_live() {
        let mut pool = widget_pool(4);
        let handle = pool.create().unwrap();
        let address: *const Widget = pool.get(handle).unwrap();

        let other = pool.create().unwrap();
        pool.destroy(other);
        pool.create().unwrap();
        pool.get_mut(handle).unwrap().value = 42;

        assert!(std::ptr::eq(pool.get(handle).unwrap(), address));
        assert_eq!(pool.get(handle).unwrap().value, 42);
    }

    #[test]
    fn test_destroy_resets_state() {
        let mut pool = widget_pool(2);
        let handle = pool.create().unwrap();

        {
            let widget = pool.get_mut(handle).unwrap();
            widget.label = "gear".to_string();
            widget.value = 7;
        }

        assert!(pool.destroy(handle));
        assert!(!pool.is_alive(handle));
        assert!(pool.get(handle).is_none());
        assert_eq!(*pool.get_object_at(handle.index() as usize).unwrap(), Widget::default());
        assert!(pool.handle_at(handle.index() as usize).is_none());
    }

    #[test]
    fn test_usage_accounting() {
        let mut pool = widget_pool(10);
        let handles: Vec<_> = (0..7).map(|_| pool.create().unwrap()).collect();

        for handle in &handles[..3] {
            assert!(pool.destroy(*handle));
        }

        assert_eq!(pool.active_object_count(), 4);
        assert_eq!(pool.free_object_count(), 6);
        assert_eq!(pool.free_list_len(), 6);

        pool.destroy_all();

        assert_eq!(pool.active_object_count(), 0);
        assert_eq!(pool.free_list_len(), 10);
        assert!((0..10).all(|index| pool.handle_at(index).is_none()));
        assert!(handles.iter().all(|handle| !pool.is_alive(*handle)));
    }

    #[test]
    fn test_destroy_all_restores_construction_order() {
        let mut pool = widget_pool(3);
        let a = pool.create().unwrap();
        let _b = pool.create().unwrap();
        pool.destroy(a);

        pool.destroy_all();

        let indices: Vec<_> = (0..3).map(|_| pool.create().unwrap().index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_reuse_after_free_is_front_of_list() {
        let mut pool = widget_pool(6);
        let handles: Vec<_> = (0..5).map(|_| pool.create().unwrap()).collect();
        let middle = handles[2];
        let middle_address: *const Widget = pool.get(middle).unwrap();
        pool.get_mut(middle).unwrap().value = 99;

        assert!(pool.destroy(middle));
        let reused = pool.create().unwrap();

        assert_eq!(reused.index(), middle.index());
        assert_ne!(reused, middle);
        assert!(std::ptr::eq(pool.get(reused).unwrap(), middle_address));
        assert_eq!(*pool.get(reused).unwrap(), Widget::default());
    }

    #[test]
    fn test_double_destroy_is_ignored() {
        let mut pool = widget_pool(3);
        let first = pool.create().unwrap();
        let _second = pool.create().unwrap();

        assert!(pool.destroy(first));
        assert!(!pool.destroy(first));

        assert_eq!(pool.active_object_count(), 1);
        assert_eq!(pool.free_list_len(), 2);
    }

    #[test]
    fn test_stale_handle_does_not_touch_new_occupant() {
        let mut pool = widget_pool(1);
        let old = pool.create().unwrap();
        pool.destroy(old);

        let new = pool.create().unwrap();
        pool.get_mut(new).unwrap().value = 5;

        assert!(pool.get(old).is_none());
        assert!(!pool.destroy(old));
        assert_eq!(pool.get(new).unwrap().value, 5);
        assert_eq!(pool.active_object_count(), 1);
    }

    #[test]
    fn test_destroy_out_of_range_and_null() {
        let mut pool = widget_pool(2);
        pool.create().unwrap();

        assert!(!pool.destroy(Handle::null()));
        assert!(!pool.destroy(Handle::new(7, 0)));
        assert_eq!(pool.active_object_count(), 1);
    }

    #[test]
    fn test_get_object_at_bounds() {
        let mut pool = widget_pool(2);
        assert!(pool.get_object_at(1).is_ok());
        assert!(pool.get_object_at_mut(0).is_ok());
        assert_eq!(
            pool.get_object_at(2),
            Err(PoolError::IndexOutOfRange {
                type_name: type_name::<Widget>(),
                index: 2,
                capacity: 2,
            })
        );
    }

    #[test]
    fn test_iter_visits_live_objects() {
        let mut pool = widget_pool(4);
        let a = pool.create().unwrap();
        let b = pool.create().unwrap();
        let c = pool.create().unwrap();
        pool.destroy(b);

        for (_, widget) in pool.iter_mut() {
            widget.value = 1;
        }

        let live: Vec<_> = pool.iter().map(|(handle, _)| handle).collect();
        assert_eq!(live, vec![a, c]);
        assert!(pool.iter().all(|(_, widget)| widget.value == 1));
    }

    #[test]
    fn test_widget_scenario() {
        let mut pool = widget_pool(2);

        let w1 = pool.create().unwrap();
        assert_eq!(pool.active_object_count(), 1);
        let w2 = pool.create().unwrap();
        assert_eq!(pool.active_object_count(), 2);
        assert!(matches!(pool.create(), Err(PoolError::PoolExhausted { .. })));

        let w1_address: *const Widget = pool.get(w1).unwrap();
        pool.get_mut(w1).unwrap().label = "w1".to_string();
        assert!(pool.destroy(w1));
        assert_eq!(pool.active_object_count(), 1);
        assert_eq!(*pool.get_object_at(w1.index() as usize).unwrap(), Widget::default());

        let w3 = pool.create().unwrap();
        assert!(std::ptr::eq(pool.get(w3).unwrap(), w1_address));
        assert_eq!(pool.active_object_count(), 2);
        assert!(pool.is_alive(w2));
    }
}
