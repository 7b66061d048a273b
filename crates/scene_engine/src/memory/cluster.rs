//! Type-indexed registry of memory pools
//!
//! A [`PoolCluster`] lets one facility create and destroy objects of many types
//! without call sites knowing which pool backs a type. Pools are stored behind
//! the non-generic [`ErasedPool`] interface and recovered with checked
//! downcasts, so asking for the wrong concrete type is an error rather than
//! undefined behaviour.
//!
//! # Usage
//!
//! ```rust
//! use scene_engine::memory::PoolCluster;
//!
//! #[derive(Default)]
//! struct Particle { age: f32 }
//!
//! # fn main() -> Result<(), scene_engine::memory::PoolError> {
//! let mut cluster = PoolCluster::new();
//! cluster.register_pool::<Particle>(256)?;
//!
//! let particle = cluster.create::<Particle>()?;
//! cluster.get_mut(particle).unwrap().age = 1.5;
//! cluster.destroy(particle);
//! # Ok(())
//! # }
//! ```

use super::{Handle, MemoryPool, PoolError, PoolStats};
use std::any::{type_name, Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

/// Type-erased view of a [`MemoryPool`]
pub trait ErasedPool: Any {
    /// Destroy every live object in the pool
    fn destroy_all(&mut self);

    /// Usage snapshot
    fn stats(&self) -> PoolStats;

    /// Upcast for checked downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for checked downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Default + 'static> ErasedPool for MemoryPool<T> {
    fn destroy_all(&mut self) {
        MemoryPool::destroy_all(self);
    }

    fn stats(&self) -> PoolStats {
        MemoryPool::stats(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct RegisteredPool {
    key_name: &'static str,
    pool: Box<dyn ErasedPool>,
}

/// Registry holding at most one pool per key type
#[derive(Default)]
pub struct PoolCluster {
    pools: HashMap<TypeId, RegisteredPool>,
}

impl PoolCluster {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool of `T` keyed by `T`
    ///
    /// Registering a type that already has a pool is a no-op, even if the
    /// requested capacity differs.
    pub fn register_pool<T: Default + 'static>(&mut self, capacity: usize) -> Result<(), PoolError> {
        self.register_pool_as::<T, T>(capacity)
    }

    /// Register a pool of concrete type `T` under the key `K`
    ///
    /// `K` is typically a trait object or marker type that callers use to
    /// refer to a family of objects, e.g. `register_pool_as::<dyn Light, PointLight>`.
    pub fn register_pool_as<K, T>(&mut self, capacity: usize) -> Result<(), PoolError>
    where
        K: ?Sized + 'static,
        T: Default + 'static,
    {
        match self.pools.entry(TypeId::of::<K>()) {
            Entry::Occupied(_) => {
                log::debug!("Pool for {} already registered, keeping it", type_name::<K>());
                Ok(())
            }
            Entry::Vacant(entry) => {
                let pool = MemoryPool::<T>::new(capacity)?;
                log::info!(
                    "Registered pool for {} holding {} x {} ({} bytes)",
                    type_name::<K>(),
                    capacity,
                    type_name::<T>(),
                    pool.size_in_bytes()
                );
                entry.insert(RegisteredPool {
                    key_name: type_name::<K>(),
                    pool: Box::new(pool),
                });
                Ok(())
            }
        }
    }

    /// Drop the pool registered under `K` together with every object in it
    ///
    /// Returns `false` if no pool was registered.
    pub fn unregister_pool<K: ?Sized + 'static>(&mut self) -> bool {
        match self.pools.remove(&TypeId::of::<K>()) {
            Some(registered) => {
                let stats = registered.pool.stats();
                log::info!(
                    "Unregistered pool for {} ({} live objects released)",
                    registered.key_name,
                    stats.active
                );
                true
            }
            None => false,
        }
    }

    /// Check whether a pool is registered under `K`
    pub fn has_pool<K: ?Sized + 'static>(&self) -> bool {
        self.pools.contains_key(&TypeId::of::<K>())
    }

    /// Number of registered pools
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Typed access to the pool of `T`
    pub fn pool<T: 'static>(&self) -> Option<&MemoryPool<T>> {
        self.pool_as::<T, T>().ok()
    }

    /// Typed mutable access to the pool of `T`
    pub fn pool_mut<T: 'static>(&mut self) -> Option<&mut MemoryPool<T>> {
        self.pool_mut_as::<T, T>().ok()
    }

    /// Typed access to the pool of `T` registered under `K`
    pub fn pool_as<K: ?Sized + 'static, T: 'static>(&self) -> Result<&MemoryPool<T>, PoolError> {
        let registered = self
            .pools
            .get(&TypeId::of::<K>())
            .ok_or(PoolError::PoolNotFound { type_name: type_name::<K>() })?;

        registered
            .pool
            .as_any()
            .downcast_ref::<MemoryPool<T>>()
            .ok_or(PoolError::TypeMismatch {
                key: registered.key_name,
                requested: type_name::<T>(),
            })
    }

    /// Typed mutable access to the pool of `T` registered under `K`
    pub fn pool_mut_as<K: ?Sized + 'static, T: 'static>(&mut self) -> Result<&mut MemoryPool<T>, PoolError> {
        let registered = self
            .pools
            .get_mut(&TypeId::of::<K>())
            .ok_or(PoolError::PoolNotFound { type_name: type_name::<K>() })?;

        let key = registered.key_name;
        registered
            .pool
            .as_any_mut()
            .downcast_mut::<MemoryPool<T>>()
            .ok_or(PoolError::TypeMismatch {
                key,
                requested: type_name::<T>(),
            })
    }

    /// Create an object from the pool of `T`
    pub fn create<T: Default + 'static>(&mut self) -> Result<Handle<T>, PoolError> {
        self.create_as::<T, T>()
    }

    /// Create an object from the pool of `T` registered under `K`
    pub fn create_as<K: ?Sized + 'static, T: Default + 'static>(&mut self) -> Result<Handle<T>, PoolError> {
        self.pool_mut_as::<K, T>()?.create()
    }

    /// Return an object to the pool of `T`
    ///
    /// A missing pool is logged and ignored so teardown code may run after the
    /// pool has been unregistered.
    pub fn destroy<T: Default + 'static>(&mut self, handle: Handle<T>) -> bool {
        self.destroy_as::<T, T>(handle)
    }

    /// Return an object to the pool of `T` registered under `K`
    pub fn destroy_as<K: ?Sized + 'static, T: Default + 'static>(&mut self, handle: Handle<T>) -> bool {
        match self.pool_mut_as::<K, T>() {
            Ok(pool) => pool.destroy(handle),
            Err(err) => {
                log::warn!("Ignoring destroy of {:?}: {}", handle, err);
                false
            }
        }
    }

    /// Get a live object of `T`
    pub fn get<T: 'static>(&self, handle: Handle<T>) -> Option<&T> {
        self.pool::<T>()?.get(handle)
    }

    /// Get a live object of `T` mutably
    pub fn get_mut<T: 'static>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.pool_mut::<T>()?.get_mut(handle)
    }

    /// Get a live object of `T` from the pool registered under `K`
    pub fn get_as<K: ?Sized + 'static, T: 'static>(&self, handle: Handle<T>) -> Option<&T> {
        self.pool_as::<K, T>().ok()?.get(handle)
    }

    /// Get a live object of `T` mutably from the pool registered under `K`
    pub fn get_mut_as<K: ?Sized + 'static, T: 'static>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.pool_mut_as::<K, T>().ok()?.get_mut(handle)
    }

    /// Check whether a handle still refers to a live object
    pub fn is_alive<T: 'static>(&self, handle: Handle<T>) -> bool {
        self.pool::<T>().is_some_and(|pool| pool.is_alive(handle))
    }

    /// Check whether a handle into the pool registered under `K` is live
    pub fn is_alive_as<K: ?Sized + 'static, T: 'static>(&self, handle: Handle<T>) -> bool {
        self.pool_as::<K, T>().is_ok_and(|pool| pool.is_alive(handle))
    }

    /// Destroy every live object in every pool
    pub fn reset_all_pools(&mut self) {
        for registered in self.pools.values_mut() {
            registered.pool.destroy_all();
        }
        log::debug!("Reset {} pools", self.pools.len());
    }

    /// Usage snapshot of every pool, sorted by type name
    pub fn stats(&self) -> Vec<PoolStats> {
        let mut stats: Vec<_> = self.pools.values().map(|registered| registered.pool.stats()).collect();
        stats.sort_by_key(|stats| stats.type_name);
        stats
    }

    /// Live objects across all pools
    pub fn total_active_objects(&self) -> usize {
        self.pools.values().map(|registered| registered.pool.stats().active).sum()
    }
}

impl fmt::Debug for PoolCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolCluster")
            .field("pools", &self.stats())
            .finish()
    }
}
