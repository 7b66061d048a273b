//! Pooled object memory
//!
//! Fixed-capacity pools hand out objects with stable addresses in O(1), and a
//! cluster of pools gives the rest of the engine one place to allocate every
//! poolable type.
//!
//! ```text
//! PoolCluster
//!     ├── MemoryPool<Node>
//!     ├── MemoryPool<Entity>
//!     └── MemoryPool<Light>
//!               ↓
//!      Handle<T> (index + generation)
//! ```

pub mod handle;
pub mod pool;
pub mod cluster;

pub use handle::Handle;
pub use pool::{MemoryPool, PoolError, PoolStats};
pub use cluster::{ErasedPool, PoolCluster};
