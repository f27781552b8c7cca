//! filegen-store: Content-addressed object storage
//!
//! Provides the `ObjectStore` trait consumed by the manager, plus in-memory and
//! on-disk implementations.

pub mod directory;
pub mod error;
pub mod memory;
pub mod traits;

pub use directory::DirectoryObjectStore;
pub use error::StoreError;
pub use memory::MemoryObjectStore;
pub use traits::ObjectStore;
