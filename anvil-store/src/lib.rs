//! Anvil Storage Layer
//!
//! Provides users, items, recipes and transactional inventory access.
//!
//! # Architecture
//!
//! - **Repository traits**: Define the storage interface (ports)
//! - **Lock registry**: Sharded per-user inventory locks
//! - **In-memory store**: Staged-write implementation for tests and development
//!
//! # Usage
//!
//! ```rust
//! use anvil_domain::{Inventory, Platform, QualityLevel, User};
//! use anvil_store::{CraftingRepository, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     let user = User::new(Platform::Twitch, "12345", "alice");
//!     store.insert_user(user.clone());
//!
//!     let mut tx = store.begin_transaction().await.unwrap();
//!     let mut inventory = tx.read_inventory_locked(user.id).await.unwrap();
//!     inventory.add(1, 3, QualityLevel::Common);
//!     tx.write_inventory(user.id, &inventory).await.unwrap();
//!     tx.commit().await.unwrap();
//!
//!     assert_eq!(store.inventory(user.id).total_quantity(1), 3);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod lock;
mod memory;
mod repository;

// Re-exports
pub use error::StoreError;
pub use lock::{LockRegistry, UserLockGuard, LOCK_SHARDS};
pub use memory::{FailPoint, MemoryStore, MemoryTx};
pub use repository::{CraftingRepository, InventoryTx};
