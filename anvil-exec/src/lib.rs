//! Anvil Execution Layer
//!
//! Transactional combine and decompose operations with post-commit events.
//!
//! # Architecture
//!
//! ```text
//! Request → Resolver → Chance → [Tx: lock → plan → consume → roll → write → commit] → Emitter → Publisher → Bus
//!                                                                                              └─ DeadLetter
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for modifiers, naming, levels, publishing and observation
//! - **Resolver**: Input validation, name resolution and recipe gating
//! - **Service**: Orchestrates the engine against a locked inventory
//! - **Emitter**: Detached, drainable event delivery
//! - **Publisher**: Retry with exponential backoff, then dead letter
//! - **Stub**: Test implementations for development
//!
//! # Example
//!
//! ```rust,ignore
//! use anvil_exec::{CraftingConfig, CraftingService};
//! use anvil_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let service = CraftingService::new(store, CraftingConfig::default());
//!
//! let identity = UserIdentity::new("twitch", "12345", "alice");
//! let outcome = service.combine(&identity, "iron_ingot", 3).await?;
//! ```

#![warn(clippy::all)]

pub mod bus;
pub mod chance;
pub mod config;
pub mod emitter;
pub mod error;
pub mod ports;
pub mod publisher;
pub mod resolver;
pub mod service;
pub mod stub;

// Re-exports for convenience
pub use bus::{BroadcastBus, EventBus, EventReceiver};
pub use chance::{resolve_chance, ChanceSource, ResolvedChance};
pub use config::{CraftingConfig, DEFAULT_MODIFIER_KEY};
pub use emitter::EventEmitter;
pub use error::{
    CraftError, CraftResult, ErrorPhase, LockReason, PortError, PublishError, ShutdownError,
};
pub use ports::{
    EventPublisher, LevelProvider, ModifierProvider, NamingResolver, Operation, OperationObserver,
};
pub use publisher::{
    DeadLetterRecord, DeadLetterSink, JsonlDeadLetterFile, MemoryDeadLetter, ResilientPublisher,
    RetryPolicy,
};
pub use resolver::{CombineRequest, DecomposeRequest, RecipeResolver, DEFAULT_JOB_KEY};
pub use service::{CraftingService, TxPhase};
pub use stub::{
    FailingModifier, FixedModifier, RecordingObserver, RecordingPublisher, StubLevels, StubNaming,
};
