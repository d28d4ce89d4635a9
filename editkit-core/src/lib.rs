//! # Editkit Core
//!
//! One capability contract over several stateful image-editing engines,
//! with per-session state history and bounded recovery from engine failures.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    editkit-core                     │
//! ├──────────────────────────┬──────────────────────────┤
//! │  Adapter Factory         │  Recovery Coordinator    │
//! │  - engine registry       │  - failure classifier    │
//! │  - per-slot sessions     │  - rate limit / retries  │
//! ├──────────────────────────┤  - safe-operation wrap   │
//! │  Engine Adapters (x5)    ├──────────────────────────┤
//! │  - uniform contract      │  Update Scheduler        │
//! │  - snapshot history      │  - trailing debounce     │
//! │  - health probe          │  - dimension gate        │
//! └──────────────────────────┴──────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod recovery;
pub mod scheduler;
pub mod snapshot;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{AdapterSession, AdapterType, Blob, EditorAdapter, HealthRecord, SharedAdapter};
pub use config::{MissingCanvasPolicy, RecoveryConfig, SchedulerConfig};
pub use engine::{
    CanvasSize, Container, Engine, EngineRegistry, ObjectHandle, ShapeKind, ShapeParams, TextStyle,
};
pub use error::{AdapterError, AdapterResult, EngineFault, EngineResult};
pub use factory::{AdapterFactory, AdapterSlots};
pub use recovery::{
    FailureKind, RecoveryContext, RecoveryCoordinator, RecoveryOutcome, RecoveryPhase,
    RefusalReason,
};
pub use scheduler::{Dimensions, ResizeScheduler, SchedulerStats, UpdateScheduler};
pub use snapshot::{ImageRecord, Snapshot, SnapshotId, SnapshotStore, SourceType};

/// Editkit core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
