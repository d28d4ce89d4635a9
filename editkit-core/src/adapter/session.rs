//! Per-editor session state shared by every adapter variant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::{Container, Engine, EngineRegistry};
use crate::error::{AdapterError, AdapterResult};
use crate::snapshot::{ImageRecord, Snapshot, SnapshotId, SnapshotStore};

use super::{AdapterType, HealthRecord};

/// Liveness token for one initialize/destroy cycle of a session.
///
/// Deferred work holds a clone and checks [`SessionLifetime::is_alive`]
/// before touching the session. Destroying the session cancels the token;
/// re-initializing issues a fresh one.
#[derive(Debug, Clone)]
pub struct SessionLifetime(Arc<AtomicBool>);

impl SessionLifetime {
    /// Create a live token.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Create a token that is already cancelled.
    #[must_use]
    pub fn cancelled() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Whether the session this token belongs to is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark the session as gone.
    pub fn cancel(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for SessionLifetime {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by one mounted editor instance.
pub struct AdapterSession {
    adapter_type: AdapterType,
    registry: EngineRegistry,
    engine: Option<Box<dyn Engine>>,
    container: Option<Container>,
    original_image_data: Option<ImageRecord>,
    state_history: SnapshotStore,
    lifetime: SessionLifetime,
}

impl AdapterSession {
    /// Create an uninitialized session that will build its engine from `registry`.
    #[must_use]
    pub fn new(adapter_type: AdapterType, registry: EngineRegistry) -> Self {
        Self {
            adapter_type,
            registry,
            engine: None,
            container: None,
            original_image_data: None,
            state_history: SnapshotStore::new(),
            lifetime: SessionLifetime::cancelled(),
        }
    }

    /// Adapter type this session wraps.
    #[must_use]
    pub fn adapter_type(&self) -> AdapterType {
        self.adapter_type
    }

    /// Whether the engine is constructed and usable.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Mount point the engine is bound to.
    #[must_use]
    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    /// Last image loaded into the engine.
    #[must_use]
    pub fn original_image_data(&self) -> Option<&ImageRecord> {
        self.original_image_data.as_ref()
    }

    /// Snapshot history.
    #[must_use]
    pub fn state_history(&self) -> &SnapshotStore {
        &self.state_history
    }

    /// Liveness token of the current initialize/destroy cycle.
    #[must_use]
    pub fn lifetime(&self) -> &SessionLifetime {
        &self.lifetime
    }

    /// Internal module names of the wrapped engine.
    #[must_use]
    pub fn engine_signatures(&self) -> Vec<String> {
        self.registry.signatures(self.adapter_type)
    }

    /// Borrow the engine.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotInitialized`] before init or after destroy.
    pub fn engine(&self) -> AdapterResult<&dyn Engine> {
        self.engine.as_deref().ok_or(AdapterError::NotInitialized)
    }

    /// Mutably borrow the engine.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotInitialized`] before init or after destroy.
    pub fn engine_mut(&mut self) -> AdapterResult<&mut dyn Engine> {
        match self.engine.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(AdapterError::NotInitialized),
        }
    }

    /// Construct the engine bound to `container`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::AlreadyInitialized`] on a live session (state
    /// untouched), or [`AdapterError::NotLoaded`] if the engine is absent.
    pub fn initialize(&mut self, container: Container) -> AdapterResult<()> {
        if self.engine.is_some() {
            return Err(AdapterError::AlreadyInitialized);
        }
        let engine = self.registry.construct(self.adapter_type, &container)?;
        tracing::debug!(
            "Initialized {} engine in container '{}' ({}x{})",
            self.adapter_type,
            container.id,
            container.width,
            container.height
        );
        self.engine = Some(engine);
        self.container = Some(container);
        self.lifetime = SessionLifetime::new();
        Ok(())
    }

    /// Load `source` and record the engine-reported canvas size.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotInitialized`], [`AdapterError::InvalidInput`]
    /// for an empty source, or the engine's fault.
    pub fn load_image(&mut self, source: &str) -> AdapterResult<ImageRecord> {
        let engine = self.engine_mut()?;
        if source.trim().is_empty() {
            return Err(AdapterError::InvalidInput(
                "image source is empty".to_string(),
            ));
        }
        let loaded = engine.load(source)?;
        // Engines may fit the image to the container after load.
        let size = engine.canvas().unwrap_or(loaded);
        let record = ImageRecord::new(source, size.width, size.height);
        tracing::debug!(
            "Loaded {:?} source into {} ({}x{})",
            record.source_type,
            self.adapter_type,
            record.width,
            record.height
        );
        self.original_image_data = Some(record.clone());
        Ok(record)
    }

    /// Capture the current image record into the history.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotInitialized`] before init or after destroy.
    pub fn save_state(&mut self) -> AdapterResult<SnapshotId> {
        self.engine()?;
        Ok(self
            .state_history
            .capture(self.original_image_data.as_ref()))
    }

    /// Reload the engine from a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::StateNotFound`] for an unknown id,
    /// [`AdapterError::InvalidInput`] for a snapshot taken before any image
    /// was loaded, or the engine's fault.
    pub fn restore_state(&mut self, id: SnapshotId) -> AdapterResult<std::sync::Arc<Snapshot>> {
        self.engine()?;
        let snapshot = self
            .state_history
            .get(id)
            .ok_or(AdapterError::StateNotFound(id))?;
        if snapshot.src.is_empty() {
            return Err(AdapterError::InvalidInput(format!(
                "snapshot {id} has no image to restore"
            )));
        }
        self.load_image(&snapshot.src)?;
        tracing::debug!("Restored {} to snapshot {id}", self.adapter_type);
        Ok(snapshot)
    }

    /// Probe container and canvas.
    #[must_use]
    pub fn health(&self) -> HealthRecord {
        let canvas = self.engine.as_ref().and_then(|e| e.canvas());
        HealthRecord {
            container_attached: self.container.is_some(),
            canvas_present: canvas.is_some(),
            width: canvas.map_or(0, |c| c.width),
            height: canvas.map_or(0, |c| c.height),
        }
    }

    /// Release the engine and clear all session state.
    ///
    /// Calling this on a session that is not initialized does nothing.
    pub fn destroy(&mut self) {
        // Taking the engine first makes any nested or repeated call a no-op.
        let Some(mut engine) = self.engine.take() else {
            tracing::trace!("Destroy on inactive {} session ignored", self.adapter_type);
            return;
        };
        self.lifetime.cancel();
        engine.release();
        self.original_image_data = None;
        self.state_history.clear();
        self.container = None;
        tracing::debug!("Destroyed {} session", self.adapter_type);
    }
}

impl std::fmt::Debug for AdapterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSession")
            .field("adapter_type", &self.adapter_type)
            .field("is_initialized", &self.is_initialized())
            .field("container", &self.container)
            .field("original_image_data", &self.original_image_data)
            .field("snapshots", &self.state_history.len())
            .finish_non_exhaustive()
    }
}

impl Drop for AdapterSession {
    fn drop(&mut self) {
        self.destroy();
    }
}
