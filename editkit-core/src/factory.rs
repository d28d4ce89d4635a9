//! Adapter construction.
//!
//! The factory hands out ready-to-initialize adapters bound to an injected
//! [`EngineRegistry`]. [`AdapterSlots`] keeps one live session per UI slot.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::adapter::{
    lock, share, AdapterType, CanvasObjectAdapter, CropperAdapter, EditorAdapter,
    ImageEditorAdapter, RasterAdapter, Scene2dAdapter, SharedAdapter,
};
use crate::engine::EngineRegistry;
use crate::error::AdapterResult;

/// Builds adapters for a given engine registry.
#[derive(Debug, Clone, Default)]
pub struct AdapterFactory {
    registry: EngineRegistry,
}

impl AdapterFactory {
    /// Create a factory over `registry`.
    #[must_use]
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    /// Registry adapters are bound to.
    #[must_use]
    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Create an uninitialized adapter of `adapter_type`.
    #[must_use]
    pub fn create_adapter(&self, adapter_type: AdapterType) -> Box<dyn EditorAdapter> {
        let registry = self.registry.clone();
        tracing::debug!("Creating {adapter_type} adapter");
        match adapter_type {
            AdapterType::CanvasObject => Box::new(CanvasObjectAdapter::new(registry)),
            AdapterType::ImageEditor => Box::new(ImageEditorAdapter::new(registry)),
            AdapterType::Cropper => Box::new(CropperAdapter::new(registry)),
            AdapterType::Scene2d => Box::new(Scene2dAdapter::new(registry)),
            AdapterType::Raster => Box::new(RasterAdapter::new(registry)),
        }
    }

    /// Create an adapter from its type name (`"raster"`, `"image-editor"`, ...).
    ///
    /// # Errors
    ///
    /// Returns `UnknownAdapterType` for unrecognized names.
    pub fn create_adapter_by_name(&self, name: &str) -> AdapterResult<Box<dyn EditorAdapter>> {
        let adapter_type: AdapterType = name.parse()?;
        Ok(self.create_adapter(adapter_type))
    }

    /// Create an adapter wrapped for sharing with the recovery coordinator.
    #[must_use]
    pub fn create_shared(&self, adapter_type: AdapterType) -> SharedAdapter {
        share(self.create_adapter(adapter_type))
    }
}

/// One adapter session per UI slot.
pub struct AdapterSlots {
    factory: AdapterFactory,
    slots: Mutex<HashMap<String, SharedAdapter>>,
}

impl AdapterSlots {
    /// Create an empty slot table.
    #[must_use]
    pub fn new(factory: AdapterFactory) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The adapter in `slot`, creating one if the slot is empty.
    ///
    /// If the slot holds an adapter of another type, that session is
    /// destroyed and replaced.
    pub fn get_or_create(&self, slot: &str, adapter_type: AdapterType) -> SharedAdapter {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slots.get(slot) {
            if lock(existing).adapter_type() == adapter_type {
                return SharedAdapter::clone(existing);
            }
            tracing::debug!("Slot '{slot}' switching to {adapter_type}");
            lock(existing).destroy();
        }
        let adapter = self.factory.create_shared(adapter_type);
        slots.insert(slot.to_string(), SharedAdapter::clone(&adapter));
        adapter
    }

    /// The adapter in `slot`, if any.
    #[must_use]
    pub fn get(&self, slot: &str) -> Option<SharedAdapter> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slot)
            .cloned()
    }

    /// Destroy and remove the adapter in `slot`. Returns true if one was present.
    pub fn release(&self, slot: &str) -> bool {
        let removed = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(slot);
        match removed {
            Some(adapter) => {
                lock(&adapter).destroy();
                tracing::debug!("Released slot '{slot}'");
                true
            }
            None => false,
        }
    }

    /// Destroy every session.
    pub fn release_all(&self) {
        let drained: Vec<_> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, adapter) in drained {
            lock(&adapter).destroy();
        }
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AdapterSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = slots.keys().collect();
        keys.sort();
        f.debug_struct("AdapterSlots")
            .field("factory", &self.factory)
            .field("slots", &keys)
            .finish()
    }
}
