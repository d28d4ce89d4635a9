//! The native surface of a wrapped editing engine, and the registry that
//! tells adapters which engines are present at runtime.
//!
//! Adapters never probe for engines themselves. An [`EngineRegistry`] is
//! injected into the factory; looking up an engine that was never registered
//! is the `NotLoaded` failure.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::adapter::AdapterType;
use crate::error::{AdapterError, AdapterResult, EngineResult};

/// A mount point supplied by the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// View-assigned identifier of the mount point.
    pub id: String,
    /// Available width in pixels.
    pub width: u32,
    /// Available height in pixels.
    pub height: u32,
}

impl Container {
    /// Create a container handle.
    #[must_use]
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
        }
    }
}

/// Canvas dimensions as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CanvasSize {
    /// Create a canvas size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Engine-assigned handle to an object added to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Styling for a text object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Left edge in canvas pixels.
    pub x: f64,
    /// Top edge in canvas pixels.
    pub y: f64,
    /// Font size in pixels.
    pub font_size: f32,
    /// Fill color as hex.
    pub color: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            font_size: 24.0,
            color: "#000000".to_string(),
        }
    }
}

/// Kind of shape to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle.
    Rect,
    /// Ellipse inscribed in the bounds.
    Ellipse,
    /// Line from the top-left to the bottom-right of the bounds.
    Line,
}

/// A shape to add to the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeParams {
    /// Shape kind.
    pub kind: ShapeKind,
    /// Left edge in canvas pixels.
    pub x: f64,
    /// Top edge in canvas pixels.
    pub y: f64,
    /// Bounds width.
    pub width: f64,
    /// Bounds height.
    pub height: f64,
    /// Stroke color as hex.
    pub stroke: String,
    /// Optional fill color as hex.
    pub fill: Option<String>,
}

impl ShapeParams {
    /// Whether the bounds and both far edges are finite numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [
            self.x,
            self.y,
            self.width,
            self.height,
            self.x + self.width,
            self.y + self.height,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// The native API of a wrapped editing engine.
///
/// Values are in the engine's own units: export quality is 0-100 and
/// brightness is whatever range the adapter declares. Adapters do the
/// rescaling.
pub trait Engine: Send {
    /// Load an image, returning the canvas size after any fit-to-container.
    ///
    /// # Errors
    ///
    /// Returns a fault if the source cannot be loaded.
    fn load(&mut self, src: &str) -> EngineResult<CanvasSize>;

    /// Probe the engine's canvas handle. `None` means the handle is gone.
    fn canvas(&self) -> Option<CanvasSize>;

    /// Encode the canvas in a native format at native quality (0-100).
    ///
    /// # Errors
    ///
    /// Returns a fault if encoding fails.
    fn export(&self, format: &str, quality: u8) -> EngineResult<Vec<u8>>;

    /// Whether [`Engine::export`] can encode the native `format`.
    ///
    /// Adapters fall back to PNG for formats the engine refuses here.
    fn supports_format(&self, _format: &str) -> bool {
        true
    }

    /// Set brightness in the engine's native range.
    ///
    /// # Errors
    ///
    /// Returns a fault if the engine rejects the adjustment.
    fn set_brightness(&mut self, level: f64) -> EngineResult<()>;

    /// Apply a named filter.
    ///
    /// # Errors
    ///
    /// Returns a fault for unknown filters or engine failures.
    fn apply_filter(&mut self, name: &str) -> EngineResult<()>;

    /// Rotate by `degrees`.
    ///
    /// # Errors
    ///
    /// Returns a fault if the engine cannot rotate.
    fn rotate(&mut self, degrees: f64) -> EngineResult<()>;

    /// Set the scale factors.
    ///
    /// # Errors
    ///
    /// Returns a fault if the engine cannot scale.
    fn set_scale(&mut self, x: f64, y: f64) -> EngineResult<()>;

    /// Set the image position.
    ///
    /// # Errors
    ///
    /// Returns a fault if the engine cannot move the image.
    fn set_position(&mut self, x: f64, y: f64) -> EngineResult<()>;

    /// Add a text object.
    ///
    /// # Errors
    ///
    /// Returns a fault if the object cannot be created.
    fn add_text(&mut self, text: &str, style: &TextStyle) -> EngineResult<ObjectHandle>;

    /// Add a shape object.
    ///
    /// # Errors
    ///
    /// Returns a fault if the object cannot be created.
    fn add_shape(&mut self, shape: &ShapeParams) -> EngineResult<ObjectHandle>;

    /// Leave any active drawing or interaction mode.
    ///
    /// # Errors
    ///
    /// Returns a fault if the engine is in a broken state.
    fn stop_drawing(&mut self) -> EngineResult<()>;

    /// Release every resource held by the engine.
    fn release(&mut self);
}

/// Builds an engine bound to a container.
pub type EngineConstructor =
    Arc<dyn Fn(&Container) -> EngineResult<Box<dyn Engine>> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    constructor: EngineConstructor,
    modules: Vec<String>,
}

/// Engines available at runtime, keyed by adapter type.
///
/// Cloning shares the same underlying table.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Arc<RwLock<HashMap<AdapterType, Registration>>>,
}

impl EngineRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine for `adapter_type`.
    ///
    /// `modules` are the engine's internal module names. Failures whose
    /// message or stack mention one of them are classified as engine-related.
    pub fn register<F>(&self, adapter_type: AdapterType, modules: &[&str], constructor: F)
    where
        F: Fn(&Container) -> EngineResult<Box<dyn Engine>> + Send + Sync + 'static,
    {
        let registration = Registration {
            constructor: Arc::new(constructor),
            modules: modules.iter().map(|m| (*m).to_string()).collect(),
        };
        self.engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(adapter_type, registration);
        tracing::debug!("Registered engine for {adapter_type}");
    }

    /// Remove the engine for `adapter_type`. Returns true if one was present.
    pub fn unregister(&self, adapter_type: AdapterType) -> bool {
        self.engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&adapter_type)
            .is_some()
    }

    /// Whether an engine is available for `adapter_type`.
    #[must_use]
    pub fn is_loaded(&self, adapter_type: AdapterType) -> bool {
        self.engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&adapter_type)
    }

    /// Internal module names registered for `adapter_type`.
    #[must_use]
    pub fn signatures(&self, adapter_type: AdapterType) -> Vec<String> {
        self.engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&adapter_type)
            .map(|r| r.modules.clone())
            .unwrap_or_default()
    }

    /// Construct an engine bound to `container`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotLoaded`] if no engine is registered, or the
    /// constructor's fault as [`AdapterError::Engine`].
    pub fn construct(
        &self,
        adapter_type: AdapterType,
        container: &Container,
    ) -> AdapterResult<Box<dyn Engine>> {
        // Clone out so the constructor runs without holding the lock.
        let registration = self
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&adapter_type)
            .cloned()
            .ok_or(AdapterError::NotLoaded(adapter_type))?;
        Ok((registration.constructor)(container)?)
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engines = self.engines.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EngineRegistry")
            .field("engines", &engines.keys().collect::<Vec<_>>())
            .finish()
    }
}
