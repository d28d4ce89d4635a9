//! Engine adapters.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   EditorAdapter trait                        │
//! ├────────────┬─────────────┬─────────┬───────────┬─────────────┤
//! │ Canvas     │ Image       │ Cropper │ 2D scene  │ Raster      │
//! │ objects    │ editor      │ widget  │ engine    │ library     │
//! └────────────┴─────────────┴─────────┴───────────┴─────────────┘
//! ```
//!
//! Every variant shares an [`AdapterSession`] and gets the whole contract
//! from the trait's provided methods. A variant only states how its engine
//! names export formats, the native brightness range, and whatever argument
//! normalization its engine needs.

pub mod canvas_object;
pub mod cropper;
pub mod image_editor;
pub mod raster;
pub mod scene2d;
mod session;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub use canvas_object::CanvasObjectAdapter;
pub use cropper::CropperAdapter;
pub use image_editor::ImageEditorAdapter;
pub use raster::RasterAdapter;
pub use scene2d::Scene2dAdapter;
pub use session::{AdapterSession, SessionLifetime};

use crate::engine::{Container, ObjectHandle, ShapeParams, TextStyle};
use crate::error::{AdapterError, AdapterResult};
use crate::snapshot::{ImageRecord, SnapshotId};

/// The editing engines an adapter can wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterType {
    /// Canvas-object engine (objects on a retained canvas).
    CanvasObject,
    /// Dedicated image-editor widget.
    ImageEditor,
    /// Cropping widget.
    Cropper,
    /// 2D scene-graph engine.
    Scene2d,
    /// Raster-processing library.
    Raster,
}

impl AdapterType {
    /// Every adapter type.
    pub const ALL: [Self; 5] = [
        Self::CanvasObject,
        Self::ImageEditor,
        Self::Cropper,
        Self::Scene2d,
        Self::Raster,
    ];

    /// Stable name used in configuration and UI slot keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CanvasObject => "canvas-object",
            Self::ImageEditor => "image-editor",
            Self::Cropper => "cropper",
            Self::Scene2d => "scene-2d",
            Self::Raster => "raster",
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterType {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| AdapterError::UnknownAdapterType(s.to_string()))
    }
}

/// Structured result of an adapter health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthRecord {
    /// The session is bound to a mount point.
    pub container_attached: bool,
    /// The engine still holds a canvas handle.
    pub canvas_present: bool,
    /// Canvas width (0 when absent).
    pub width: u32,
    /// Canvas height (0 when absent).
    pub height: u32,
}

impl HealthRecord {
    /// Container attached, canvas present, and canvas non-empty.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.container_attached && self.canvas_present && self.width > 0 && self.height > 0
    }
}

/// Encoded image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// MIME type of `bytes`.
    pub mime: String,
    /// Encoded image.
    pub bytes: Vec<u8>,
}

impl Blob {
    /// Encode as a `data:` URI.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{encoded}", self.mime)
    }
}

/// An adapter shared between the view layer and deferred recovery tasks.
pub type SharedAdapter = Arc<Mutex<Box<dyn EditorAdapter>>>;

/// Wrap an adapter for sharing.
#[must_use]
pub fn share(adapter: Box<dyn EditorAdapter>) -> SharedAdapter {
    Arc::new(Mutex::new(adapter))
}

/// Lock a shared adapter, recovering from poisoning.
pub fn lock(adapter: &SharedAdapter) -> MutexGuard<'_, Box<dyn EditorAdapter>> {
    adapter.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rescale a 0-1 quality fraction to the native 0-100 scale.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn native_quality(quality: f64) -> u8 {
    if quality.is_nan() {
        return 100;
    }
    (quality.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Look up a MIME type in a variant's `(mime, native)` format table.
pub(crate) fn lookup_format(
    table: &[(&'static str, &'static str)],
    mime: &str,
) -> Option<&'static str> {
    table
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(mime))
        .map(|(_, native)| *native)
}

/// The uniform capability contract over a wrapped engine.
///
/// Every operation except [`initialize`](Self::initialize),
/// [`destroy`](Self::destroy) and [`health`](Self::health) fails with
/// [`AdapterError::NotInitialized`] before initialization or after
/// destruction.
pub trait EditorAdapter: Send {
    /// Shared session state.
    fn session(&self) -> &AdapterSession;

    /// Mutable shared session state.
    fn session_mut(&mut self) -> &mut AdapterSession;

    /// Native export format for a (lowercase) MIME type, `None` if unsupported.
    fn native_format(&self, mime: &str) -> Option<&'static str>;

    /// The PNG-equivalent `(mime, native)` format used for unsupported MIME types.
    fn fallback_format(&self) -> (&'static str, &'static str);

    /// Multiplier from the [-1, 1] brightness range to the engine's range.
    fn brightness_scale(&self) -> f64 {
        100.0
    }

    /// Adapter type.
    fn adapter_type(&self) -> AdapterType {
        self.session().adapter_type()
    }

    /// Whether the engine is constructed.
    fn is_initialized(&self) -> bool {
        self.session().is_initialized()
    }

    /// Construct the engine bound to `container`.
    ///
    /// # Errors
    ///
    /// `NotLoaded` if the engine is absent, `AlreadyInitialized` if called twice.
    fn initialize(&mut self, container: Container) -> AdapterResult<()> {
        self.session_mut().initialize(container)
    }

    /// Load an image and record the engine's canvas size.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty source, or the engine's fault.
    fn load_image(&mut self, source: &str) -> AdapterResult<ImageRecord> {
        self.session_mut().load_image(source)
    }

    /// Last loaded image.
    fn original_image_data(&self) -> Option<&ImageRecord> {
        self.session().original_image_data()
    }

    /// Export the canvas. MIME types the adapter or its engine cannot
    /// encode fall back to PNG.
    ///
    /// # Errors
    ///
    /// Returns the engine's fault if encoding fails.
    fn to_blob(&self, mime: &str, quality: f64) -> AdapterResult<Blob> {
        let engine = self.session().engine()?;
        let requested = mime.trim().to_ascii_lowercase();
        let supported = self
            .native_format(&requested)
            .filter(|native| engine.supports_format(native));
        let (mime, native) = if let Some(native) = supported {
            (requested, native)
        } else {
            let (fallback_mime, native) = self.fallback_format();
            tracing::debug!(
                "{} cannot export '{requested}', falling back to {fallback_mime}",
                self.adapter_type()
            );
            (fallback_mime.to_string(), native)
        };
        let bytes = engine.export(native, native_quality(quality))?;
        Ok(Blob { mime, bytes })
    }

    /// Export the canvas as a `data:` URI.
    ///
    /// # Errors
    ///
    /// Returns the engine's fault if encoding fails.
    fn to_data_url(&self, mime: &str, quality: f64) -> AdapterResult<String> {
        self.to_blob(mime, quality).map(|blob| blob.to_data_url())
    }

    /// Set brightness from the [-1, 1] range (clamped).
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a non-finite value, or the engine's fault.
    fn set_brightness(&mut self, value: f64) -> AdapterResult<()> {
        let scale = self.brightness_scale();
        let engine = self.session_mut().engine_mut()?;
        if !value.is_finite() {
            return Err(AdapterError::InvalidInput(format!(
                "brightness must be finite, got {value}"
            )));
        }
        Ok(engine.set_brightness(value.clamp(-1.0, 1.0) * scale)?)
    }

    /// Apply a named filter.
    ///
    /// # Errors
    ///
    /// Returns the engine's fault.
    fn apply_filter(&mut self, name: &str) -> AdapterResult<()> {
        Ok(self.session_mut().engine_mut()?.apply_filter(name)?)
    }

    /// Rotate by `degrees`.
    ///
    /// # Errors
    ///
    /// Returns the engine's fault.
    fn rotate(&mut self, degrees: f64) -> AdapterResult<()> {
        Ok(self.session_mut().engine_mut()?.rotate(degrees)?)
    }

    /// Set scale factors.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for non-finite factors, or the engine's fault.
    fn set_scale(&mut self, x: f64, y: f64) -> AdapterResult<()> {
        let engine = self.session_mut().engine_mut()?;
        if !x.is_finite() || !y.is_finite() {
            return Err(AdapterError::InvalidInput(format!(
                "scale must be finite, got ({x}, {y})"
            )));
        }
        Ok(engine.set_scale(x, y)?)
    }

    /// Move the image.
    ///
    /// # Errors
    ///
    /// Returns the engine's fault.
    fn set_position(&mut self, x: f64, y: f64) -> AdapterResult<()> {
        Ok(self.session_mut().engine_mut()?.set_position(x, y)?)
    }

    /// Add a text object.
    ///
    /// # Errors
    ///
    /// Returns the engine's fault.
    fn add_text(&mut self, text: &str, style: &TextStyle) -> AdapterResult<ObjectHandle> {
        Ok(self.session_mut().engine_mut()?.add_text(text, style)?)
    }

    /// Add a shape object.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for non-finite bounds, or the engine's fault.
    fn add_shape(&mut self, shape: &ShapeParams) -> AdapterResult<ObjectHandle> {
        let engine = self.session_mut().engine_mut()?;
        if !shape.is_finite() {
            return Err(AdapterError::InvalidInput(format!(
                "shape bounds must be finite, got {}x{} at ({}, {})",
                shape.width, shape.height, shape.x, shape.y
            )));
        }
        Ok(engine.add_shape(shape)?)
    }

    /// Leave any active drawing mode.
    ///
    /// # Errors
    ///
    /// Returns the engine's fault.
    fn stop_drawing(&mut self) -> AdapterResult<()> {
        Ok(self.session_mut().engine_mut()?.stop_drawing()?)
    }

    /// Snapshot the current image record, returning the snapshot id.
    ///
    /// # Errors
    ///
    /// `NotInitialized` only.
    fn save_state(&mut self) -> AdapterResult<SnapshotId> {
        self.session_mut().save_state()
    }

    /// Reload the engine from a snapshot.
    ///
    /// # Errors
    ///
    /// `StateNotFound` for an unknown id, or the engine's fault.
    fn restore_state(&mut self, id: SnapshotId) -> AdapterResult<()> {
        self.session_mut().restore_state(id).map(|_| ())
    }

    /// Release the engine and clear session state. Safe to call repeatedly.
    fn destroy(&mut self) {
        self.session_mut().destroy();
    }

    /// Probe container and canvas.
    fn health(&self) -> HealthRecord {
        self.session().health()
    }

    /// Internal module names used to recognize this engine's failures.
    fn engine_signatures(&self) -> Vec<String> {
        self.session().engine_signatures()
    }

    /// Liveness token of the current initialize/destroy cycle.
    fn lifetime(&self) -> SessionLifetime {
        self.session().lifetime().clone()
    }
}
