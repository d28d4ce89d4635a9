//! Adapter for the cropping widget.

use crate::adapter::{lookup_format, AdapterSession, AdapterType, EditorAdapter};
use crate::engine::EngineRegistry;
use crate::error::{AdapterError, AdapterResult};

const FORMATS: &[(&str, &str)] = &[
    ("image/png", "image/png"),
    ("image/jpeg", "image/jpeg"),
    ("image/jpg", "image/jpeg"),
    ("image/webp", "image/webp"),
];

/// Cropping widget adapter.
#[derive(Debug)]
pub struct CropperAdapter {
    session: AdapterSession,
}

impl CropperAdapter {
    /// Create an uninitialized adapter.
    #[must_use]
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            session: AdapterSession::new(AdapterType::Cropper, registry),
        }
    }
}

impl EditorAdapter for CropperAdapter {
    fn session(&self) -> &AdapterSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut AdapterSession {
        &mut self.session
    }

    fn native_format(&self, mime: &str) -> Option<&'static str> {
        lookup_format(FORMATS, mime)
    }

    fn fallback_format(&self) -> (&'static str, &'static str) {
        ("image/png", "image/png")
    }

    /// The widget mirrors on negative factors and collapses on zero.
    fn set_scale(&mut self, x: f64, y: f64) -> AdapterResult<()> {
        let engine = self.session_mut().engine_mut()?;
        let degenerate = |v: f64| !v.is_finite() || v.abs() < f64::EPSILON;
        if degenerate(x) || degenerate(y) {
            return Err(AdapterError::InvalidInput(format!(
                "cropper scale must be finite and non-zero, got ({x}, {y})"
            )));
        }
        Ok(engine.set_scale(x, y)?)
    }
}
