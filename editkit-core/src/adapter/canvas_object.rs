//! Adapter for the canvas-object engine.
//!
//! The engine names export formats without the `image/` prefix.

use crate::adapter::{lookup_format, AdapterSession, AdapterType, EditorAdapter};
use crate::engine::EngineRegistry;

const FORMATS: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpeg"),
    ("image/jpg", "jpeg"),
    ("image/webp", "webp"),
];

/// Canvas-object engine adapter.
#[derive(Debug)]
pub struct CanvasObjectAdapter {
    session: AdapterSession,
}

impl CanvasObjectAdapter {
    /// Create an uninitialized adapter.
    #[must_use]
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            session: AdapterSession::new(AdapterType::CanvasObject, registry),
        }
    }
}

impl EditorAdapter for CanvasObjectAdapter {
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
        ("image/png", "png")
    }
}
