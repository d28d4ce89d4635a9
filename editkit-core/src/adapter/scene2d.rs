//! Adapter for the 2D scene-graph engine.
//!
//! The engine's brighten filter takes [-1, 1] directly.

use crate::adapter::{lookup_format, AdapterSession, AdapterType, EditorAdapter};
use crate::engine::EngineRegistry;

const FORMATS: &[(&str, &str)] = &[
    ("image/png", "image/png"),
    ("image/jpeg", "image/jpeg"),
    ("image/jpg", "image/jpeg"),
];

/// 2D scene-graph engine adapter.
#[derive(Debug)]
pub struct Scene2dAdapter {
    session: AdapterSession,
}

impl Scene2dAdapter {
    /// Create an uninitialized adapter.
    #[must_use]
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            session: AdapterSession::new(AdapterType::Scene2d, registry),
        }
    }
}

impl EditorAdapter for Scene2dAdapter {
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

    fn brightness_scale(&self) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Container;
    use crate::testing::{recording_registry, EngineCall};

    #[test]
    fn test_brightness_passes_through_unscaled() {
        let (registry, control) = recording_registry(AdapterType::Scene2d);
        let mut adapter = Scene2dAdapter::new(registry);
        adapter
            .initialize(Container::new("stage", 800, 600))
            .expect("init");

        adapter.set_brightness(0.25).expect("brightness");
        assert_eq!(control.last_call(), Some(EngineCall::Brightness(0.25)));

        adapter.set_brightness(3.0).expect("clamped");
        assert_eq!(control.last_call(), Some(EngineCall::Brightness(1.0)));
    }
}
