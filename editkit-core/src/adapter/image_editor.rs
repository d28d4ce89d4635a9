//! Adapter for the dedicated image-editor widget.

use crate::adapter::{lookup_format, AdapterSession, AdapterType, EditorAdapter};
use crate::engine::EngineRegistry;
use crate::error::AdapterResult;

const FORMATS: &[(&str, &str)] = &[
    ("image/png", "image/png"),
    ("image/jpeg", "image/jpeg"),
    ("image/jpg", "image/jpeg"),
];

/// Image-editor widget adapter.
#[derive(Debug)]
pub struct ImageEditorAdapter {
    session: AdapterSession,
}

impl ImageEditorAdapter {
    /// Create an uninitialized adapter.
    #[must_use]
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            session: AdapterSession::new(AdapterType::ImageEditor, registry),
        }
    }
}

impl EditorAdapter for ImageEditorAdapter {
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

    /// The widget accumulates angles, so keep them inside one turn.
    fn rotate(&mut self, degrees: f64) -> AdapterResult<()> {
        let engine = self.session_mut().engine_mut()?;
        Ok(engine.rotate(degrees % 360.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Container;
    use crate::testing::{recording_registry, EngineCall};

    #[test]
    fn test_rotation_is_normalized() {
        let (registry, control) = recording_registry(AdapterType::ImageEditor);
        let mut adapter = ImageEditorAdapter::new(registry);
        adapter
            .initialize(Container::new("e", 640, 480))
            .expect("init");

        adapter.rotate(450.0).expect("rotate");
        assert_eq!(control.last_call(), Some(EngineCall::Rotate(90.0)));

        adapter.rotate(-450.0).expect("rotate");
        assert_eq!(control.last_call(), Some(EngineCall::Rotate(-90.0)));
    }

    #[test]
    fn test_webp_is_not_native() {
        let (registry, control) = recording_registry(AdapterType::ImageEditor);
        let mut adapter = ImageEditorAdapter::new(registry);
        adapter
            .initialize(Container::new("e", 640, 480))
            .expect("init");

        let blob = adapter.to_blob("image/webp", 1.0).expect("export");
        assert_eq!(blob.mime, "image/png");
        assert_eq!(
            control.last_call(),
            Some(EngineCall::Export {
                format: "image/png".to_string(),
                quality: 100
            })
        );
    }
}
