//! Adapter for the raster-processing library.
//!
//! Raster rotation works on whole pixel grids, so only right angles are
//! accepted.

use crate::adapter::{lookup_format, AdapterSession, AdapterType, EditorAdapter};
use crate::engine::EngineRegistry;
use crate::error::{AdapterError, AdapterResult};

const FORMATS: &[(&str, &str)] = &[
    ("image/png", "image/png"),
    ("image/jpeg", "image/jpeg"),
    ("image/jpg", "image/jpeg"),
    ("image/bmp", "image/bmp"),
];

/// Raster library adapter.
#[derive(Debug)]
pub struct RasterAdapter {
    session: AdapterSession,
}

impl RasterAdapter {
    /// Create an uninitialized adapter.
    #[must_use]
    pub fn new(registry: EngineRegistry) -> Self {
        Self {
            session: AdapterSession::new(AdapterType::Raster, registry),
        }
    }
}

impl EditorAdapter for RasterAdapter {
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

    fn rotate(&mut self, degrees: f64) -> AdapterResult<()> {
        let engine = self.session_mut().engine_mut()?;
        if !degrees.is_finite() || (degrees % 90.0).abs() > f64::EPSILON {
            return Err(AdapterError::InvalidInput(format!(
                "raster rotation must be a multiple of 90 degrees, got {degrees}"
            )));
        }
        Ok(engine.rotate(degrees.rem_euclid(360.0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Container;
    use crate::testing::{recording_registry, EngineCall};

    fn adapter() -> (RasterAdapter, crate::testing::EngineControl) {
        let (registry, control) = recording_registry(AdapterType::Raster);
        let mut adapter = RasterAdapter::new(registry);
        adapter
            .initialize(Container::new("raster", 800, 600))
            .expect("init");
        (adapter, control)
    }

    #[test]
    fn test_right_angles_only() {
        let (mut adapter, control) = adapter();
        adapter.rotate(-90.0).expect("right angle");
        assert_eq!(control.last_call(), Some(EngineCall::Rotate(270.0)));

        assert!(matches!(
            adapter.rotate(45.0),
            Err(AdapterError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_brightness_scaled_to_percent() {
        let (mut adapter, control) = adapter();
        adapter.set_brightness(-0.5).expect("brightness");
        assert_eq!(control.last_call(), Some(EngineCall::Brightness(-50.0)));
    }
}
