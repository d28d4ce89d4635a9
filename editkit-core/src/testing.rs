//! Recording mock engine for tests.
//!
//! [`RecordingEngine`] logs every native call and lets a test inject faults
//! or drop the canvas handle through a shared [`EngineControl`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::adapter::AdapterType;
use crate::engine::{
    CanvasSize, Container, Engine, EngineRegistry, ObjectHandle, ShapeKind, ShapeParams, TextStyle,
};
use crate::error::{EngineFault, EngineResult};

/// Module name reported for the recording engine.
pub const RECORDING_MODULE: &str = "recording-engine";

/// A native call observed by the mock engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    /// `load(src)`.
    Load(String),
    /// `export(format, quality)`.
    Export {
        /// Native format name.
        format: String,
        /// Native quality.
        quality: u8,
    },
    /// `set_brightness(level)`.
    Brightness(f64),
    /// `apply_filter(name)`.
    Filter(String),
    /// `rotate(degrees)`.
    Rotate(f64),
    /// `set_scale(x, y)`.
    Scale(f64, f64),
    /// `set_position(x, y)`.
    Position(f64, f64),
    /// `add_text(text, _)`.
    AddText(String),
    /// `add_shape(shape)`.
    AddShape(ShapeKind),
    /// `stop_drawing()`.
    StopDrawing,
}

#[derive(Debug)]
struct EngineState {
    calls: Vec<EngineCall>,
    canvas: Option<CanvasSize>,
    load_size: CanvasSize,
    next_fault: Option<EngineFault>,
    persistent_fault: Option<EngineFault>,
    stop_drawing_fault: Option<EngineFault>,
    refused_formats: Vec<String>,
    next_handle: u64,
    constructed: usize,
    released: usize,
}

/// Shared handle for inspecting and steering [`RecordingEngine`]s.
#[derive(Debug, Clone)]
pub struct EngineControl {
    state: Arc<Mutex<EngineState>>,
}

impl Default for EngineControl {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineControl {
    /// Create a control with a 640x480 load size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                calls: Vec::new(),
                canvas: None,
                load_size: CanvasSize::new(640, 480),
                next_fault: None,
                persistent_fault: None,
                stop_drawing_fault: None,
                refused_formats: Vec::new(),
                next_handle: 1,
                constructed: 0,
                released: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every recorded call, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Most recent call.
    #[must_use]
    pub fn last_call(&self) -> Option<EngineCall> {
        self.lock().calls.last().cloned()
    }

    /// Number of times `stop_drawing` was called.
    #[must_use]
    pub fn stop_drawing_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| **c == EngineCall::StopDrawing)
            .count()
    }

    /// Number of engines constructed from this control.
    #[must_use]
    pub fn construct_count(&self) -> usize {
        self.lock().constructed
    }

    /// Number of `release` calls.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.lock().released
    }

    /// Canvas size the engine reports after `load`.
    pub fn set_load_size(&self, width: u32, height: u32) {
        self.lock().load_size = CanvasSize::new(width, height);
    }

    /// Report the native `format` as unsupported from now on.
    pub fn refuse_format(&self, format: &str) {
        self.lock().refused_formats.push(format.to_string());
    }

    /// Make the canvas handle disappear.
    pub fn drop_canvas(&self) {
        self.lock().canvas = None;
    }

    /// Fail the next operation with `fault`.
    pub fn fail_next(&self, fault: EngineFault) {
        self.lock().next_fault = Some(fault);
    }

    /// Fail every operation with `fault` until [`clear_faults`](Self::clear_faults).
    pub fn fail_always(&self, fault: EngineFault) {
        self.lock().persistent_fault = Some(fault);
    }

    /// Make `stop_drawing` fail with `fault`.
    pub fn fail_stop_drawing(&self, fault: EngineFault) {
        self.lock().stop_drawing_fault = Some(fault);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.next_fault = None;
        state.persistent_fault = None;
        state.stop_drawing_fault = None;
    }
}

/// Mock engine recording native calls into an [`EngineControl`].
#[derive(Debug)]
pub struct RecordingEngine {
    control: EngineControl,
}

impl RecordingEngine {
    /// Create an engine with its own control.
    #[must_use]
    pub fn detached() -> (Self, EngineControl) {
        let control = EngineControl::new();
        let engine = Self::with_control(control.clone(), &Container::new("test", 640, 480));
        (engine, control)
    }

    /// Create an engine bound to `container`, reporting to `control`.
    #[must_use]
    pub fn with_control(control: EngineControl, container: &Container) -> Self {
        {
            let mut state = control.lock();
            state.constructed += 1;
            state.canvas = Some(CanvasSize::new(container.width, container.height));
        }
        Self { control }
    }

    fn record(&self, call: EngineCall) -> EngineResult<()> {
        let mut state = self.control.lock();
        state.calls.push(call);
        if let Some(fault) = state.next_fault.take() {
            return Err(fault);
        }
        match &state.persistent_fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn next_handle(&self) -> ObjectHandle {
        let mut state = self.control.lock();
        let handle = ObjectHandle(state.next_handle);
        state.next_handle += 1;
        handle
    }
}

impl Engine for RecordingEngine {
    fn load(&mut self, src: &str) -> EngineResult<CanvasSize> {
        self.record(EngineCall::Load(src.to_string()))?;
        let mut state = self.control.lock();
        state.canvas = Some(state.load_size);
        Ok(state.load_size)
    }

    fn canvas(&self) -> Option<CanvasSize> {
        self.control.lock().canvas
    }

    fn export(&self, format: &str, quality: u8) -> EngineResult<Vec<u8>> {
        self.record(EngineCall::Export {
            format: format.to_string(),
            quality,
        })?;
        Ok(format!("{format}:{quality}").into_bytes())
    }

    fn supports_format(&self, format: &str) -> bool {
        !self.control.lock().refused_formats.iter().any(|f| f == format)
    }

    fn set_brightness(&mut self, level: f64) -> EngineResult<()> {
        self.record(EngineCall::Brightness(level))
    }

    fn apply_filter(&mut self, name: &str) -> EngineResult<()> {
        self.record(EngineCall::Filter(name.to_string()))
    }

    fn rotate(&mut self, degrees: f64) -> EngineResult<()> {
        self.record(EngineCall::Rotate(degrees))
    }

    fn set_scale(&mut self, x: f64, y: f64) -> EngineResult<()> {
        self.record(EngineCall::Scale(x, y))
    }

    fn set_position(&mut self, x: f64, y: f64) -> EngineResult<()> {
        self.record(EngineCall::Position(x, y))
    }

    fn add_text(&mut self, text: &str, _style: &TextStyle) -> EngineResult<ObjectHandle> {
        self.record(EngineCall::AddText(text.to_string()))?;
        Ok(self.next_handle())
    }

    fn add_shape(&mut self, shape: &ShapeParams) -> EngineResult<ObjectHandle> {
        self.record(EngineCall::AddShape(shape.kind))?;
        Ok(self.next_handle())
    }

    fn stop_drawing(&mut self) -> EngineResult<()> {
        let mut state = self.control.lock();
        state.calls.push(EngineCall::StopDrawing);
        match state.stop_drawing_fault.clone() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        let mut state = self.control.lock();
        state.released += 1;
        state.canvas = None;
    }
}

/// A registry with a recording engine registered for `adapter_type`.
///
/// Each `initialize` constructs a fresh engine sharing the returned control.
#[must_use]
pub fn recording_registry(adapter_type: AdapterType) -> (EngineRegistry, EngineControl) {
    let registry = EngineRegistry::new();
    let control = EngineControl::new();
    let shared = control.clone();
    registry.register(adapter_type, &[RECORDING_MODULE], move |container| {
        let engine = RecordingEngine::with_control(shared.clone(), container);
        Ok(Box::new(engine) as Box<dyn Engine>)
    });
    (registry, control)
}
