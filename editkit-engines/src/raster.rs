//! Raster engine backed by the `image` crate.
//!
//! Adjustments are kept as parameters and applied on export, so setting
//! brightness twice replaces the first value rather than compounding it.
//!
//! ```text
//! loaded image -> filters -> brightness -> rotation -> scale -> shapes
//! ```
//!
//! Text objects are tracked and get handles but are not rasterized.

use std::fmt::Display;

use editkit_core::{
    AdapterType, CanvasSize, Container, Engine, EngineFault, EngineRegistry, EngineResult,
    ObjectHandle, ShapeKind, ShapeParams, TextStyle,
};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::image::{encode, fit_within, load_source, parse_hex_color, RasterFormat};

/// Module name reported in this engine's fault stacks.
pub const RASTER_MODULE: &str = "raster-engine";

/// Filters understood by [`RasterEngine::apply_filter`].
pub const FILTERS: [&str; 5] = ["none", "grayscale", "invert", "blur", "sharpen"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Grayscale,
    Invert,
    Blur,
    Sharpen,
}

impl Filter {
    fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Grayscale => DynamicImage::ImageRgba8(img.grayscale().to_rgba8()),
            Self::Invert => {
                let mut img = img;
                img.invert();
                img
            }
            Self::Blur => img.blur(2.0),
            Self::Sharpen => img.unsharpen(1.0, 5),
        }
    }
}

/// An object added on top of the image.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasObject {
    /// A text label.
    Text {
        /// Engine handle.
        handle: ObjectHandle,
        /// Label content.
        text: String,
        /// Placement and color.
        style: TextStyle,
    },
    /// A shape drawn onto exports.
    Shape {
        /// Engine handle.
        handle: ObjectHandle,
        /// Geometry and colors.
        params: ShapeParams,
    },
}

impl CanvasObject {
    /// Handle assigned when the object was added.
    #[must_use]
    pub fn handle(&self) -> ObjectHandle {
        match self {
            Self::Text { handle, .. } | Self::Shape { handle, .. } => *handle,
        }
    }
}

/// Image-crate engine bound to one container.
#[derive(Debug)]
pub struct RasterEngine {
    container: Container,
    brightness_range: f64,
    image: Option<DynamicImage>,
    released: bool,
    brightness: f64,
    filters: Vec<Filter>,
    quarter_turns: u8,
    scale: (f64, f64),
    position: (f64, f64),
    objects: Vec<CanvasObject>,
    next_handle: u64,
}

fn fault(op: &str, message: impl Display) -> EngineFault {
    EngineFault::new(message.to_string()).with_stack(format!("at {RASTER_MODULE}::{op}"))
}

impl RasterEngine {
    /// Create an engine with a blank canvas the size of `container`.
    ///
    /// Brightness is expected in -100..=100.
    #[must_use]
    pub fn new(container: Container) -> Self {
        Self {
            container,
            brightness_range: 100.0,
            image: None,
            released: false,
            brightness: 0.0,
            filters: Vec::new(),
            quarter_turns: 0,
            scale: (1.0, 1.0),
            position: (0.0, 0.0),
            objects: Vec::new(),
            next_handle: 1,
        }
    }

    /// Accept brightness in `-range..=range` instead of -100..=100.
    #[must_use]
    pub fn with_brightness_range(mut self, range: f64) -> Self {
        self.brightness_range = range;
        self
    }

    /// Objects added since the last load.
    #[must_use]
    pub fn objects(&self) -> &[CanvasObject] {
        &self.objects
    }

    /// Current image offset within the container.
    #[must_use]
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    fn loaded(&self, op: &str) -> EngineResult<&DynamicImage> {
        if self.released {
            return Err(fault(op, "Cannot read properties of null (engine released)"));
        }
        self.image.as_ref().ok_or_else(|| fault(op, "image is null"))
    }

    fn reset_adjustments(&mut self) {
        self.brightness = 0.0;
        self.filters.clear();
        self.quarter_turns = 0;
        self.scale = (1.0, 1.0);
        self.position = (0.0, 0.0);
        self.objects.clear();
    }

    fn issue_handle(&mut self) -> ObjectHandle {
        let handle = ObjectHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Size after scaling an already rotated image.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn scaled_size(&self, width: u32, height: u32) -> CanvasSize {
        let scaled = |v: u32, factor: f64| ((f64::from(v) * factor.abs()).round() as u32).max(1);
        CanvasSize::new(scaled(width, self.scale.0), scaled(height, self.scale.1))
    }

    /// Size after rotation and scaling.
    fn transformed_size(&self, width: u32, height: u32) -> CanvasSize {
        if self.quarter_turns % 2 == 1 {
            self.scaled_size(height, width)
        } else {
            self.scaled_size(width, height)
        }
    }

    /// Apply every adjustment to a copy of the loaded image.
    #[allow(clippy::cast_possible_truncation)]
    fn render(&self, op: &str) -> EngineResult<DynamicImage> {
        let mut img = self.loaded(op)?.clone();

        for filter in &self.filters {
            img = filter.apply(img);
        }

        if self.brightness.abs() > f64::EPSILON {
            let level = (self.brightness / self.brightness_range * 255.0).round() as i32;
            img = img.brighten(level);
        }

        img = match self.quarter_turns {
            1 => img.rotate90(),
            2 => img.rotate180(),
            3 => img.rotate270(),
            _ => img,
        };

        let target = self.scaled_size(img.width(), img.height());
        if (target.width, target.height) != (img.width(), img.height()) {
            img = img.resize_exact(
                target.width,
                target.height,
                image::imageops::FilterType::Triangle,
            );
        }
        if self.scale.0 < 0.0 {
            img = img.fliph();
        }
        if self.scale.1 < 0.0 {
            img = img.flipv();
        }

        let mut canvas = img.to_rgba8();
        for object in &self.objects {
            if let CanvasObject::Shape { params, .. } = object {
                draw_shape(&mut canvas, params);
            }
        }
        Ok(DynamicImage::ImageRgba8(canvas))
    }
}

impl Engine for RasterEngine {
    fn load(&mut self, src: &str) -> EngineResult<CanvasSize> {
        if self.released {
            return Err(fault("load", "Cannot read properties of null (engine released)"));
        }
        let img = load_source(src).map_err(|e| fault("load", e))?;
        let img = fit_within(img, self.container.width, self.container.height);
        let size = CanvasSize::new(img.width(), img.height());
        tracing::debug!("Raster engine loaded {}x{}", size.width, size.height);
        self.image = Some(img);
        self.reset_adjustments();
        Ok(size)
    }

    fn canvas(&self) -> Option<CanvasSize> {
        if self.released {
            return None;
        }
        Some(match &self.image {
            Some(img) => self.transformed_size(img.width(), img.height()),
            None => CanvasSize::new(self.container.width, self.container.height),
        })
    }

    fn export(&self, format: &str, quality: u8) -> EngineResult<Vec<u8>> {
        let format_kind = RasterFormat::from_name(format);
        if format_kind == RasterFormat::Unknown {
            return Err(fault("export", format!("unsupported export format '{format}'")));
        }
        let img = self.render("export")?;
        encode(&img, format_kind, quality).map_err(|e| fault("export", e))
    }

    fn supports_format(&self, format: &str) -> bool {
        RasterFormat::from_name(format) != RasterFormat::Unknown
    }

    fn set_brightness(&mut self, level: f64) -> EngineResult<()> {
        self.loaded("set_brightness")?;
        self.brightness = level.clamp(-self.brightness_range, self.brightness_range);
        Ok(())
    }

    fn apply_filter(&mut self, name: &str) -> EngineResult<()> {
        self.loaded("apply_filter")?;
        let filter = match name.trim().to_ascii_lowercase().as_str() {
            "none" => {
                self.filters.clear();
                return Ok(());
            }
            "grayscale" | "greyscale" => Filter::Grayscale,
            "invert" => Filter::Invert,
            "blur" => Filter::Blur,
            "sharpen" => Filter::Sharpen,
            other => return Err(fault("apply_filter", format!("unknown filter '{other}'"))),
        };
        self.filters.push(filter);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rotate(&mut self, degrees: f64) -> EngineResult<()> {
        self.loaded("rotate")?;
        let normalized = degrees.rem_euclid(360.0);
        if (normalized % 90.0).abs() > f64::EPSILON {
            return Err(fault(
                "rotate",
                format!("rotation must be a multiple of 90 degrees, got {degrees}"),
            ));
        }
        let turns = (normalized / 90.0).round() as u8;
        self.quarter_turns = (self.quarter_turns + turns) % 4;
        Ok(())
    }

    fn set_scale(&mut self, x: f64, y: f64) -> EngineResult<()> {
        self.loaded("set_scale")?;
        if x.abs() < f64::EPSILON || y.abs() < f64::EPSILON {
            return Err(fault("set_scale", "scale collapses the canvas"));
        }
        self.scale = (x, y);
        Ok(())
    }

    fn set_position(&mut self, x: f64, y: f64) -> EngineResult<()> {
        self.loaded("set_position")?;
        self.position = (x, y);
        Ok(())
    }

    fn add_text(&mut self, text: &str, style: &TextStyle) -> EngineResult<ObjectHandle> {
        self.loaded("add_text")?;
        let handle = self.issue_handle();
        self.objects.push(CanvasObject::Text {
            handle,
            text: text.to_string(),
            style: style.clone(),
        });
        Ok(handle)
    }

    fn add_shape(&mut self, shape: &ShapeParams) -> EngineResult<ObjectHandle> {
        self.loaded("add_shape")?;
        if !shape.is_finite() {
            return Err(fault("add_shape", "shape bounds must be finite"));
        }
        if parse_hex_color(&shape.stroke).is_none() {
            return Err(fault(
                "add_shape",
                format!("invalid stroke color '{}'", shape.stroke),
            ));
        }
        let handle = self.issue_handle();
        self.objects.push(CanvasObject::Shape {
            handle,
            params: shape.clone(),
        });
        Ok(handle)
    }

    fn stop_drawing(&mut self) -> EngineResult<()> {
        // No interactive drawing mode; nothing to leave.
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
        self.image = None;
        self.objects.clear();
        tracing::trace!("Raster engine released");
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn draw_shape(canvas: &mut RgbaImage, params: &ShapeParams) {
    let Some(stroke) = parse_hex_color(&params.stroke) else {
        return;
    };
    if !params.is_finite() {
        return;
    }
    let fill = params.fill.as_deref().and_then(parse_hex_color);
    let (w, h) = (f64::from(canvas.width()), f64::from(canvas.height()));
    let (x0, y0) = (params.x, params.y);
    let (x1, y1) = (params.x + params.width, params.y + params.height);

    let mut put = |x: f64, y: f64, color: Rgba<u8>| {
        if x >= 0.0 && y >= 0.0 {
            let (px, py) = (x as u32, y as u32);
            if px < canvas.width() && py < canvas.height() {
                canvas.put_pixel(px, py, color);
            }
        }
    };

    // Every loop below walks at most the canvas extent, whatever the bounds.
    match params.kind {
        ShapeKind::Rect => {
            let (left, right) = (x0.min(x1).floor(), x0.max(x1).ceil());
            let (top, bottom) = (y0.min(y1).floor(), y0.max(y1).ceil());
            let mut y = top.max(0.0);
            while y < bottom.min(h) {
                let mut x = left.max(0.0);
                while x < right.min(w) {
                    let edge = x - left < 1.0
                        || right - x <= 1.0
                        || y - top < 1.0
                        || bottom - y <= 1.0;
                    if edge {
                        put(x, y, stroke);
                    } else if let Some(fill) = fill {
                        put(x, y, fill);
                    }
                    x += 1.0;
                }
                y += 1.0;
            }
        }
        ShapeKind::Line => {
            let (dx, dy) = (x1 - x0, y1 - y0);
            if dx.abs().max(dy.abs()) < f64::EPSILON {
                put(x0, y0, stroke);
            } else if dx.abs() >= dy.abs() {
                let mut x = x0.min(x1).max(0.0).floor();
                while x <= x0.max(x1).min(w) {
                    put(x, y0 + dy * (x - x0) / dx, stroke);
                    x += 1.0;
                }
            } else {
                let mut y = y0.min(y1).max(0.0).floor();
                while y <= y0.max(y1).min(h) {
                    put(x0 + dx * (y - y0) / dy, y, stroke);
                    y += 1.0;
                }
            }
        }
        ShapeKind::Ellipse => {
            let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
            let (rx, ry) = ((x1 - x0).abs() / 2.0, (y1 - y0).abs() / 2.0);
            let half_span = |offset: f64, radius: f64, other: f64| {
                let t = if radius > 0.0 { offset / radius } else { 0.0 };
                other * (1.0 - t * t).max(0.0).sqrt()
            };

            // Rows: fill between the two edges and stroke both ends.
            let mut y = (cy - ry).max(0.0).floor();
            while y <= (cy + ry).min(h) {
                let half = half_span(y - cy, ry, rx);
                if let Some(fill) = fill {
                    let mut x = (cx - half).max(0.0).floor();
                    while x <= (cx + half).min(w) {
                        put(x, y, fill);
                        x += 1.0;
                    }
                }
                put(cx - half, y, stroke);
                put(cx + half, y, stroke);
                y += 1.0;
            }
            // Columns close the gaps where the outline runs flat.
            let mut x = (cx - rx).max(0.0).floor();
            while x <= (cx + rx).min(w) {
                let half = half_span(x - cx, rx, ry);
                put(x, cy - half, stroke);
                put(x, cy + half, stroke);
                x += 1.0;
            }
        }
    }
}

/// Register the raster engine for `adapter_type`.
///
/// The 2D scene adapter passes brightness in -1..=1; every other adapter
/// uses -100..=100.
pub fn register(registry: &EngineRegistry, adapter_type: AdapterType) {
    let range = if adapter_type == AdapterType::Scene2d {
        1.0
    } else {
        100.0
    };
    registry.register(adapter_type, &[RASTER_MODULE], move |container| {
        let engine = RasterEngine::new(container.clone()).with_brightness_range(range);
        Ok(Box::new(engine) as Box<dyn Engine>)
    });
}

/// Register the raster engine for the raster adapter.
pub fn register_defaults(registry: &EngineRegistry) {
    register(registry, AdapterType::Raster);
}

/// Register the raster engine behind every adapter type.
///
/// Useful where the real engines are unavailable, such as the demo binary
/// and headless tests.
pub fn register_all(registry: &EngineRegistry) {
    for adapter_type in AdapterType::ALL {
        register(registry, adapter_type);
    }
}
