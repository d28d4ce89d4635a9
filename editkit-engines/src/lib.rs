//! # Editkit Engines
//!
//! Concrete engines for the editkit adapter contract.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Engine trait                   │
//! ├─────────────────────────────────────────────┤
//! │ RasterEngine (image crate, headless)        │
//! │ - data URI / file decoding                  │
//! │ - PNG / JPEG / BMP export                   │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod image;
pub mod raster;

pub use error::{ImageError, ImageResult};
pub use raster::{register_all, register_defaults, RasterEngine, RASTER_MODULE};
