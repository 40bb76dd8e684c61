//! Image operations in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode + detect** | `image::guess_format` + `load_from_memory_with_format` |
//! | **Resize** | Lanczos3 via `DynamicImage::resize_exact` |
//! | **Crop** | `DynamicImage::crop_imm` |
//! | **Encode** | `JpegEncoder` with quality, PNG/WebP lossless |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    PlanError, plan_center_crop, plan_max_side, plan_resize, plan_thumbnail_box,
};
pub use params::{CropRect, OutputFormat, Quality, SourceFormat, TargetSpec};
pub use rust_backend::{RustBackend, supported_input_extensions};
