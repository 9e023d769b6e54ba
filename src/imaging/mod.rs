//! Image processing, statically linked: no system libraries at runtime.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize** | Lanczos3, width-capped, never upscaled |
//! | **Encode** | lossy WebP via libwebp, or AVIF via rav1e |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::fit_to_width;
pub use operations::{ConvertedImage, convert_image};
pub use params::{ConvertParams, OutputFormat, Quality};
pub use rust_backend::{RustBackend, supported_input_extensions};
