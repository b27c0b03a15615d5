//! Image processing: variant policies over a pluggable pixel backend.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (content sniffed) |
//! | **Resize** | Lanczos3, transparent padding for proportional box fits |
//! | **Crop / Canvas** | `crop_imm`, `imageops::overlay` |
//! | **Encode** | JPEG, PNG, WebP, TIFF, AVIF by destination extension |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Variant policies and the [`VariantEngine`]

pub mod backend;
pub mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use operations::{EngineError, VariantEngine, render_variant};
pub use params::{
    Align, Anchor, CanvasParams, Color, CropParams, ParamError, Quality, ResizeParams,
};
pub use rust_backend::{RustBackend, SUPPORTED_OUTPUT_EXTENSIONS};
