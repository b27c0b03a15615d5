//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3`, transparent padding via `imageops::overlay` |
//! | Crop | `DynamicImage::crop_imm` at the anchor offset |
//! | Canvas | `RgbaImage::from_pixel` + `imageops::overlay` (alpha-blended) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality, alpha dropped) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6, quality) |
//! | Encode → PNG / WebP / TIFF | `DynamicImage::save_with_format` (lossless, quality ignored) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{clamp_crop, plan_resize};
use super::params::{CanvasParams, CropParams, Quality, ResizeParams};
use crate::naming::file_extension;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::BufWriter;
use std::path::Path;

/// Output extensions [`RustBackend::save`] can encode.
pub const SUPPORTED_OUTPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff", "avif"];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn unreadable(path: &Path, reason: impl ToString) -> BackendError {
    BackendError::SourceUnreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn unwritable(path: &Path, reason: impl ToString) -> BackendError {
    BackendError::DestinationWrite {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Encode with a configured encoder into a fresh file at `path`.
fn write_encoded(
    path: &Path,
    encode: impl FnOnce(BufWriter<std::fs::File>) -> image::ImageResult<()>,
) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(|e| unwritable(path, e))?;
    encode(BufWriter::new(file)).map_err(|e| unwritable(path, e))
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let ext = file_extension(&path.to_string_lossy()).to_lowercase();
    // Encoders below accept 8-bit RGB(A) only
    let rgba = || DynamicImage::ImageRgba8(img.to_rgba8());

    match ext.as_str() {
        "jpg" | "jpeg" => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            write_encoded(path, |w| {
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(w, quality as u8);
                rgb.write_with_encoder(encoder)
            })
        }
        "avif" => {
            let rgba = rgba();
            write_encoded(path, |w| {
                let encoder =
                    image::codecs::avif::AvifEncoder::new_with_speed_quality(w, 6, quality as u8);
                rgba.write_with_encoder(encoder)
            })
        }
        "png" => rgba()
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| unwritable(path, e)),
        "webp" => rgba()
            .save_with_format(path, ImageFormat::WebP)
            .map_err(|e| unwritable(path, e)),
        "tif" | "tiff" => rgba()
            .save_with_format(path, ImageFormat::Tiff)
            .map_err(|e| unwritable(path, e)),
        other => Err(BackendError::UnsupportedOutput(other.to_string())),
    }
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn load(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        ImageReader::open(path)
            .map_err(|e| unreadable(path, e))?
            .with_guessed_format()
            .map_err(|e| unreadable(path, e))?
            .decode()
            .map_err(|e| unreadable(path, e))
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        image.dimensions().into()
    }

    fn resize(
        &self,
        image: DynamicImage,
        params: &ResizeParams,
    ) -> Result<DynamicImage, BackendError> {
        let current = image.dimensions();
        let plan = plan_resize(current, params);

        let resized = if plan.content == current {
            image
        } else {
            image.resize_exact(plan.content.0, plan.content.1, FilterType::Lanczos3)
        };

        if plan.canvas == plan.content {
            return Ok(resized);
        }

        // Proportional fit into a box: pad the rest of the box transparently
        let mut canvas = RgbaImage::new(plan.canvas.0, plan.canvas.1);
        let (x, y) = params.anchor.offset(plan.canvas, plan.content);
        imageops::overlay(&mut canvas, &resized.to_rgba8(), x, y);
        Ok(DynamicImage::ImageRgba8(canvas))
    }

    fn crop(&self, image: DynamicImage, params: &CropParams) -> Result<DynamicImage, BackendError> {
        let current = image.dimensions();
        let (w, h) = clamp_crop(current, (params.width, params.height));
        let (x, y) = params.anchor.offset(current, (w, h));
        Ok(image.crop_imm(x.max(0) as u32, y.max(0) as u32, w, h))
    }

    fn composite(
        &self,
        image: DynamicImage,
        params: &CanvasParams,
    ) -> Result<DynamicImage, BackendError> {
        let mut canvas = RgbaImage::from_pixel(
            params.width.max(1),
            params.height.max(1),
            Rgba(params.background.rgba()),
        );
        let (x, y) = params
            .anchor
            .offset(canvas.dimensions(), image.dimensions());
        imageops::overlay(&mut canvas, &image.to_rgba8(), x, y);
        Ok(DynamicImage::ImageRgba8(canvas))
    }

    fn save(&self, image: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
        save_image(image, path, quality.value())
    }
}
