//! Variant rendering: turning one source image into one format.
//!
//! A resized variant is produced by three policies run in a fixed order:
//!
//! 1. **Exact size** ([`exact_size`]): only when the variant has a target
//!    size. Optionally crops to fill the box ([`crop_to_fill`]), then either
//!    trims down to the box ([`trim_to_target`]) or fits into it
//!    ([`fit_to_target`]).
//! 2. **Background fill** ([`fill_background`]): an under-sized result is
//!    centered on a box-sized canvas of the background color.
//! 3. **Max bound** ([`bound_to_max`]): uniform downscale under
//!    `max_width`/`max_height`, never upscaling.
//!
//! Every policy works against [`ImageBackend`] only, so the whole decision
//! tree is tested with the recording mock.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{BoundStep, calculate_bound_step, calculate_fill_step, fits_within};
use super::params::{Anchor, CanvasParams, CropParams, ResizeParams};
use crate::formats::{FormatCatalog, FormatError, Variant, VariantOverride, VariantSpec};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn nonzero(len: u32) -> Option<u32> {
    (len > 0).then_some(len)
}

fn resize_side<B: ImageBackend>(backend: &B, image: B::Image, step: BoundStep) -> Result<B::Image> {
    let (width, height) = match step {
        BoundStep::Width(w) => (Some(w), None),
        BoundStep::Height(h) => (None, Some(h)),
    };
    backend.resize(
        image,
        &ResizeParams {
            width,
            height,
            keep_proportions: true,
            anchor: Anchor::CENTER,
        },
    )
}

/// Side whose `current / target` ratio is larger; zero targets never bind.
fn binding_side(current: (u32, u32), target: (u32, u32)) -> BoundStep {
    let ratio = |len: u32, t: u32| if t == 0 { 0.0 } else { len as f64 / t as f64 };
    if target.1 == 0 || ratio(current.0, target.0) > ratio(current.1, target.1) {
        BoundStep::Width(target.0)
    } else {
        BoundStep::Height(target.1)
    }
}

/// Cover the target box and cut it out at the crop anchor.
///
/// Needs both target sides; with either one unset the image is returned as is.
pub fn crop_to_fill<B: ImageBackend>(
    backend: &B,
    image: B::Image,
    spec: &VariantSpec,
) -> Result<B::Image> {
    let (width, height) = spec.target();
    if width == 0 || height == 0 {
        return Ok(image);
    }

    let image = if spec.keep_proportions {
        let current = backend.dimensions(&image).pair();
        resize_side(backend, image, calculate_fill_step(current, (width, height)))?
    } else {
        backend.resize(
            image,
            &ResizeParams {
                width: Some(width),
                height: Some(height),
                keep_proportions: false,
                anchor: spec.crop_position,
            },
        )?
    };

    backend.crop(
        image,
        &CropParams {
            width,
            height,
            anchor: spec.crop_position,
        },
    )
}

/// Shrink each side that exceeds its target, one side after the other.
pub fn trim_to_target<B: ImageBackend>(
    backend: &B,
    image: B::Image,
    spec: &VariantSpec,
) -> Result<B::Image> {
    let (width, height) = spec.target();
    let mut image = image;

    if width > 0 && backend.dimensions(&image).width > width {
        image = resize_side(backend, image, BoundStep::Width(width))?;
    }
    if height > 0 && backend.dimensions(&image).height > height {
        image = resize_side(backend, image, BoundStep::Height(height))?;
    }
    Ok(image)
}

/// Bring the image to the target box.
///
/// - not enlarging and already inside the box: centered, unscaled, on a
///   box-sized canvas
/// - `trim_bg`: one uniform scale so the image fits, no padding
/// - otherwise: resize to the box, padded or stretched per `keep_proportions`
pub fn fit_to_target<B: ImageBackend>(
    backend: &B,
    image: B::Image,
    spec: &VariantSpec,
) -> Result<B::Image> {
    let target = spec.target();
    let current = backend.dimensions(&image).pair();

    if !spec.enlarge && fits_within(current, target) {
        return backend.composite(
            image,
            &CanvasParams {
                width: target.0,
                height: target.1,
                background: spec.bg_color,
                anchor: Anchor::CENTER,
            },
        );
    }

    if spec.trim_bg {
        return resize_side(backend, image, binding_side(current, target));
    }

    backend.resize(
        image,
        &ResizeParams {
            width: nonzero(target.0),
            height: nonzero(target.1),
            keep_proportions: spec.keep_proportions,
            anchor: Anchor::CENTER,
        },
    )
}

/// Run the exact-size policy: optional crop, then trim or fit.
pub fn exact_size<B: ImageBackend>(
    backend: &B,
    image: B::Image,
    spec: &VariantSpec,
) -> Result<B::Image> {
    let mut image = image;
    if spec.crop {
        image = crop_to_fill(backend, image, spec)?;
    }
    if !spec.enlarge && spec.trim_bg {
        trim_to_target(backend, image, spec)
    } else {
        fit_to_target(backend, image, spec)
    }
}

/// Center an image that fits inside the target box on a filled canvas.
///
/// Also flattens transparent padding left by a proportional fit.
pub fn fill_background<B: ImageBackend>(
    backend: &B,
    image: B::Image,
    spec: &VariantSpec,
) -> Result<B::Image> {
    let target = spec.target();
    if spec.trim_bg || !fits_within(backend.dimensions(&image).pair(), target) {
        return Ok(image);
    }
    backend.composite(
        image,
        &CanvasParams {
            width: target.0,
            height: target.1,
            background: spec.bg_color,
            anchor: Anchor::CENTER,
        },
    )
}

/// Uniform downscale so the image fits under the max bound.
pub fn bound_to_max<B: ImageBackend>(
    backend: &B,
    image: B::Image,
    spec: &VariantSpec,
) -> Result<B::Image> {
    let current = backend.dimensions(&image).pair();
    match calculate_bound_step(current, spec.max_bound()) {
        Some(BoundStep::Width(w)) if w != current.0 => {
            resize_side(backend, image, BoundStep::Width(w))
        }
        Some(BoundStep::Height(h)) if h != current.1 => {
            resize_side(backend, image, BoundStep::Height(h))
        }
        _ => Ok(image),
    }
}

/// Apply every policy of `spec` to a decoded image.
pub fn render_variant<B: ImageBackend>(
    backend: &B,
    image: B::Image,
    spec: &VariantSpec,
) -> Result<B::Image> {
    let (width, height) = spec.target();
    let mut image = image;

    if width > 0 || height > 0 {
        image = exact_size(backend, image, spec)?;
        image = fill_background(backend, image, spec)?;
    }
    bound_to_max(backend, image, spec)
}

fn create_parent(dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BackendError::DestinationWrite {
            path: parent.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Whether `a` and `b` name the same existing file.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy `source` to `dest` untouched, creating parent directories.
///
/// A `dest` that already is `source` is left alone.
pub fn copy_original(source: &Path, dest: &Path) -> Result<()> {
    if !source.is_file() {
        return Err(BackendError::SourceUnreadable {
            path: source.to_path_buf(),
            reason: "not a file".to_string(),
        });
    }
    if is_same_file(source, dest) {
        return Ok(());
    }
    create_parent(dest)?;
    std::fs::copy(source, dest).map_err(|e| BackendError::DestinationWrite {
        path: dest.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Produces one output file per (source, format) pair.
pub struct VariantEngine<B> {
    backend: B,
    catalog: FormatCatalog,
}

impl<B: ImageBackend> VariantEngine<B> {
    pub fn new(backend: B, catalog: FormatCatalog) -> Self {
        Self { backend, catalog }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    /// Write the `format` variant of `source` to `dest`.
    ///
    /// `original` is a byte copy; every other format is decoded, rendered and
    /// encoded at the variant's quality.
    pub fn transform(
        &self,
        source: &Path,
        dest: &Path,
        format: &str,
        overrides: Option<&BTreeMap<String, VariantOverride>>,
    ) -> std::result::Result<(), EngineError> {
        match self.catalog.resolve(format, overrides)? {
            Variant::Original => {
                debug!(source = %source.display(), dest = %dest.display(), "copying original");
                copy_original(source, dest)?;
            }
            Variant::Resized(spec) => {
                let image = self.backend.load(source)?;
                let image = render_variant(&self.backend, image, &spec)?;
                let dims = self.backend.dimensions(&image);
                debug!(
                    format,
                    dest = %dest.display(),
                    width = dims.width,
                    height = dims.height,
                    "rendered variant"
                );
                create_parent(dest)?;
                self.backend.save(&image, dest, spec.quality)?;
            }
        }
        Ok(())
    }
}
