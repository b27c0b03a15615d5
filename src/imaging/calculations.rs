//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images. Both
//! the pixel backend and the recording mock size their results with these, so
//! policy tests on the mock see exactly the geometry a real render produces.
//!
//! A target side of `0` means "no constraint on that axis" throughout.

use super::params::ResizeParams;

/// Scale a length by `num / den`, rounding, never below one pixel.
fn scale(len: u32, num: u32, den: u32) -> u32 {
    ((len as f64 * num as f64 / den.max(1) as f64).round() as u32).max(1)
}

/// Dimensions after setting the width and following the aspect ratio.
pub fn scale_to_width(current: (u32, u32), width: u32) -> (u32, u32) {
    (width.max(1), scale(current.1, width, current.0))
}

/// Dimensions after setting the height and following the aspect ratio.
pub fn scale_to_height(current: (u32, u32), height: u32) -> (u32, u32) {
    (scale(current.0, height, current.1), height.max(1))
}

/// Side to resize on so `source` covers `target` (resize before crop).
///
/// The axis that shrinks less binds: it lands exactly on its target while the
/// other side overflows and is cut by the crop. Both target sides non-zero.
pub fn calculate_fill_step(source: (u32, u32), target: (u32, u32)) -> BoundStep {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    if src_w as f64 / tgt_w as f64 > src_h as f64 / tgt_h as f64 {
        // Source is wider: height matches, width overflows
        BoundStep::Height(tgt_h)
    } else {
        BoundStep::Width(tgt_w)
    }
}

/// Largest aspect-preserving size inside `target` (may upscale).
///
/// Zero sides of `target` are unconstrained; a fully zero target returns the
/// source unchanged.
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    match (tgt_w > 0, tgt_h > 0) {
        (false, false) => source,
        (true, false) => scale_to_width(source, tgt_w),
        (false, true) => scale_to_height(source, tgt_h),
        (true, true) => {
            let w_ratio = tgt_w as f64 / src_w as f64;
            let h_ratio = tgt_h as f64 / src_h as f64;
            if w_ratio < h_ratio {
                scale_to_width(source, tgt_w)
            } else {
                scale_to_height(source, tgt_h)
            }
        }
    }
}

/// Whether `current` fits inside `target` on both axes.
///
/// A zero target side admits nothing, so a one-sided target never "fits".
pub fn fits_within(current: (u32, u32), target: (u32, u32)) -> bool {
    current.0 <= target.0 && current.1 <= target.1
}

/// Outcome of a resize request: the scaled image and the box it ends up in.
///
/// `canvas` differs from `content` only for a proportional resize into a
/// two-sided box, where the image is padded to the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub content: (u32, u32),
    pub canvas: (u32, u32),
}

/// Resolve a resize request against the current dimensions.
pub fn plan_resize(current: (u32, u32), params: &ResizeParams) -> ResizePlan {
    let width = params.width.filter(|w| *w > 0);
    let height = params.height.filter(|h| *h > 0);

    let (content, canvas) = match (width, height) {
        (None, None) => (current, current),
        (Some(w), None) => {
            let dims = if params.keep_proportions {
                scale_to_width(current, w)
            } else {
                (w, current.1)
            };
            (dims, dims)
        }
        (None, Some(h)) => {
            let dims = if params.keep_proportions {
                scale_to_height(current, h)
            } else {
                (current.0, h)
            };
            (dims, dims)
        }
        (Some(w), Some(h)) => {
            if params.keep_proportions {
                (calculate_fit_dimensions(current, (w, h)), (w, h))
            } else {
                ((w, h), (w, h))
            }
        }
    };

    ResizePlan { content, canvas }
}

/// Which side a max-bound step constrains, and to what length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundStep {
    Width(u32),
    Height(u32),
}

/// Pick the binding side for fitting `current` under `(max_w, max_h)`.
///
/// The side with the larger `current / max` ratio binds. The returned length
/// never exceeds the current one, so the step only ever shrinks. Returns
/// `None` when both maxima are zero.
pub fn calculate_bound_step(current: (u32, u32), max: (u32, u32)) -> Option<BoundStep> {
    let (cur_w, cur_h) = current;
    let (max_w, max_h) = max;

    if max_w == 0 && max_h == 0 {
        return None;
    }

    let ratio = |len: u32, bound: u32| {
        if bound == 0 {
            0.0
        } else {
            len as f64 / bound as f64
        }
    };

    if ratio(cur_w, max_w) > ratio(cur_h, max_h) {
        Some(BoundStep::Width(max_w.min(cur_w)))
    } else {
        Some(BoundStep::Height(max_h.min(cur_h)))
    }
}

/// Clamp a crop box to the image it is cut from.
pub fn clamp_crop(current: (u32, u32), crop: (u32, u32)) -> (u32, u32) {
    (crop.0.min(current.0).max(1), crop.1.min(current.1).max(1))
}
