//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the primitive operations the variant
//! policies are built from: load, measure, resize, crop, composite on a
//! canvas, and save. The policies never touch pixels themselves.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on top of the
//! `image` crate. Tests use the recording `MockBackend` below, whose image
//! handle is nothing but its dimensions.

use super::params::{CanvasParams, CropParams, Quality, ResizeParams};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot read source image {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },
    #[error("Cannot write {path}: {reason}")]
    DestinationWrite { path: PathBuf, reason: String },
    #[error("Unsupported output format: {0:?}")]
    UnsupportedOutput(String),
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pair(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for image processing backends.
///
/// Every operation consumes its input handle and returns the transformed one,
/// so a backend is free to reuse buffers.
pub trait ImageBackend {
    /// Decoded image handle.
    type Image;

    /// Decode an image from disk. Undecodable input is
    /// [`BackendError::SourceUnreadable`].
    fn load(&self, path: &Path) -> Result<Self::Image, BackendError>;

    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    fn resize(&self, image: Self::Image, params: &ResizeParams)
    -> Result<Self::Image, BackendError>;

    fn crop(&self, image: Self::Image, params: &CropParams) -> Result<Self::Image, BackendError>;

    /// Place the image on a new canvas filled with the background color.
    fn composite(
        &self,
        image: Self::Image,
        params: &CanvasParams,
    ) -> Result<Self::Image, BackendError>;

    /// Encode to `path`, choosing the codec from its extension. The parent
    /// directory must exist.
    fn save(&self, image: &Self::Image, path: &Path, quality: Quality)
    -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::{clamp_crop, plan_resize};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching pixels.
    ///
    /// Source dimensions are registered per path, or given once for any
    /// existing file; `save` writes a small marker file so filesystem
    /// bookkeeping can be asserted.
    #[derive(Default)]
    pub struct MockBackend {
        pub sources: Mutex<HashMap<PathBuf, Dimensions>>,
        pub any_file: Option<Dimensions>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Load(String),
        Resize {
            width: Option<u32>,
            height: Option<u32>,
            keep_proportions: bool,
            result: (u32, u32),
        },
        Crop {
            width: u32,
            height: u32,
            anchor: String,
        },
        Composite {
            width: u32,
            height: u32,
            background: String,
        },
        Save {
            path: String,
            dimensions: (u32, u32),
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_source(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
            let backend = Self::new();
            backend.add_source(path, width, height);
            backend
        }

        /// Every existing file loads with these dimensions.
        pub fn for_any_file(width: u32, height: u32) -> Self {
            Self {
                any_file: Some(Dimensions::new(width, height)),
                ..Self::default()
            }
        }

        pub fn add_source(&self, path: impl Into<PathBuf>, width: u32, height: u32) {
            self.sources
                .lock()
                .unwrap()
                .insert(path.into(), Dimensions::new(width, height));
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn saves(&self) -> Vec<(String, (u32, u32))> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Save {
                        path, dimensions, ..
                    } => Some((path, dimensions)),
                    _ => None,
                })
                .collect()
        }

        /// True when anything beyond load and save ran.
        pub fn transformed(&self) -> bool {
            self.get_operations().iter().any(|op| {
                matches!(
                    op,
                    RecordedOp::Resize { .. } | RecordedOp::Crop { .. } | RecordedOp::Composite { .. }
                )
            })
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }
    }

    impl ImageBackend for MockBackend {
        type Image = Dimensions;

        fn load(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Load(path.to_string_lossy().to_string()));
            self.sources
                .lock()
                .unwrap()
                .get(path)
                .copied()
                .or(self.any_file.filter(|_| path.is_file()))
                .ok_or_else(|| BackendError::SourceUnreadable {
                    path: path.to_path_buf(),
                    reason: "no mock source registered".to_string(),
                })
        }

        fn dimensions(&self, image: &Dimensions) -> Dimensions {
            *image
        }

        fn resize(
            &self,
            image: Dimensions,
            params: &ResizeParams,
        ) -> Result<Dimensions, BackendError> {
            let plan = plan_resize(image.pair(), params);
            self.record(RecordedOp::Resize {
                width: params.width,
                height: params.height,
                keep_proportions: params.keep_proportions,
                result: plan.canvas,
            });
            Ok(plan.canvas.into())
        }

        fn crop(&self, image: Dimensions, params: &CropParams) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Crop {
                width: params.width,
                height: params.height,
                anchor: params.anchor.to_string(),
            });
            Ok(clamp_crop(image.pair(), (params.width, params.height)).into())
        }

        fn composite(
            &self,
            _image: Dimensions,
            params: &CanvasParams,
        ) -> Result<Dimensions, BackendError> {
            self.record(RecordedOp::Composite {
                width: params.width,
                height: params.height,
                background: params.background.to_string(),
            });
            Ok(Dimensions::new(params.width, params.height))
        }

        fn save(&self, image: &Dimensions, path: &Path, quality: Quality) -> Result<(), BackendError> {
            self.record(RecordedOp::Save {
                path: path.to_string_lossy().to_string(),
                dimensions: image.pair(),
                quality: quality.value(),
            });
            std::fs::write(path, format!("{}x{}", image.width, image.height))?;
            Ok(())
        }
    }

    #[test]
    fn mock_load_unknown_source_is_unreadable() {
        let backend = MockBackend::new();
        let result = backend.load(Path::new("/missing.jpg"));
        assert!(matches!(result, Err(BackendError::SourceUnreadable { .. })));
    }

    #[test]
    fn mock_any_file_needs_existing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("upload");
        std::fs::write(&path, b"x").unwrap();

        let backend = MockBackend::for_any_file(30, 20);
        assert_eq!(backend.load(&path).unwrap(), Dimensions::new(30, 20));
        assert!(backend.load(&tmp.path().join("gone")).is_err());
    }

    #[test]
    fn mock_records_resize_with_planned_size() {
        let backend = MockBackend::with_source("/a.jpg", 400, 200);
        let img = backend.load(Path::new("/a.jpg")).unwrap();
        let img = backend
            .resize(
                img,
                &ResizeParams {
                    width: Some(100),
                    height: None,
                    keep_proportions: true,
                    anchor: Default::default(),
                },
            )
            .unwrap();

        assert_eq!(img, Dimensions::new(100, 50));
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[1],
            RecordedOp::Resize {
                result: (100, 50),
                ..
            }
        ));
    }

    #[test]
    fn mock_crop_clamps_to_image() {
        let backend = MockBackend::new();
        let img = backend
            .crop(
                Dimensions::new(80, 300),
                &CropParams {
                    width: 100,
                    height: 100,
                    anchor: Default::default(),
                },
            )
            .unwrap();
        assert_eq!(img, Dimensions::new(80, 100));
    }
}
