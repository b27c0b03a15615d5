//! Shared test utilities for the simple-attach test suite.
//!
//! Synthetic image writers, a canonical record fixture, and a store config
//! rooted in a temp directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let source = tmp.path().join("in.jpg");
//! create_test_jpeg(&source, 400, 300);
//!
//! let config = store_config(tmp.path());
//! let record = sample_record();
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use image::{ImageEncoder, RgbImage, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{PropertyConfig, StoreConfig};
use crate::entity::Record;
use crate::formats::VariantOverride;
use crate::template::PathTemplate;

pub use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a PNG with a transparent left half.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        let alpha = if x < width / 2 { 0 } else { 255 };
        image::Rgba([200, 10, 10, alpha])
    });
    img.save(path).unwrap();
}

// =========================================================================
// Record and config fixtures
// =========================================================================

pub fn sample_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(8, 5, 0)
        .unwrap()
}

/// A user record with `id`, `name` and `created`.
pub fn sample_record() -> Record {
    Record::new()
        .with("id", "42")
        .with("name", "Ada Lovelace")
        .with("created", sample_date())
}

/// Config rooted at `root` with an image property `photo`
/// (original + thumbnail + medium) and a plain property `resume`.
pub fn store_config(root: &Path) -> StoreConfig {
    let mut config = StoreConfig {
        root: root.to_path_buf(),
        web: "/uploads/".to_string(),
        ..Default::default()
    };
    config.formats.insert(
        "medium".to_string(),
        VariantOverride {
            max_width: Some(200),
            ..Default::default()
        },
    );
    config.properties.insert(
        "photo".to_string(),
        PropertyConfig {
            path: PathTemplate::new("users/{id}/{slug::name}-{-imgformat-}.{-ext-}"),
            formats: vec![
                "original".to_string(),
                "thumbnail".to_string(),
                "medium".to_string(),
            ],
            overrides: BTreeMap::new(),
        },
    );
    config.properties.insert(
        "resume".to_string(),
        PropertyConfig {
            path: PathTemplate::new("users/{id}/resume.{-ext-}"),
            formats: Vec::new(),
            overrides: BTreeMap::new(),
        },
    );
    config
}
