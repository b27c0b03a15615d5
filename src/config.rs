//! Store configuration module.
//!
//! Handles loading, validating, and merging `store.toml`. The user file is
//! merged key-by-key over the stock defaults, then checked for consistency
//! (known formats, `{-imgformat-}` where paths must differ per format).
//!
//! ## Configuration Options
//!
//! ```toml
//! root = "uploads"          # Filesystem root for stored files
//! web = "/uploads/"         # Public URL prefix for stored files
//!
//! [formats.medium]          # Per-format settings, layered over built-ins
//! max_width = 800
//!
//! [properties.photo]        # A managed file property
//! path = "users/{id}/{slug::name}-{-imgformat-}.{-ext-}"
//! formats = ["original", "thumbnail", "medium"]
//!
//! [properties.photo.overrides.thumbnail]   # Only for this property
//! quality = 70
//!
//! [properties.resume]       # No formats: stored as a plain file
//! path = "users/{id}/resume.{-ext-}"
//! ```
//!
//! Variant keys (in `[formats.X]` and `overrides`): `size`, `width`,
//! `height`, `max_size`, `max_width`, `max_height`, `crop`, `crop_position`,
//! `quality`, `enlarge`, `trim_bg`, `keep_proportions`, `bg_color`.
//!
//! Unknown keys are rejected to catch typos early.

use crate::formats::{FormatCatalog, ORIGINAL, VariantOverride};
use crate::imaging::SUPPORTED_OUTPUT_EXTENSIONS;
use crate::naming::file_extension;
use crate::template::PathTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Store configuration loaded from `store.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Filesystem root every stored path is relative to.
    pub root: PathBuf,
    /// Public prefix for web paths.
    pub web: String,
    /// Per-format variant settings.
    pub formats: BTreeMap<String, VariantOverride>,
    /// Managed file properties by name.
    pub properties: BTreeMap<String, PropertyConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
            web: "/uploads/".to_string(),
            formats: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }
}

/// One managed file property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyConfig {
    /// Destination template, relative to the root.
    pub path: PathTemplate,
    /// Formats rendered for this property, in order. Empty for plain files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<String>,
    /// Per-property variant settings, keyed by format.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, VariantOverride>,
}

impl PropertyConfig {
    /// Image properties render variants; the others are stored as they are.
    pub fn is_image(&self) -> bool {
        !self.formats.is_empty()
    }
}

impl StoreConfig {
    pub fn catalog(&self) -> FormatCatalog {
        FormatCatalog::new(self.formats.clone())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyConfig> {
        self.properties.get(name)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::Validation("root must not be empty".into()));
        }
        for (name, tier) in &self.formats {
            check_quality(&format!("formats.{name}"), tier)?;
        }

        let catalog = self.catalog();
        for (name, property) in &self.properties {
            if property.path.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "properties.{name}.path must not be empty"
                )));
            }
            for format in property.formats.iter().chain(property.overrides.keys()) {
                if !catalog.contains(format) {
                    return Err(ConfigError::Validation(format!(
                        "properties.{name}: unknown format {format:?}"
                    )));
                }
            }
            if property.formats.len() > 1 && !property.path.has_format_token() {
                return Err(ConfigError::Validation(format!(
                    "properties.{name}.path must contain {{-imgformat-}} when it has several formats"
                )));
            }
            check_output_extension(name, property)?;
            for (format, tier) in &property.overrides {
                check_quality(&format!("properties.{name}.overrides.{format}"), tier)?;
            }
        }
        Ok(())
    }
}

/// A literal extension on a path that gets rendered variants must be one the
/// encoder can write. `{-ext-}` and other tokens are only known per file.
fn check_output_extension(name: &str, property: &PropertyConfig) -> Result<(), ConfigError> {
    if !property.formats.iter().any(|f| f != ORIGINAL) {
        return Ok(());
    }
    let ext = file_extension(property.path.as_str()).to_ascii_lowercase();
    if ext.is_empty() || ext.contains('{') || SUPPORTED_OUTPUT_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(());
    }
    Err(ConfigError::Validation(format!(
        "properties.{name}.path: cannot render variants as .{ext}"
    )))
}

fn check_quality(section: &str, tier: &VariantOverride) -> Result<(), ConfigError> {
    match tier.quality {
        Some(q) if q > 100 => Err(ConfigError::Validation(format!(
            "{section}.quality must be 0-100"
        ))),
        _ => Ok(()),
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(StoreConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `None` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge `overlay` over `base`, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<StoreConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: StoreConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `path` over the stock defaults.
///
/// A relative `root` is taken relative to the directory holding the file.
pub fn load_config(path: &Path) -> Result<StoreConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    let mut config = resolve_config(base, overlay)?;

    if config.root.is_relative() {
        if let Some(dir) = path.parent() {
            config.root = dir.join(&config.root);
        }
    }
    Ok(config)
}

/// Returns a fully-commented stock `store.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Attach Configuration
# ===========================
# Values shown below are the defaults. Unknown keys will cause an error.

# Filesystem root for stored files. Relative paths are resolved against the
# directory holding this file.
root = "uploads"

# Public URL prefix prepended to stored filenames by web paths.
web = "/uploads/"

# ---------------------------------------------------------------------------
# Formats
# ---------------------------------------------------------------------------
# A format is a named set of resize settings. "original" (copy unchanged)
# and "thumbnail" (100px square crop) are always available; sections here add
# formats or adjust the built-in ones key by key.
#
# Keys (all optional):
#   size = 0              # square target, overrides width/height
#   width = 0             # target width (0 = any)
#   height = 0            # target height (0 = any)
#   max_size = 0          # square upper bound, overrides max_width/max_height
#   max_width = 0         # upper bound, never upscales
#   max_height = 0
#   crop = false          # cover the target box and cut it out
#   crop_position = "MM"  # anchor: L/M/R then T/M/B, e.g. "LT", "MB"
#   quality = 85          # lossy encoding quality (0-100)
#   enlarge = false       # scale up sources smaller than the target
#   trim_bg = false       # no background canvas around the result
#   keep_proportions = true
#   bg_color = "#FFFFFF"  # canvas fill color
#
# [formats.medium]
# max_width = 800
#
# [formats.thumbnail]
# quality = 70

# ---------------------------------------------------------------------------
# Properties
# ---------------------------------------------------------------------------
# Each managed file property has a destination template and, for images, the
# formats to render. Template tokens:
#   {-ext-}              extension of the incoming file
#   {-origin-}           slug of the incoming file name
#   {-custom-}           custom path supplied by the record
#   {-imgformat-}        format name (required with more than one format)
#   {slug::prop}         slug of a record property
#   {date::Y/m::prop}    date property, formatted
#   {prop}               raw record property
#
# [properties.photo]
# path = "users/{id}/{slug::name}-{-imgformat-}.{-ext-}"
# formats = ["original", "thumbnail", "medium"]
#
# [properties.photo.overrides.thumbnail]
# size = 150
#
# [properties.resume]
# path = "users/{id}/resume.{-ext-}"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(toml_str: &str) -> Result<StoreConfig, ConfigError> {
        resolve_config(stock_defaults_value(), Some(toml::from_str(toml_str)?))
    }

    #[test]
    fn default_config_roots() {
        let config = StoreConfig::default();
        assert_eq!(config.root, PathBuf::from("uploads"));
        assert_eq!(config.web, "/uploads/");
        assert!(config.properties.is_empty());
    }

    #[test]
    fn parses_full_example() {
        let config = parse(
            r#"
root = "files"
[formats.medium]
max_width = 800
[properties.photo]
path = "users/{id}/{slug::name}-{-imgformat-}.{-ext-}"
formats = ["original", "thumbnail", "medium"]
[properties.photo.overrides.thumbnail]
quality = 70
[properties.resume]
path = "users/{id}/resume.{-ext-}"
"#,
        )
        .unwrap();

        assert_eq!(config.root, PathBuf::from("files"));
        assert_eq!(config.web, "/uploads/", "default preserved");
        let photo = config.property("photo").unwrap();
        assert!(photo.is_image());
        assert_eq!(photo.formats.len(), 3);
        assert_eq!(photo.overrides["thumbnail"].quality, Some(70));
        assert!(!config.property("resume").unwrap().is_image());
        assert!(config.catalog().contains("medium"));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"root = "a""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"root = "b""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("root").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value = toml::from_str(
            r#"
[formats.medium]
max_width = 800
quality = 90
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[formats.medium]
quality = 60
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let medium = merged.get("formats").unwrap().get("medium").unwrap();
        assert_eq!(medium.get("quality").unwrap().as_integer(), Some(60));
        assert_eq!(medium.get("max_width").unwrap().as_integer(), Some(800));
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_top_level_key_rejected() {
        let err = parse(r#"rot = "x""#).unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_variant_key_rejected() {
        assert!(parse("[formats.medium]\nmax_widht = 10").is_err());
    }

    #[test]
    fn unknown_property_key_rejected() {
        assert!(parse("[properties.doc]\npath = \"a\"\nformat = [\"original\"]").is_err());
    }

    #[test]
    fn bad_anchor_and_color_rejected() {
        assert!(parse("[formats.medium]\ncrop_position = \"XX\"").is_err());
        assert!(parse("[formats.medium]\nbg_color = \"blue\"").is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_too_high() {
        let err = parse("[formats.medium]\nquality = 101").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("quality")));

        let err = parse(
            r#"
[properties.photo]
path = "p/{-imgformat-}.jpg"
formats = ["thumbnail"]
[properties.photo.overrides.thumbnail]
quality = 300
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn validate_unknown_format() {
        let err = parse("[properties.photo]\npath = \"p.jpg\"\nformats = [\"poster\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("poster")));
    }

    #[test]
    fn validate_unknown_override_format() {
        let result = parse(
            r#"
[properties.photo]
path = "p.jpg"
formats = ["original"]
[properties.photo.overrides.poster]
width = 10
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_multiple_formats_need_token() {
        let result = parse(
            "[properties.photo]\npath = \"p.{-ext-}\"\nformats = [\"original\", \"thumbnail\"]",
        );
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("imgformat")));

        assert!(parse("[properties.photo]\npath = \"p.{-ext-}\"\nformats = [\"thumbnail\"]").is_ok());
    }

    #[test]
    fn validate_variant_output_extension() {
        let result = parse(
            "[properties.photo]\npath = \"p-{-imgformat-}.bmp\"\nformats = [\"original\", \"thumbnail\"]",
        );
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains(".bmp")));

        assert!(parse("[properties.photo]\npath = \"p-{-imgformat-}.JPG\"\nformats = [\"thumbnail\"]").is_ok());
        assert!(parse("[properties.photo]\npath = \"p.{-ext-}\"\nformats = [\"thumbnail\"]").is_ok());
        // A byte copy keeps whatever extension it is given
        assert!(parse("[properties.photo]\npath = \"p.bmp\"\nformats = [\"original\"]").is_ok());
    }

    #[test]
    fn validate_empty_path() {
        let result = parse("[properties.photo]\npath = \"\"");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_empty_root() {
        let result = parse(r#"root = """#);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(&tmp.path().join("store.toml")).unwrap().is_none());
    }

    #[test]
    fn load_config_resolves_relative_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.toml");
        fs::write(&path, "root = \"files\"").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.root, tmp.path().join("files"));
    }

    #[test]
    fn load_config_keeps_absolute_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.toml");
        fs::write(&path, "root = \"/srv/files\"").unwrap();

        assert_eq!(load_config(&path).unwrap().root, PathBuf::from("/srv/files"));
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.toml");
        fs::write(&path, "root = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: StoreConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn stock_config_toml_documents_every_variant_key() {
        let content = stock_config_toml();
        for key in [
            "size", "width", "height", "max_size", "max_width", "max_height", "crop",
            "crop_position", "quality", "enlarge", "trim_bg", "keep_proportions", "bg_color",
        ] {
            assert!(content.contains(&format!("#   {key} = ")), "missing {key}");
        }
    }

    #[test]
    fn stock_defaults_value_is_table() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        assert_eq!(val.get("web").unwrap().as_str(), Some("/uploads/"));
    }
}
