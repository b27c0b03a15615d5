//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Formats
//!
//! ```text
//! 001 original
//!     Copied unchanged
//! 002 thumbnail
//!     Target: 100x100, crop MM
//!     Quality: 85
//!     Background: #FFFFFF
//! 003 medium
//!     Max: 800x-
//!     Quality: 85
//! ```
//!
//! ## Stored files
//!
//! ```text
//! photo → users/42/ada-{-imgformat-}.jpg
//!     Source: Me.jpg (image/jpeg, 52.3 KB)
//!     original: users/42/ada-original.jpg
//!     thumbnail: users/42/ada-thumbnail.jpg
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::formats::{FormatCatalog, FormatError, Variant, VariantOverride, VariantSpec};
use crate::store::ProcessedFileInfo;
use std::collections::BTreeMap;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `0` is printed as `-` (unconstrained).
fn dim(len: u32) -> String {
    if len == 0 {
        "-".to_string()
    } else {
        len.to_string()
    }
}

/// Human-readable byte count.
fn format_size(bytes: u64) -> String {
    match bytes {
        b if b < 1024 => format!("{b} B"),
        b if b < 1024 * 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        b => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
    }
}

/// Detail lines of one resolved variant.
fn spec_lines(spec: &VariantSpec) -> Vec<String> {
    let mut lines = Vec::new();
    let (width, height) = spec.target();
    if width > 0 || height > 0 {
        let mut target = format!("Target: {}x{}", dim(width), dim(height));
        if spec.crop {
            target.push_str(&format!(", crop {}", spec.crop_position));
        }
        if !spec.keep_proportions {
            target.push_str(", stretch");
        }
        lines.push(target);
    }
    let (max_w, max_h) = spec.max_bound();
    if max_w > 0 || max_h > 0 {
        lines.push(format!("Max: {}x{}", dim(max_w), dim(max_h)));
    }
    lines.push(format!("Quality: {}", spec.quality.value()));

    let flags: Vec<&str> = [("enlarge", spec.enlarge), ("trim_bg", spec.trim_bg)]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect();
    if !flags.is_empty() {
        lines.push(format!("Flags: {}", flags.join(", ")));
    }
    if (width > 0 || height > 0) && !spec.trim_bg {
        lines.push(format!("Background: {}", spec.bg_color));
    }
    lines
}

/// Resolved settings of `names`, as seen by a property with `overrides`.
pub fn format_formats_table(
    catalog: &FormatCatalog,
    names: &[String],
    overrides: Option<&BTreeMap<String, VariantOverride>>,
) -> Result<Vec<String>, FormatError> {
    let mut lines = Vec::new();
    for (i, name) in names.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), name));
        match catalog.resolve(name, overrides)? {
            Variant::Original => lines.push(format!("{}Copied unchanged", indent(1))),
            Variant::Resized(spec) => {
                lines.extend(spec_lines(&spec).into_iter().map(|l| format!("{}{l}", indent(1))));
            }
        }
    }
    Ok(lines)
}

pub fn print_formats_table(
    catalog: &FormatCatalog,
    names: &[String],
    overrides: Option<&BTreeMap<String, VariantOverride>>,
) -> Result<(), FormatError> {
    for line in format_formats_table(catalog, names, overrides)? {
        println!("{}", line);
    }
    Ok(())
}

/// One stored property: its filename, the source, and every written file.
pub fn format_stored(
    property: &str,
    filename: &str,
    info: &ProcessedFileInfo,
    files: &[(String, String)],
) -> Vec<String> {
    let mut lines = vec![format!("{} → {}", property, filename)];
    lines.push(format!(
        "{}Source: {} ({}, {})",
        indent(1),
        info.original_name,
        info.mime_type,
        format_size(info.size_bytes)
    ));
    for (label, path) in files {
        lines.push(format!("{}{}: {}", indent(1), label, path));
    }
    lines
}

pub fn print_stored(
    property: &str,
    filename: &str,
    info: &ProcessedFileInfo,
    files: &[(String, String)],
) {
    for line in format_stored(property, filename, info, files) {
        println!("{}", line);
    }
}
