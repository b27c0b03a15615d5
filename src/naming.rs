//! Centralized filename handling.
//!
//! Path templates, stored-file bookkeeping and the CLI all need the same few
//! answers about a filename: its extension, its stem, its basename, and a
//! URL-safe slug. They live here so every caller splits names the same way.
//!
//! ## Slugs
//!
//! A slug is the lowercase, trimmed input with every character outside
//! `[a-z0-9-]` replaced by `-`, then runs of `-` collapsed into one:
//! - `"My Photo! 2024"` → `"my-photo-2024"`
//! - `"a---b"` → `"a-b"`
//! - `"  Été  "` → `"-t-"`

/// Characters stripped from both ends before slugging.
const TRIMMED: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Turn an arbitrary string into a path-safe slug.
///
/// Only ASCII letters are lowercased; any other character becomes `-`.
pub fn slug(input: &str) -> String {
    let lowered = input.trim_matches(TRIMMED).to_ascii_lowercase();
    let mut out = String::with_capacity(lowered.len());

    for c in lowered.chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }

    out
}

/// Final path component of `name` (`"a/b/photo.jpg"` → `"photo.jpg"`).
pub fn file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Extension without the dot, or `""` when the name has none.
///
/// Leading dots do not start an extension: `".hidden"` has none.
pub fn file_extension(name: &str) -> &str {
    let base = file_name(name);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(pos) => &base[pos + 1..],
    }
}

/// Basename with its extension removed (`"dir/My Photo.jpeg"` → `"My Photo"`).
pub fn file_stem(name: &str) -> &str {
    let base = file_name(name);
    match base.rfind('.') {
        Some(0) | None => base,
        Some(pos) => &base[..pos],
    }
}
