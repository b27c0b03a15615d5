//! Destination path templates.
//!
//! A template is a relative path with `{...}` placeholders, expanded once per
//! file operation against a record and the name of the incoming file:
//!
//! | Token | Replaced with |
//! |---|---|
//! | `{-ext-}` | extension of the source filename, without the dot |
//! | `{-origin-}` | slug of the source filename stem |
//! | `{-custom-}` | the record's custom path for the property (left as-is if the record has none) |
//! | `{slug::prop}` | slug of property `prop` |
//! | `{date::FMT::prop}` | date property `prop` formatted with `FMT` |
//! | `{prop}` | raw value of property `prop` |
//! | `{-imgformat-}` | left in place; substituted per variant by [`apply_format`] |
//!
//! Tokens are resolved in the order of the table, each as one left-to-right
//! pass over the whole string. Property names cannot contain `-` or `}`, so
//! the dashed built-in tokens never collide with property placeholders.
//!
//! ## Date formats
//!
//! `FMT` uses single-letter date codes: `Y` (2024), `y` (24), `m` (03), `n`
//! (3), `d` (09), `j` (9), `H` (08), `G` (8), `h` (08, 12-hour), `g`, `i`
//! (minutes), `s` (seconds), `A`/`a` (AM/am), `M` (Mar), `F` (March), `D`
//! (Sat), `l` (Saturday), `N` (ISO weekday 1-7), `w` (weekday 0-6), `z` (day
//! of year from 0), `U` (unix timestamp). A backslash emits the next
//! character literally; anything else is copied through.

use crate::entity::{EntityProperties, PropertyValue};
use crate::formats::FormatCatalog;
use crate::naming::{file_extension, file_stem, slug};
use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Placeholder substituted per variant after expansion.
pub const FORMAT_TOKEN: &str = "{-imgformat-}";

const EXT_TOKEN: &str = "{-ext-}";
const ORIGIN_TOKEN: &str = "{-origin-}";
const CUSTOM_TOKEN: &str = "{-custom-}";

static SLUG_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{slug::([^}-]+)\}").expect("slug placeholder pattern must compile")
});

static DATE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{date::([^}-]+)::([^}-]+)\}").expect("date placeholder pattern must compile")
});

static PROPERTY_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^}-]+)\}").expect("property placeholder pattern must compile")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("property not found: {0}")]
    PropertyNotFound(String),
    #[error("property {0} is not a date")]
    NotADate(String),
    #[error("unknown format: the format [{0}] isn't registered")]
    InvalidFormat(String),
}

/// A destination path pattern as authored in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathTemplate(String);

impl PathTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether per-variant paths differ, i.e. the pattern has `{-imgformat-}`.
    pub fn has_format_token(&self) -> bool {
        self.0.contains(FORMAT_TOKEN)
    }

    /// Expand against `entity` for a file of `property` named `source_name`.
    pub fn expand(
        &self,
        entity: &impl EntityProperties,
        property: &str,
        source_name: Option<&str>,
    ) -> Result<String, TemplateError> {
        expand(&self.0, entity, property, source_name)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Expand every placeholder of `template` except `{-imgformat-}`.
///
/// Without a `source_name`, `{-ext-}` and `{-origin-}` stay in the output.
pub fn expand(
    template: &str,
    entity: &impl EntityProperties,
    property: &str,
    source_name: Option<&str>,
) -> Result<String, TemplateError> {
    let mut path = template.to_string();

    if let Some(name) = source_name {
        path = path.replace(EXT_TOKEN, file_extension(name));
        path = path.replace(ORIGIN_TOKEN, &slug(file_stem(name)));
    }
    if let Some(custom) = entity.custom_path(property) {
        path = path.replace(CUSTOM_TOKEN, &custom);
    }

    path = replace_all(&SLUG_PLACEHOLDER, &path, |caps| {
        Ok(slug(&lookup(entity, &caps[1])?.to_string()))
    })?;

    path = replace_all(&DATE_PLACEHOLDER, &path, |caps| {
        match lookup(entity, &caps[2])? {
            PropertyValue::Date(date) => Ok(format_date(&caps[1], &date)),
            PropertyValue::Text(_) => Err(TemplateError::NotADate(caps[2].to_string())),
        }
    })?;

    replace_all(&PROPERTY_PLACEHOLDER, &path, |caps| {
        Ok(lookup(entity, &caps[1])?.to_string())
    })
}

/// Substitute `{-imgformat-}` with `format`, which must be in the catalog.
pub fn apply_format(
    path: &str,
    format: &str,
    catalog: &FormatCatalog,
) -> Result<String, TemplateError> {
    if !catalog.contains(format) {
        return Err(TemplateError::InvalidFormat(format.to_string()));
    }
    Ok(path.replace(FORMAT_TOKEN, format))
}

fn lookup(entity: &impl EntityProperties, name: &str) -> Result<PropertyValue, TemplateError> {
    entity
        .get(name)
        .ok_or_else(|| TemplateError::PropertyNotFound(name.to_string()))
}

/// `Regex::replace_all` with a fallible replacement.
fn replace_all(
    re: &Regex,
    input: &str,
    mut replacement: impl FnMut(&Captures) -> Result<String, TemplateError>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in re.captures_iter(input) {
        let whole = caps.get(0).expect("capture group 0 always matches");
        out.push_str(&input[last..whole.start()]);
        out.push_str(&replacement(&caps)?);
        last = whole.end();
    }
    out.push_str(&input[last..]);

    Ok(out)
}

/// Render `date` with single-letter date codes (see the module docs).
pub fn format_date(format: &str, date: &NaiveDateTime) -> String {
    let mut out = String::new();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            'Y' => out.push_str(&date.year().to_string()),
            'y' => out.push_str(&format!("{:02}", date.year().rem_euclid(100))),
            'm' => out.push_str(&format!("{:02}", date.month())),
            'n' => out.push_str(&date.month().to_string()),
            'd' => out.push_str(&format!("{:02}", date.day())),
            'j' => out.push_str(&date.day().to_string()),
            'H' => out.push_str(&format!("{:02}", date.hour())),
            'G' => out.push_str(&date.hour().to_string()),
            'h' => out.push_str(&format!("{:02}", date.hour12().1)),
            'g' => out.push_str(&date.hour12().1.to_string()),
            'i' => out.push_str(&format!("{:02}", date.minute())),
            's' => out.push_str(&format!("{:02}", date.second())),
            'A' => out.push_str(if date.hour12().0 { "PM" } else { "AM" }),
            'a' => out.push_str(if date.hour12().0 { "pm" } else { "am" }),
            'M' => out.push_str(&date.format("%b").to_string()),
            'F' => out.push_str(&date.format("%B").to_string()),
            'D' => out.push_str(&date.format("%a").to_string()),
            'l' => out.push_str(&date.format("%A").to_string()),
            'N' => out.push_str(&date.weekday().number_from_monday().to_string()),
            'w' => out.push_str(&date.weekday().num_days_from_sunday().to_string()),
            'z' => out.push_str(&date.ordinal0().to_string()),
            'U' => out.push_str(&date.and_utc().timestamp().to_string()),
            other => out.push(other),
        }
    }

    out
}
