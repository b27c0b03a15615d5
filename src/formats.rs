//! Variant formats and their layered configuration.
//!
//! A format name (`thumbnail`, `medium`, ...) resolves to a [`Variant`]: either
//! the `original` sentinel, which copies the source verbatim, or a fully
//! resolved [`VariantSpec`]. Resolution stacks partial [`VariantOverride`]
//! tiers, lowest priority first:
//!
//! 1. the fallback values ([`VariantSpec::default`])
//! 2. built-in per-format defaults (`thumbnail` is a 100px square crop)
//! 3. per-format settings from configuration (`[formats.NAME]`)
//! 4. per-property overrides (`[properties.P.overrides.NAME]`)
//!
//! Each tier only replaces the keys it sets.

use crate::imaging::{Anchor, Color, Quality};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Format name that copies the source unchanged.
pub const ORIGINAL: &str = "original";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown format: the format [{0}] isn't registered")]
    InvalidFormat(String),
}

/// One partial tier of variant settings. Unset keys fall through to the
/// tier below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_position: Option<Anchor>,
    /// Raw value; validated against 0..=100 when loading config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enlarge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_bg: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_proportions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Color>,
}

impl VariantOverride {
    /// Stack `over` on top of `self`: keys set in `over` win.
    pub fn layer(&self, over: &VariantOverride) -> VariantOverride {
        VariantOverride {
            size: over.size.or(self.size),
            width: over.width.or(self.width),
            height: over.height.or(self.height),
            max_size: over.max_size.or(self.max_size),
            max_width: over.max_width.or(self.max_width),
            max_height: over.max_height.or(self.max_height),
            crop: over.crop.or(self.crop),
            crop_position: over.crop_position.or(self.crop_position),
            quality: over.quality.or(self.quality),
            enlarge: over.enlarge.or(self.enlarge),
            trim_bg: over.trim_bg.or(self.trim_bg),
            keep_proportions: over.keep_proportions.or(self.keep_proportions),
            bg_color: over.bg_color.or(self.bg_color),
        }
    }

    /// Fill every key of `base` that this tier sets.
    pub fn apply_to(&self, base: VariantSpec) -> VariantSpec {
        VariantSpec {
            size: self.size.unwrap_or(base.size),
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            max_size: self.max_size.unwrap_or(base.max_size),
            max_width: self.max_width.unwrap_or(base.max_width),
            max_height: self.max_height.unwrap_or(base.max_height),
            crop: self.crop.unwrap_or(base.crop),
            crop_position: self.crop_position.unwrap_or(base.crop_position),
            quality: self.quality.map(Quality::new).unwrap_or(base.quality),
            enlarge: self.enlarge.unwrap_or(base.enlarge),
            trim_bg: self.trim_bg.unwrap_or(base.trim_bg),
            keep_proportions: self.keep_proportions.unwrap_or(base.keep_proportions),
            bg_color: self.bg_color.unwrap_or(base.bg_color),
        }
    }
}

/// Fully resolved settings for one resized variant.
///
/// `0` for any dimension means "not set".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariantSpec {
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub max_size: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub crop: bool,
    pub crop_position: Anchor,
    pub quality: Quality,
    pub enlarge: bool,
    pub trim_bg: bool,
    pub keep_proportions: bool,
    pub bg_color: Color,
}

impl Default for VariantSpec {
    fn default() -> Self {
        Self {
            size: 0,
            width: 0,
            height: 0,
            max_size: 0,
            max_width: 0,
            max_height: 0,
            crop: false,
            crop_position: Anchor::CENTER,
            quality: Quality::default(),
            enlarge: false,
            trim_bg: false,
            keep_proportions: true,
            bg_color: Color::WHITE,
        }
    }
}

impl VariantSpec {
    /// Exact-size target; `size` takes precedence over `width`/`height`.
    pub fn target(&self) -> (u32, u32) {
        if self.size > 0 {
            (self.size, self.size)
        } else {
            (self.width, self.height)
        }
    }

    /// Upper bound; `max_size` takes precedence over `max_width`/`max_height`.
    pub fn max_bound(&self) -> (u32, u32) {
        if self.max_size > 0 {
            (self.max_size, self.max_size)
        } else {
            (self.max_width, self.max_height)
        }
    }
}

/// What to produce for one format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Copy the source byte for byte.
    Original,
    Resized(VariantSpec),
}

fn builtin(name: &str) -> Option<VariantOverride> {
    match name {
        "thumbnail" => Some(VariantOverride {
            size: Some(100),
            crop: Some(true),
            ..Default::default()
        }),
        _ => None,
    }
}

const BUILTIN_NAMES: &[&str] = &["thumbnail"];

/// Registry of known format names and their per-format settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatCatalog {
    configured: BTreeMap<String, VariantOverride>,
}

impl FormatCatalog {
    pub fn new(configured: BTreeMap<String, VariantOverride>) -> Self {
        Self { configured }
    }

    pub fn contains(&self, name: &str) -> bool {
        name == ORIGINAL || builtin(name).is_some() || self.configured.contains_key(name)
    }

    /// Every known format name, `original` first, the rest sorted.
    pub fn names(&self) -> Vec<String> {
        let mut rest: Vec<String> = BUILTIN_NAMES
            .iter()
            .map(|s| s.to_string())
            .chain(self.configured.keys().cloned())
            .filter(|n| n != ORIGINAL)
            .collect();
        rest.sort();
        rest.dedup();

        std::iter::once(ORIGINAL.to_string()).chain(rest).collect()
    }

    /// Resolve `name`, applying the per-property overrides if given.
    pub fn resolve(
        &self,
        name: &str,
        property_overrides: Option<&BTreeMap<String, VariantOverride>>,
    ) -> Result<Variant, FormatError> {
        if name == ORIGINAL {
            return Ok(Variant::Original);
        }
        if !self.contains(name) {
            return Err(FormatError::InvalidFormat(name.to_string()));
        }

        let tiers = [
            builtin(name),
            self.configured.get(name).cloned(),
            property_overrides.and_then(|o| o.get(name)).cloned(),
        ];
        let merged = tiers
            .iter()
            .flatten()
            .fold(VariantOverride::default(), |acc, tier| acc.layer(tier));

        Ok(Variant::Resized(merged.apply_to(VariantSpec::default())))
    }
}
