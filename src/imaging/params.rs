//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the variant policies in [`operations`](super::operations)
//! (which decide which steps to run) and the [`backend`](super::backend)
//! (which does the pixel work). Swapping the backend for a recording mock
//! leaves the policy logic untouched.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`Anchor`]: Two-letter alignment code (`LT` … `RB`) used for crops and canvases.
//! - [`Color`]: Opaque RGB fill color, written `#RRGGBB` or `#RGB`.
//! - [`ResizeParams`]: Target width/height (either optional) and proportion handling.
//! - [`CropParams`]: Exact crop box and its anchor.
//! - [`CanvasParams`]: Canvas size, fill color, and where the image sits on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("invalid anchor {0:?}: expected two letters, L/M/R then T/M/B (e.g. \"MM\")")]
    Anchor(String),
    #[error("invalid color {0:?}: expected #RRGGBB or #RGB")]
    Color(String),
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// Placement along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Middle,
    End,
}

impl Align {
    /// Offset of an `inner`-long span inside an `outer`-long one.
    ///
    /// Negative when the inner span is larger (it overhangs the start).
    pub fn offset(self, outer: u32, inner: u32) -> i64 {
        let free = outer as i64 - inner as i64;
        match self {
            Align::Start => 0,
            Align::Middle => free / 2,
            Align::End => free,
        }
    }
}

/// 2D alignment: horizontal (`L`, `M`, `R`) then vertical (`T`, `M`, `B`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Anchor {
    pub horizontal: Align,
    pub vertical: Align,
}

impl Anchor {
    pub const CENTER: Anchor = Anchor {
        horizontal: Align::Middle,
        vertical: Align::Middle,
    };

    /// Top-left corner of an `inner` box placed inside `outer`.
    pub fn offset(self, outer: (u32, u32), inner: (u32, u32)) -> (i64, i64) {
        (
            self.horizontal.offset(outer.0, inner.0),
            self.vertical.offset(outer.1, inner.1),
        )
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::CENTER
    }
}

impl FromStr for Anchor {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() != 2 {
            return Err(ParamError::Anchor(s.to_string()));
        }
        let horizontal = match bytes[0] {
            b'L' => Align::Start,
            b'M' => Align::Middle,
            b'R' => Align::End,
            _ => return Err(ParamError::Anchor(s.to_string())),
        };
        let vertical = match bytes[1] {
            b'T' => Align::Start,
            b'M' => Align::Middle,
            b'B' => Align::End,
            _ => return Err(ParamError::Anchor(s.to_string())),
        };
        Ok(Anchor {
            horizontal,
            vertical,
        })
    }
}

impl TryFrom<String> for Anchor {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = match self.horizontal {
            Align::Start => 'L',
            Align::Middle => 'M',
            Align::End => 'R',
        };
        let v = match self.vertical {
            Align::Start => 'T',
            Align::Middle => 'M',
            Align::End => 'B',
        };
        write!(f, "{h}{v}")
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        anchor.to_string()
    }
}

/// Opaque fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    };

    pub fn rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0xff]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for Color {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let err = || ParamError::Color(s.to_string());

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| err());

        match hex.len() {
            6 => Ok(Color {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            3 => {
                // #abc is shorthand for #aabbcc
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Ok(Color {
                    r: expand(0)?,
                    g: expand(1)?,
                    b: expand(2)?,
                })
            }
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ParamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Parameters for a resize step.
///
/// - Only one side given: that side is set; the other follows the aspect
///   ratio when `keep_proportions`, or stays as it is otherwise.
/// - Both sides, `keep_proportions`: the image is fitted inside the box and
///   padded (transparent) to exactly the box, placed at `anchor`.
/// - Both sides, no `keep_proportions`: stretched to the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub keep_proportions: bool,
    pub anchor: Anchor,
}

/// Parameters for cutting an exact box out of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropParams {
    pub width: u32,
    pub height: u32,
    pub anchor: Anchor,
}

/// Parameters for placing an image on a filled canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasParams {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub anchor: Anchor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_85() {
        assert_eq!(Quality::default().value(), 85);
    }

    #[test]
    fn anchor_parses_codes() {
        assert_eq!("MM".parse::<Anchor>().unwrap(), Anchor::CENTER);
        let lt: Anchor = "lt".parse().unwrap();
        assert_eq!(lt.horizontal, Align::Start);
        assert_eq!(lt.vertical, Align::Start);
        let rb: Anchor = "RB".parse().unwrap();
        assert_eq!(rb.to_string(), "RB");
    }

    #[test]
    fn anchor_rejects_bad_codes() {
        assert!("TL".parse::<Anchor>().is_err());
        assert!("M".parse::<Anchor>().is_err());
        assert!("MMM".parse::<Anchor>().is_err());
    }

    #[test]
    fn anchor_offsets() {
        let outer = (100, 50);
        let inner = (40, 10);
        assert_eq!(Anchor::CENTER.offset(outer, inner), (30, 20));
        assert_eq!("LT".parse::<Anchor>().unwrap().offset(outer, inner), (0, 0));
        assert_eq!("RB".parse::<Anchor>().unwrap().offset(outer, inner), (60, 40));
    }

    #[test]
    fn anchor_offset_negative_when_inner_larger() {
        assert_eq!(Anchor::CENTER.offset((10, 10), (30, 10)), (-10, 0));
    }

    #[test]
    fn color_parses_long_and_short_forms() {
        assert_eq!(
            "#FF8000".parse::<Color>().unwrap(),
            Color {
                r: 255,
                g: 128,
                b: 0
            }
        );
        assert_eq!("fff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("#0a0B0c".parse::<Color>().unwrap().to_string(), "#0A0B0C");
    }

    #[test]
    fn color_rejects_garbage() {
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GGGGGG".parse::<Color>().is_err());
        assert!("white".parse::<Color>().is_err());
    }
}
