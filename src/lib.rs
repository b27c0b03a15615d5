//! # Simple Attach
//!
//! Stores files attached to application records. Each managed file property
//! has a path template and, for images, a list of formats; storing a file
//! expands the template against the record and writes one rendition per
//! format.
//!
//! ```text
//! record + incoming file
//!     │
//!     ├─ template   users/{id}/{slug::name}-{-imgformat-}.{-ext-}
//!     │             → users/42/ada-lovelace-{-imgformat-}.jpg   (stored on the record)
//!     │
//!     └─ formats    original  → users/42/ada-lovelace-original.jpg   (byte copy)
//!                   thumbnail → users/42/ada-lovelace-thumbnail.jpg  (100px square crop)
//!                   medium    → users/42/ada-lovelace-medium.jpg     (max_width 800)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`template`] | Path template expansion (`{-ext-}`, `{slug::prop}`, `{date::FMT::prop}`, ...) |
//! | [`formats`] | Format catalog and layered variant settings |
//! | [`imaging`] | Variant policies (exact size, background fill, max bound) over an [`imaging::ImageBackend`] |
//! | [`store`] | Store, replace and remove files of a record, with rollback per property |
//! | [`entity`] | The record-side traits and a map-backed [`entity::Record`] |
//! | [`config`] | `store.toml` loading, merging over stock defaults, validation |
//! | [`naming`] | Slugs and filename parts |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Policies Over Flags
//!
//! A variant is described by a dozen interacting settings (`crop`, `enlarge`,
//! `trim_bg`, `keep_proportions`, ...). Rendering is split into three small
//! policies run in a fixed order, each only talking to the backend trait, so
//! every flag combination is tested against a recording mock without decoding
//! a single pixel.
//!
//! ## Records Stay Outside
//!
//! The store never persists records. It reads properties and pending files,
//! and writes back the stored filename, through [`entity::FileEntity`].
//! The filename keeps its `{-imgformat-}` token so one value locates every
//! rendition.
//!
//! ## Pure-Rust Imaging
//!
//! [`imaging::RustBackend`] uses the `image` crate (Lanczos3 resampling,
//! rav1e for AVIF). No system libraries are needed.

pub mod config;
pub mod entity;
pub mod formats;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod store;
pub mod template;

#[cfg(test)]
pub(crate) mod test_helpers;
