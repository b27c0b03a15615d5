//! The record-side contract: what the store needs to read from and write to
//! the application's data records.
//!
//! Records are owned and persisted elsewhere. The store only talks to them
//! through two traits:
//!
//! - [`EntityProperties`]: read a named scalar or date property (used by
//!   path templates), plus an optional per-property custom path.
//! - [`FileEntity`]: read/write the stored relative filename of a file
//!   property, and hand over a pending file waiting to be stored.
//!
//! [`Record`] is a map-backed implementation used by the CLI and the tests;
//! applications implement the traits on their own types.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Value of a named property as seen by path templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Date(NaiveDateTime),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(s) => f.write_str(s),
            PropertyValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<NaiveDateTime> for PropertyValue {
    fn from(value: NaiveDateTime) -> Self {
        PropertyValue::Date(value)
    }
}

/// Read access to a record's named properties.
pub trait EntityProperties {
    /// Look up a property. `None` means the record has no such property.
    fn get(&self, name: &str) -> Option<PropertyValue>;

    /// Custom path fragment for `{-custom-}`.
    ///
    /// Records without the capability return `None`, which leaves the token
    /// untouched in the expanded path.
    fn custom_path(&self, _property: &str) -> Option<String> {
        None
    }
}

/// A file sent by a client and waiting in a temporary location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Where the upload currently sits on disk.
    pub path: PathBuf,
    /// Filename as supplied by the client.
    pub client_name: String,
    /// Mime type as declared by the client, if any.
    pub client_mime: Option<String>,
}

/// A file attached to a record but not stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingFile {
    /// Moved into place; the upload location is consumed.
    Upload(UploadedFile),
    /// Copied into place; the source stays where it is.
    Path(PathBuf),
}

/// Read/write access to the file bookkeeping of a record.
pub trait FileEntity: EntityProperties {
    /// Stored relative filename of `property`, possibly still containing
    /// `{-imgformat-}`.
    fn filename(&self, property: &str) -> Option<String>;

    fn set_filename(&mut self, property: &str, filename: Option<String>);

    /// Take the pending file of `property`, leaving nothing behind.
    fn take_pending(&mut self, property: &str) -> Option<PendingFile>;

    /// Put a pending file back, used when storing it failed.
    fn restore_pending(&mut self, property: &str, file: PendingFile);
}

/// Map-backed record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<String, PropertyValue>,
    custom_paths: BTreeMap<String, String>,
    filenames: BTreeMap<String, String>,
    pending: BTreeMap<String, PendingFile>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_custom_path(mut self, property: &str, path: &str) -> Self {
        self.custom_paths
            .insert(property.to_string(), path.to_string());
        self
    }

    pub fn with_filename(mut self, property: &str, filename: &str) -> Self {
        self.filenames
            .insert(property.to_string(), filename.to_string());
        self
    }

    pub fn with_pending(mut self, property: &str, file: PendingFile) -> Self {
        self.pending.insert(property.to_string(), file);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn pending(&self, property: &str) -> Option<&PendingFile> {
        self.pending.get(property)
    }
}

impl EntityProperties for Record {
    fn get(&self, name: &str) -> Option<PropertyValue> {
        self.values.get(name).cloned()
    }

    fn custom_path(&self, property: &str) -> Option<String> {
        self.custom_paths.get(property).cloned()
    }
}

impl FileEntity for Record {
    fn filename(&self, property: &str) -> Option<String> {
        self.filenames.get(property).cloned()
    }

    fn set_filename(&mut self, property: &str, filename: Option<String>) {
        match filename {
            Some(f) => {
                self.filenames.insert(property.to_string(), f);
            }
            None => {
                self.filenames.remove(property);
            }
        }
    }

    fn take_pending(&mut self, property: &str) -> Option<PendingFile> {
        self.pending.remove(property)
    }

    fn restore_pending(&mut self, property: &str, file: PendingFile) {
        self.pending.insert(property.to_string(), file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn record_reads_text_and_dates() {
        let created = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        let record = Record::new().with("name", "Ada").with("created", created);

        assert_eq!(record.get("name"), Some(PropertyValue::Text("Ada".into())));
        assert_eq!(record.get("created"), Some(PropertyValue::Date(created)));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn record_custom_path_is_per_property() {
        let record = Record::new().with_custom_path("photo", "custom/dir");
        assert_eq!(record.custom_path("photo").as_deref(), Some("custom/dir"));
        assert_eq!(record.custom_path("resume"), None);
    }

    #[test]
    fn set_filename_none_clears() {
        let mut record = Record::new().with_filename("photo", "a.jpg");
        record.set_filename("photo", None);
        assert_eq!(record.filename("photo"), None);
    }

    #[test]
    fn take_pending_empties_slot() {
        let mut record = Record::new().with_pending("doc", PendingFile::Path("/tmp/a.pdf".into()));
        assert!(record.take_pending("doc").is_some());
        assert!(record.take_pending("doc").is_none());
    }

    #[test]
    fn date_display_is_iso_like() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(PropertyValue::Date(d).to_string(), "2020-01-02 03:04:05");
    }
}
