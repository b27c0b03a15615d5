//! File store: puts files attached to records in place.
//!
//! The store owns no records. It reads pending files and stored filenames
//! through [`FileEntity`], expands each property's [`PathTemplate`] into a
//! destination relative to the configured root, and either moves/copies the
//! file there (plain properties) or renders every configured format through
//! the [`VariantEngine`] (image properties).
//!
//! ## Consistency
//!
//! Each property is stored all-or-nothing. Every file written for it is
//! tracked; on failure those files are deleted, the record's stored filename
//! is left as it was, and a consumed upload is put back. The source itself is
//! never deleted by a rollback, even when it already sat at a destination.
//!
//! Files of the previous filename are only deleted once the new set is
//! complete, and that cleanup is best-effort: a leftover old file is logged,
//! it does not fail a store that already succeeded.
//!
//! [`PathTemplate`]: crate::template::PathTemplate

use crate::config::{PropertyConfig, StoreConfig};
use crate::entity::{FileEntity, PendingFile, UploadedFile};
use crate::formats::FormatError;
use crate::imaging::operations::is_same_file;
use crate::imaging::{BackendError, EngineError, ImageBackend, VariantEngine};
use crate::naming::{file_extension, file_name};
use crate::template::{TemplateError, apply_format};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("property {0} is not managed by the store")]
    UnknownProperty(String),
    #[error("property {0} has no image formats")]
    NotAnImageProperty(String),
}

impl From<EngineError> for StoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Format(e) => StoreError::Format(e),
            EngineError::Backend(e) => StoreError::Backend(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// What was stored, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedFileInfo {
    pub extension: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

/// How [`FileStore::replace_file`] treats its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileOperation {
    /// Leave the source in place.
    #[default]
    Copy,
    /// Consume the source.
    Rename,
}

pub struct FileStore<B> {
    config: StoreConfig,
    engine: VariantEngine<B>,
}

impl<B: ImageBackend> FileStore<B> {
    pub fn new(config: StoreConfig, backend: B) -> Self {
        let engine = VariantEngine::new(backend, config.catalog());
        Self { config, engine }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn engine(&self) -> &VariantEngine<B> {
        &self.engine
    }

    /// Managed properties, sorted by name.
    pub fn file_properties(&self) -> Vec<&str> {
        self.config.properties.keys().map(String::as_str).collect()
    }

    fn property(&self, name: &str) -> Result<&PropertyConfig> {
        self.config
            .property(name)
            .ok_or_else(|| StoreError::UnknownProperty(name.to_string()))
    }

    /// Expand the destination template of `property` for an incoming file.
    pub fn build_destination(
        &self,
        entity: &impl FileEntity,
        property: &str,
        source_name: Option<&str>,
    ) -> Result<String> {
        let config = self.property(property)?;
        Ok(config.path.expand(entity, property, source_name)?)
    }

    /// Stored filename of `property`, with `{-imgformat-}` filled in when a
    /// format is given.
    fn stored_name(
        &self,
        entity: &impl FileEntity,
        property: &str,
        format: Option<&str>,
    ) -> Result<Option<String>> {
        let config = self.property(property)?;
        let Some(filename) = entity.filename(property) else {
            return Ok(None);
        };
        match format {
            None => Ok(Some(filename)),
            Some(_) if !config.is_image() => Err(StoreError::NotAnImageProperty(property.to_string())),
            Some(format) => Ok(Some(apply_format(&filename, format, self.engine.catalog())?)),
        }
    }

    /// Filesystem path of a stored file. `None` if nothing is stored.
    pub fn absolute_path(
        &self,
        entity: &impl FileEntity,
        property: &str,
        format: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        Ok(self
            .stored_name(entity, property, format)?
            .map(|name| self.config.root.join(name)))
    }

    /// Public URL path of a stored file. `None` if nothing is stored.
    pub fn web_path(
        &self,
        entity: &impl FileEntity,
        property: &str,
        format: Option<&str>,
    ) -> Result<Option<String>> {
        let web = &self.config.web;
        Ok(self.stored_name(entity, property, format)?.map(|name| {
            if web.is_empty() {
                name
            } else {
                format!(
                    "{}/{}",
                    web.trim_end_matches('/'),
                    name.trim_start_matches('/')
                )
            }
        }))
    }

    /// Store every pending file of `entity`.
    ///
    /// Returns what was stored, by property. The first failing property
    /// aborts the call; its pending file is handed back to the entity and
    /// properties stored before it stay stored.
    pub fn store_files<E: FileEntity>(
        &self,
        entity: &mut E,
    ) -> Result<BTreeMap<String, ProcessedFileInfo>> {
        let mut stored = BTreeMap::new();
        let properties: Vec<String> = self.config.properties.keys().cloned().collect();

        for property in properties {
            let Some(pending) = entity.take_pending(&property) else {
                continue;
            };
            match self.store_pending(entity, &property, &pending) {
                Ok(info) => {
                    stored.insert(property, info);
                }
                Err(e) => {
                    entity.restore_pending(&property, pending);
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    fn store_pending<E: FileEntity>(
        &self,
        entity: &mut E,
        property: &str,
        pending: &PendingFile,
    ) -> Result<ProcessedFileInfo> {
        match pending {
            PendingFile::Upload(upload) => self.store_upload(entity, property, upload),
            PendingFile::Path(source) => {
                let name = file_name(&source.to_string_lossy()).to_string();
                let dest = strip_query(&self.build_destination(&*entity, property, Some(&name))?);
                let info = file_info(source, &name, None)?;
                self.write_property(entity, property, &dest, source, Transfer::Copy, None)?;
                Ok(info)
            }
        }
    }

    fn store_upload<E: FileEntity>(
        &self,
        entity: &mut E,
        property: &str,
        upload: &UploadedFile,
    ) -> Result<ProcessedFileInfo> {
        let dest = self.build_destination(&*entity, property, Some(&upload.client_name))?;
        let info = file_info(
            &upload.path,
            file_name(&upload.client_name),
            upload.client_mime.as_deref(),
        )?;
        self.write_property(entity, property, &dest, &upload.path, Transfer::Move, None)?;
        Ok(info)
    }

    /// Replace the stored file of `property` with `source`.
    ///
    /// `dest` overrides the expanded template. `formats` restricts which
    /// formats of an image property are rendered (and which old ones are
    /// deleted). Returns `Ok(None)` when `source` is not a file.
    pub fn replace_file<E: FileEntity>(
        &self,
        entity: &mut E,
        property: &str,
        source: &Path,
        dest: Option<&str>,
        operation: FileOperation,
        formats: Option<&[String]>,
    ) -> Result<Option<ProcessedFileInfo>> {
        let config = self.property(property)?;
        if !source.is_file() {
            return Ok(None);
        }
        if formats.is_some() && !config.is_image() {
            return Err(StoreError::NotAnImageProperty(property.to_string()));
        }

        let name = file_name(&source.to_string_lossy()).to_string();
        let dest = match dest {
            Some(d) => d.to_string(),
            None => self.build_destination(&*entity, property, Some(&name))?,
        };
        let info = file_info(source, &name, None)?;
        let transfer = match operation {
            FileOperation::Copy => Transfer::Copy,
            FileOperation::Rename => Transfer::Move,
        };

        self.write_property(entity, property, &dest, source, transfer, formats)?;
        Ok(Some(info))
    }

    /// Detach files from `entity`.
    ///
    /// An empty `properties` list means every managed property. With `erase`
    /// the files of every format are deleted from disk as well.
    pub fn remove_files<E: FileEntity>(
        &self,
        entity: &mut E,
        properties: &[&str],
        erase: bool,
    ) -> Result<()> {
        let names: Vec<&str> = if properties.is_empty() {
            self.file_properties()
        } else {
            properties.to_vec()
        };

        for property in names {
            let config = self.property(property)?;
            let Some(filename) = entity.filename(property) else {
                continue;
            };
            if erase {
                for path in self.stored_paths(config, &filename, &config.formats)? {
                    remove_if_exists(&path)?;
                }
            }
            entity.set_filename(property, None);
            debug!(property, erase, "removed file");
        }
        Ok(())
    }

    /// Every on-disk path of a stored filename, one per format.
    fn stored_paths(
        &self,
        config: &PropertyConfig,
        filename: &str,
        formats: &[String],
    ) -> Result<Vec<PathBuf>> {
        if !config.is_image() {
            return Ok(vec![self.config.root.join(filename)]);
        }
        formats
            .iter()
            .map(|format| {
                let name = apply_format(filename, format, self.engine.catalog())?;
                Ok(self.config.root.join(name))
            })
            .collect()
    }

    /// Write all files of `property` to `dest`, then swap the entity over.
    fn write_property<E: FileEntity>(
        &self,
        entity: &mut E,
        property: &str,
        dest: &str,
        source: &Path,
        transfer: Transfer,
        formats: Option<&[String]>,
    ) -> Result<()> {
        let config = self.property(property)?;
        let formats = formats.unwrap_or(config.formats.as_slice());
        let mut written = Vec::new();

        if let Err(e) = self.write_files(config, dest, source, transfer, formats, &mut written) {
            for path in written.iter().filter(|p| !is_same_file(p, source)) {
                if let Err(err) = remove_if_exists(path) {
                    warn!(path = %path.display(), error = %err, "cleanup failed");
                }
            }
            return Err(e);
        }

        if let Some(previous) = entity.filename(property) {
            self.remove_previous(config, &previous, formats, &written);
        }
        entity.set_filename(property, Some(dest.to_string()));
        info!(property, dest, files = written.len(), "stored");
        Ok(())
    }

    /// Delete the files of a replaced filename that the new set did not
    /// overwrite. Failures are logged and skipped.
    fn remove_previous(
        &self,
        config: &PropertyConfig,
        previous: &str,
        formats: &[String],
        written: &[PathBuf],
    ) {
        let paths = match self.stored_paths(config, previous, formats) {
            Ok(paths) => paths,
            Err(err) => {
                warn!(previous, error = %err, "cannot locate previous files");
                return;
            }
        };
        for path in paths.iter().filter(|p| !written.contains(*p)) {
            if let Err(err) = remove_if_exists(path) {
                warn!(path = %path.display(), error = %err, "previous file left behind");
            }
        }
    }

    fn write_files(
        &self,
        config: &PropertyConfig,
        dest: &str,
        source: &Path,
        transfer: Transfer,
        formats: &[String],
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        if !config.is_image() {
            let target = self.config.root.join(dest);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            written.push(target.clone());
            if is_same_file(source, &target) {
                debug!(target = %target.display(), "source already in place");
                return Ok(());
            }
            match transfer {
                Transfer::Copy => {
                    fs::copy(source, &target)?;
                }
                Transfer::Move => move_file(source, &target)?,
            }
            return Ok(());
        }

        match transfer {
            Transfer::Copy => self.render_formats(config, dest, source, formats, written),
            Transfer::Move => {
                // Render from a private copy under root/tmp; the source is
                // consumed only when every format succeeded
                let tmp_root = self.config.root.join("tmp");
                fs::create_dir_all(&tmp_root)?;
                let staging = tempfile::Builder::new()
                    .prefix("upload-")
                    .tempdir_in(&tmp_root)?;
                let staged = staging.path().join(file_name(&source.to_string_lossy()));
                move_file(source, &staged)?;

                let result = self.render_formats(config, dest, &staged, formats, written);
                if result.is_err() {
                    if let Err(err) = move_file(&staged, source) {
                        warn!(source = %source.display(), error = %err, "could not restore source");
                    }
                }
                result
            }
        }
    }

    fn render_formats(
        &self,
        config: &PropertyConfig,
        dest: &str,
        source: &Path,
        formats: &[String],
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        for format in formats {
            let target = self
                .config
                .root
                .join(apply_format(dest, format, self.engine.catalog())?);
            written.push(target.clone());
            self.engine
                .transform(source, &target, format, Some(&config.overrides))?;
            debug!(format = %format, target = %target.display(), "wrote variant");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Copy,
    Move,
}

/// Drop a `?query` suffix from an expanded destination.
fn strip_query(path: &str) -> String {
    match path.find('?') {
        Some(idx) => path[..idx].to_string(),
        None => path.to_string(),
    }
}

fn file_info(content: &Path, name: &str, declared_mime: Option<&str>) -> Result<ProcessedFileInfo> {
    Ok(ProcessedFileInfo {
        extension: file_extension(name).to_string(),
        original_name: name.to_string(),
        size_bytes: fs::metadata(content)?.len(),
        mime_type: match declared_mime {
            Some(mime) => mime.to_string(),
            None => sniff_mime(content, name),
        },
    })
}

/// Mime type from the file's leading bytes, else from `name`'s extension.
pub fn sniff_mime(content: &Path, name: &str) -> String {
    let mut head = Vec::with_capacity(64);
    let sniffed = fs::File::open(content)
        .and_then(|f| f.take(64).read_to_end(&mut head))
        .ok()
        .and_then(|_| image::guess_format(&head).ok())
        .map(|format| format.to_mime_type().to_string());

    sniffed
        .or_else(|| mime_guess::from_path(name).first_raw().map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
