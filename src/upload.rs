//! Uploaded images as scoped temporary files.
//!
//! An upload is checked against the configured size and type limits and then
//! written to a temporary file. The [`ScopedImage`] owning that file deletes it
//! when dropped, so every exit path of an assembly cleans up after itself;
//! [`ScopedImage::release`] deletes it early once the picture is embedded.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::{Builder, TempPath};

use crate::config::UploadConfig;
use crate::error::ValidationError;

/// Size and type limits applied to every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        UploadPolicy {
            max_bytes: config.max_size_bytes(),
            allowed_types: config
                .allowed_types
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }
}

impl UploadPolicy {
    /// Check an upload and return the file suffix to store it under.
    ///
    /// The declared MIME type decides (`image/png` → `png`); the original file
    /// name's extension is used when no type was declared.
    pub fn check(
        &self,
        field: &'static str,
        original_name: &str,
        declared_type: Option<&str>,
        size: u64,
    ) -> Result<String, ValidationError> {
        if size > self.max_bytes {
            return Err(ValidationError::UploadTooLarge {
                field,
                size,
                limit: self.max_bytes,
            });
        }

        let found = match declared_type.filter(|t| !t.trim().is_empty()) {
            Some(mime) => mime.rsplit('/').next().unwrap_or(mime).trim().to_ascii_lowercase(),
            None => Path::new(original_name)
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default(),
        };
        if !self.allowed_types.iter().any(|t| *t == found) {
            return Err(ValidationError::UnsupportedImageType {
                field,
                found,
                allowed: self.allowed_types.join(", "),
            });
        }
        Ok(found)
    }
}

/// A temporary copy of an uploaded image, deleted on drop.
#[derive(Debug)]
pub struct ScopedImage {
    field: &'static str,
    original_name: String,
    path: TempPath,
}

impl ScopedImage {
    /// Validate an upload held in memory and spill it to a temporary file.
    ///
    /// # Arguments
    /// * `field` - Form field the upload came from (`logo`, `topology`)
    /// * `original_name` - File name as supplied by the user
    /// * `declared_type` - MIME type sent with the upload, if any
    /// * `bytes` - File contents
    /// * `policy` - Size and type limits
    ///
    /// # Returns
    /// * `Ok(Ok(ScopedImage))` - Validated and written
    /// * `Ok(Err(ValidationError))` - Rejected; nothing was written
    /// * `Err(io::Error)` - The temporary file could not be written
    pub fn from_bytes(
        field: &'static str,
        original_name: &str,
        declared_type: Option<&str>,
        bytes: &[u8],
        policy: &UploadPolicy,
    ) -> std::io::Result<Result<ScopedImage, ValidationError>> {
        let suffix = match policy.check(field, original_name, declared_type, bytes.len() as u64) {
            Ok(suffix) => suffix,
            Err(e) => {
                warn!("rejected {field} upload {original_name:?}: {e}");
                return Ok(Err(e));
            }
        };

        let mut file = Builder::new()
            .prefix("proposal-")
            .suffix(&format!(".{suffix}"))
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        let path = file.into_temp_path();
        debug!("stored {field} upload {original_name:?} at {}", path.display());

        Ok(Ok(ScopedImage {
            field,
            original_name: original_name.to_string(),
            path,
        }))
    }

    /// Validate a file on disk and copy it to a temporary file, so the
    /// caller's file is never touched by assembly.
    pub fn from_path(
        field: &'static str,
        source: &Path,
        policy: &UploadPolicy,
    ) -> std::io::Result<Result<ScopedImage, ValidationError>> {
        let bytes = std::fs::read(source)?;
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_bytes(field, &name, None, &bytes, policy)
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the temporary file now instead of at drop.
    pub fn release(self) {
        let field = self.field;
        let path: PathBuf = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            warn!("could not delete temporary {field} image {}: {e}", path.display());
        } else {
            debug!("released temporary {field} image {}", path.display());
        }
    }
}
