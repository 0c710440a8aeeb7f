//! File uploads into the interpreter's workspace
//!
//! Clients send files inline as data URLs
//! (`data:<mime>;base64,<payload>`). The payload is decoded and written
//! under the upload root, where the interpreter can pick it up.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::info;

/// Error type for upload operations
#[derive(Debug)]
pub enum UploadError {
    /// `fileData` is not a data URL (no `,` separating header and payload)
    NotADataUrl,
    /// The payload is not valid base64
    Decode(base64::DecodeError),
    /// The file name has no usable final component
    InvalidFileName(String),
    /// Creating the directory or writing the file failed
    Io(std::io::Error),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::NotADataUrl => write!(f, "file data is not a data URL"),
            UploadError::Decode(e) => write!(f, "invalid base64 payload: {}", e),
            UploadError::InvalidFileName(name) => write!(f, "invalid file name: {:?}", name),
            UploadError::Io(e) => write!(f, "failed to save upload: {}", e),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Decode(e) => Some(e),
            UploadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<base64::DecodeError> for UploadError {
    fn from(e: base64::DecodeError) -> Self {
        UploadError::Decode(e)
    }
}

impl From<std::io::Error> for UploadError {
    fn from(e: std::io::Error) -> Self {
        UploadError::Io(e)
    }
}

/// A file written by `UploadStore::save`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedUpload {
    /// Where the file landed
    pub path: PathBuf,
    /// Decoded size in bytes
    pub size: usize,
}

impl SavedUpload {
    /// Notice prefixed to the next chat message so the interpreter knows about the file
    pub fn notice(&self) -> String {
        format!("Saved file to {}.", self.path.display())
    }
}

/// Writes uploaded files under a fixed root directory
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// The directory is created lazily on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode `data_url` and write it as `file_name` under the root.
    ///
    /// Only the final component of `file_name` is used, so a client can't
    /// write outside the upload root. Existing files are overwritten.
    pub fn save(&self, file_name: &str, data_url: &str) -> Result<SavedUpload, UploadError> {
        let name = sanitize_file_name(file_name)?;
        let bytes = decode_data_url(data_url)?;

        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        std::fs::write(&path, &bytes)?;

        info!(path = %path.display(), size = bytes.len(), "Saved uploaded file");
        Ok(SavedUpload {
            path,
            size: bytes.len(),
        })
    }
}

/// Decode the base64 payload of a data URL
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, UploadError> {
    let (_, payload) = data_url.split_once(',').ok_or(UploadError::NotADataUrl)?;
    Ok(STANDARD.decode(payload.trim())?)
}

/// Reduce a client-supplied name to its final path component
fn sanitize_file_name(file_name: &str) -> Result<&str, UploadError> {
    Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| UploadError::InvalidFileName(file_name.to_string()))
}
