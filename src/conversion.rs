//! Document-to-text conversion.
//!
//! Plain text and markdown are read directly. Rich formats (PDF, Office, images) are handed to
//! an external `markitdown`-compatible command whose stdout is taken as the converted text.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Extensions accepted for indexing, with a human-readable format label.
pub const SUPPORTED_EXTENSIONS: [(&str, &str); 10] = [
    ("pdf", "PDF"),
    ("docx", "Word"),
    ("doc", "Word"),
    ("txt", "Text"),
    ("md", "Markdown"),
    ("jpg", "Image"),
    ("jpeg", "Image"),
    ("png", "Image"),
    ("pptx", "PowerPoint"),
    ("ppt", "PowerPoint"),
];

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Errors raised while converting a document.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The file type is not in [`SUPPORTED_EXTENSIONS`].
    #[error("unsupported file type for {path}")]
    UnsupportedExtension {
        /// Rejected document.
        path: PathBuf,
    },
    /// The file could not be read or converted.
    #[error("failed to convert {path}: {reason}")]
    Failed {
        /// Source document.
        path: PathBuf,
        /// Diagnostic from the reader or converter.
        reason: String,
    },
}

/// Lower-cased extension of `path`, if any.
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

/// Format label for a supported file, or `None` when indexing should skip it.
pub fn file_format(path: &Path) -> Option<&'static str> {
    let extension = extension_of(path)?;
    SUPPORTED_EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, label)| *label)
}

/// Whether `path` has a supported extension.
pub fn is_supported_file(path: &Path) -> bool {
    file_format(path).is_some()
}

/// Capability turning a document on disk into plain text.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert the document at `path` to text.
    async fn convert(&self, path: &Path) -> Result<String, ConversionError>;
}

/// Converter reading text files directly and delegating other formats to an external command.
pub struct MarkitdownConverter {
    command: String,
}

impl MarkitdownConverter {
    /// Use `command` (e.g. `markitdown`) for non-text formats.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn read_text(path: &Path) -> Result<String, ConversionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| failed(path, err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| failed(path, format!("not valid UTF-8: {err}")))
    }

    async fn run_command(&self, path: &Path) -> Result<String, ConversionError> {
        tracing::debug!(command = %self.command, path = %path.display(), "Running converter");
        let output = Command::new(&self.command)
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| failed(path, format!("could not run `{}`: {err}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(
                path,
                format!("`{}` exited with {}: {}", self.command, output.status, stderr.trim()),
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|err| failed(path, format!("converter produced invalid UTF-8: {err}")))
    }
}

#[async_trait]
impl DocumentConverter for MarkitdownConverter {
    async fn convert(&self, path: &Path) -> Result<String, ConversionError> {
        let Some(extension) = extension_of(path).filter(|_| is_supported_file(path)) else {
            return Err(ConversionError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        };

        if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            Self::read_text(path).await
        } else {
            self.run_command(path).await
        }
    }
}

fn failed(path: &Path, reason: String) -> ConversionError {
    ConversionError::Failed {
        path: path.to_path_buf(),
        reason,
    }
}
