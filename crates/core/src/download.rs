//! Delivering exported files to the user.

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download rejected: {0}")]
    Rejected(String),
}

/// Receives the bytes of a finished export
pub trait DownloadSink {
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), DownloadError>;
}

impl<S: DownloadSink + ?Sized> DownloadSink for &mut S {
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), DownloadError> {
        (**self).deliver(file_name, bytes)
    }
}

/// Writes each delivered file into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    last_written: Option<PathBuf>,
}

impl DirectorySink {
    /// Sink writing into `dir`, created on first delivery.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), last_written: None }
    }

    /// The user's download directory, falling back to the current directory.
    pub fn downloads() -> Self {
        Self::new(dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the most recent successful delivery
    pub fn last_written(&self) -> Option<&Path> {
        self.last_written.as_deref()
    }
}

/// Strip path separators and characters most filesystems reject.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    let trimmed = cleaned.trim_matches(|ch: char| ch == '.' || ch.is_whitespace());
    if trimmed.is_empty() {
        "document.pdf".to_owned()
    } else {
        trimmed.to_owned()
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), DownloadError> {
        if bytes.is_empty() {
            return Err(DownloadError::Rejected(format!("{file_name} is empty")));
        }
        let path = self.dir.join(sanitize_file_name(file_name));
        let write_error = |source| DownloadError::Write { path: path.clone(), source };

        fs::create_dir_all(&self.dir).map_err(write_error)?;
        fs::write(&path, bytes).map_err(write_error)?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "export written");
        self.last_written = Some(path);
        Ok(())
    }
}
