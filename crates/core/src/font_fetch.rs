//! Loading font programs for external catalog families.

use crate::font_catalog::FontLocation;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

/// Font files larger than this are rejected.
const MAX_FONT_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FontFetchError {
    #[error("download of {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is empty or too large")]
    InvalidSize(String),
}

/// Source of raw font file bytes
pub trait FontFetcher {
    fn fetch(&self, location: &FontLocation) -> Result<Vec<u8>, FontFetchError>;
}

impl<F: FontFetcher + ?Sized> FontFetcher for &F {
    fn fetch(&self, location: &FontLocation) -> Result<Vec<u8>, FontFetchError> {
        (**self).fetch(location)
    }
}

impl<F: FontFetcher + ?Sized> FontFetcher for std::sync::Arc<F> {
    fn fetch(&self, location: &FontLocation) -> Result<Vec<u8>, FontFetchError> {
        (**self).fetch(location)
    }
}

/// Blocking HTTP downloads for URLs, filesystem reads for paths.
pub struct HttpFontFetcher {
    agent: ureq::Agent,
}

impl HttpFontFetcher {
    /// Fetcher whose HTTP requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, FontFetchError> {
        let network = |reason: String| FontFetchError::Network { url: url.to_owned(), reason };

        let response = self
            .agent
            .get(url)
            .set("User-Agent", "pdf-overlay")
            .call()
            .map_err(|e| network(e.to_string()))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_FONT_BYTES + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| network(e.to_string()))?;
        Ok(bytes)
    }
}

impl Default for HttpFontFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(15))
    }
}

impl std::fmt::Debug for HttpFontFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFontFetcher").finish_non_exhaustive()
    }
}

impl FontFetcher for HttpFontFetcher {
    fn fetch(&self, location: &FontLocation) -> Result<Vec<u8>, FontFetchError> {
        let bytes = match location {
            FontLocation::Url(url) => self.download(url)?,
            FontLocation::Path(path) => std::fs::read(path)
                .map_err(|source| FontFetchError::Io { path: path.clone(), source })?,
        };

        if bytes.is_empty() || bytes.len() as u64 > MAX_FONT_BYTES {
            return Err(FontFetchError::InvalidSize(location.to_string()));
        }

        tracing::debug!(%location, bytes = bytes.len(), "fetched font");
        Ok(bytes)
    }
}
