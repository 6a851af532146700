//! Profile Bundle Fetching
//!
//! Downloads a provider bundle through the injected [`Fetcher`] and
//! extracts every file it contains. Contents are not inspected here.

use crate::capability::Fetcher;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use zip::ZipArchive;

/// Bundle archive format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// `.zip` archive
    Zip,
    /// gzip-compressed tarball
    #[serde(rename = "tar.gz")]
    TarGz,
}

/// Bundle fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("corrupt archive: {0}")]
    Corrupt(String),

    #[error("duplicate archive entry {0:?}")]
    DuplicateEntry(String),

    #[error("fetch cancelled")]
    Cancelled,
}

/// File name to raw content, in file name order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileBundle {
    files: BTreeMap<String, Vec<u8>>,
}

impl ProfileBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; names are unique within a bundle
    pub fn insert(&mut self, name: impl Into<String>, content: Vec<u8>) -> Result<(), FetchError> {
        let name = name.into();
        if self.files.contains_key(&name) {
            return Err(FetchError::DuplicateEntry(name));
        }
        self.files.insert(name, content);
        Ok(())
    }

    /// Content of one file
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Files in ascending name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_slice()))
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when the bundle holds no file
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Fetch `url` and extract it as `format`.
///
/// Returns [`FetchError::Cancelled`] as soon as `cancel` fires.
pub async fn fetch_bundle(
    fetcher: &dyn Fetcher,
    url: &str,
    format: ArchiveFormat,
    cancel: &CancellationToken,
) -> Result<ProfileBundle, FetchError> {
    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        result = fetcher.get(url) => result?,
    };

    debug!("Fetched {} bytes from {}", bytes.len(), url);
    let bundle = extract(format, &bytes)?;
    debug!("Extracted {} files from {}", bundle.len(), url);
    Ok(bundle)
}

/// Extract every regular file of an archive
pub fn extract(format: ArchiveFormat, bytes: &[u8]) -> Result<ProfileBundle, FetchError> {
    match format {
        ArchiveFormat::Zip => extract_zip(bytes),
        ArchiveFormat::TarGz => extract_tar_gz(bytes),
    }
}

fn extract_zip(bytes: &[u8]) -> Result<ProfileBundle, FetchError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| FetchError::Corrupt(e.to_string()))?;
    let mut bundle = ProfileBundle::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| FetchError::Corrupt(e.to_string()))?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| FetchError::Corrupt(format!("{}: {}", name, e)))?;
        bundle.insert(name, content)?;
    }

    Ok(bundle)
}

fn extract_tar_gz(bytes: &[u8]) -> Result<ProfileBundle, FetchError> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    let mut bundle = ProfileBundle::new();

    let entries = archive
        .entries()
        .map_err(|e| FetchError::Corrupt(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| FetchError::Corrupt(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = entry
            .path()
            .map_err(|e| FetchError::Corrupt(e.to_string()))?
            .to_string_lossy()
            .into_owned();
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| FetchError::Corrupt(format!("{}: {}", name, e)))?;
        bundle.insert(name, content)?;
    }

    Ok(bundle)
}
