//! Rendered catalog listings
//!
//! A listing is the plain-text form of a [`ProviderCatalog`], meant to be
//! checked in and embedded (`include_str!`) as offline fallback data:
//!
//! ```text
//! # provider: privado
//! # timestamp: 1700000000
//! # servers: 2
//! ams-001.privado.io 91.148.224.10
//! zrh-001.privado.io 91.148.237.2
//! ```
//!
//! Records follow the catalog order, so the same catalog always renders
//! to the same bytes; only the timestamp line changes between updates.

use crate::models::{CatalogError, ProviderCatalog, ServerRecord};
use crate::provider::Provider;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::net::IpAddr;
use thiserror::Error;

/// Listing parse errors
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("missing `# {0}:` header")]
    MissingHeader(&'static str),

    #[error("unknown provider {0:?}")]
    InvalidProvider(String),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid server count {0:?}")]
    InvalidServerCount(String),

    #[error("line {line}: invalid server record {content:?}")]
    InvalidRecord { line: usize, content: String },

    #[error("header says {expected} servers, found {found}")]
    CountMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Render a catalog as a listing
pub fn render_listing(catalog: &ProviderCatalog) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "# provider: {}", catalog.provider);
    let _ = writeln!(out, "# timestamp: {}", catalog.timestamp.timestamp());
    let _ = writeln!(out, "# servers: {}", catalog.servers.len());
    for server in &catalog.servers {
        let _ = writeln!(out, "{}", server);
    }
    out
}

/// Read a listing back into a catalog
pub fn parse_listing(text: &str) -> Result<ProviderCatalog, ListingError> {
    let mut provider = None;
    let mut timestamp = None;
    let mut expected = None;
    let mut servers = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('#') {
            let Some((key, value)) = header.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "provider" => {
                    let parsed: Provider = value
                        .parse()
                        .map_err(|_| ListingError::InvalidProvider(value.to_string()))?;
                    provider = Some(parsed);
                }
                "timestamp" => {
                    let secs: i64 = value
                        .parse()
                        .map_err(|_| ListingError::InvalidTimestamp(value.to_string()))?;
                    let parsed = DateTime::<Utc>::from_timestamp(secs, 0)
                        .ok_or_else(|| ListingError::InvalidTimestamp(value.to_string()))?;
                    timestamp = Some(parsed);
                }
                "servers" => {
                    let count: usize = value
                        .parse()
                        .map_err(|_| ListingError::InvalidServerCount(value.to_string()))?;
                    expected = Some(count);
                }
                _ => {}
            }
            continue;
        }

        servers.push(parse_record(line).ok_or_else(|| ListingError::InvalidRecord {
            line: index + 1,
            content: line.to_string(),
        })?);
    }

    let provider = provider.ok_or(ListingError::MissingHeader("provider"))?;
    let timestamp = timestamp.ok_or(ListingError::MissingHeader("timestamp"))?;

    if let Some(expected) = expected {
        if expected != servers.len() {
            return Err(ListingError::CountMismatch {
                expected,
                found: servers.len(),
            });
        }
    }

    let catalog = ProviderCatalog {
        provider,
        timestamp,
        servers,
    };
    catalog.validate()?;
    Ok(catalog)
}

fn parse_record(line: &str) -> Option<ServerRecord> {
    let mut fields = line.split_whitespace();
    let hostname = fields.next()?;
    let ip: IpAddr = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(ServerRecord::new(hostname, ip))
}
