//! Catalog Data Model
//!
//! Resolved servers, per-provider catalogs and the non-fatal warnings
//! collected while building them.

use crate::provider::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

/// A resolved VPN server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Hostname advertised by the provider's profile
    pub hostname: String,
    /// Address accepted for that hostname
    pub ip: IpAddr,
}

impl ServerRecord {
    /// Create a new record
    pub fn new(hostname: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            hostname: hostname.into(),
            ip,
        }
    }
}

impl fmt::Display for ServerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.hostname, self.ip)
    }
}

/// Hostname parsed from a profile, waiting for resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCandidate {
    pub hostname: String,
    /// Bundle file the hostname came from
    pub source_file: String,
}

impl ServerCandidate {
    pub fn new(hostname: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            source_file: source_file.into(),
        }
    }

    /// Warning about this candidate
    pub fn warning(&self, message: impl Into<String>) -> Warning {
        Warning::in_file(message, self.source_file.clone())
    }
}

/// Non-fatal anomaly found during an update cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Human readable description
    pub message: String,
    /// Bundle file the warning relates to, if any
    pub source_file: Option<String>,
}

impl Warning {
    /// Warning not tied to a file
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_file: None,
        }
    }

    /// Warning raised while processing `file`
    pub fn in_file(message: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_file: Some(file.into()),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_file {
            Some(file) => write!(f, "{} (in {:?})", self.message, file),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Catalog invariant violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("{provider}: server #{index} has an empty hostname")]
    EmptyHostname { provider: Provider, index: usize },

    #[error("{provider}: hostname {hostname:?} is listed more than once")]
    DuplicateHostname { provider: Provider, hostname: String },

    #[error("{provider}: servers are not sorted by hostname at {hostname:?}")]
    Unsorted { provider: Provider, hostname: String },
}

/// Sorted server list of one provider at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCatalog {
    /// Provider the servers belong to
    pub provider: Provider,
    /// When the catalog was built (whole seconds)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// Servers, ascending by hostname, hostnames unique
    pub servers: Vec<ServerRecord>,
}

impl ProviderCatalog {
    /// Build a catalog, sorting by hostname and keeping the first
    /// record of any repeated hostname.
    pub fn new(provider: Provider, timestamp: DateTime<Utc>, servers: Vec<ServerRecord>) -> Self {
        let mut seen = HashSet::new();
        let mut servers: Vec<ServerRecord> = servers
            .into_iter()
            .filter(|server| seen.insert(server.hostname.clone()))
            .collect();
        // Stable sort; hostnames are unique at this point anyway
        servers.sort_by(|a, b| a.hostname.cmp(&b.hostname));

        Self {
            provider,
            timestamp,
            servers,
        }
    }

    /// Number of servers
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// True when the catalog lists no server
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Find a server by hostname
    pub fn find(&self, hostname: &str) -> Option<&ServerRecord> {
        self.servers
            .binary_search_by(|server| server.hostname.as_str().cmp(hostname))
            .ok()
            .map(|index| &self.servers[index])
    }

    /// Check the catalog invariants on data that did not come
    /// through [`ProviderCatalog::new`] (snapshots, listings).
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (index, server) in self.servers.iter().enumerate() {
            if server.hostname.is_empty() {
                return Err(CatalogError::EmptyHostname {
                    provider: self.provider,
                    index,
                });
            }
            if index == 0 {
                continue;
            }
            let previous = &self.servers[index - 1].hostname;
            if *previous == server.hostname {
                return Err(CatalogError::DuplicateHostname {
                    provider: self.provider,
                    hostname: server.hostname.clone(),
                });
            }
            if *previous > server.hostname {
                return Err(CatalogError::Unsorted {
                    provider: self.provider,
                    hostname: server.hostname.clone(),
                });
            }
        }
        Ok(())
    }
}
