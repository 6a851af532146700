//! Provider Update Orchestrator
//!
//! Builds a provider's catalog end to end:
//!
//! ```text
//! Idle -> Fetching -> Parsing+Resolving (per file) -> Committed | Aborted
//! ```
//!
//! 1. Fetch and extract the provider bundle
//! 2. For every profile, in file name order: parse the remote host,
//!    resolve it, apply the address-count policy
//! 3. Sort the accepted servers and stamp the catalog
//! 4. Swap the catalog into the store, only if nothing fatal happened
//!
//! Warnings are collected for the whole cycle and returned with the
//! outcome, whether the update committed or not.

use crate::archive::{fetch_bundle, FetchError};
use crate::capability::{Clock, Fetcher, HostLookup};
use crate::models::{ProviderCatalog, ServerCandidate, ServerRecord, Warning};
use crate::profile::ProfileError;
use crate::provider::{Provider, ProviderDescriptor};
use crate::resolve::{resolve_repeat, Resolution, ResolveError};
use crate::store::CatalogStore;
use chrono::SubsecRound;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fatal update errors; the provider's previous catalog stays in place
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("cannot update {provider} servers: {source}")]
    Fetch {
        provider: Provider,
        #[source]
        source: FetchError,
    },

    #[error("cannot update {provider} servers: {source} in {file:?}")]
    Profile {
        provider: Provider,
        file: String,
        #[source]
        source: ProfileError,
    },

    #[error("cannot update {provider} servers: {source}")]
    Resolve {
        provider: Provider,
        #[source]
        source: ResolveError,
    },

    #[error("cannot update {provider} servers: no *{suffix} profile in bundle")]
    EmptyBundle {
        provider: Provider,
        suffix: &'static str,
    },

    #[error("cannot update {provider} servers: no server left after resolution")]
    NoServers { provider: Provider },

    #[error("{provider} update cancelled")]
    Cancelled { provider: Provider },

    #[error("{provider} update exceeded its {timeout:?} deadline")]
    DeadlineExceeded { provider: Provider, timeout: Duration },
}

impl UpdateError {
    /// Provider the failed update was for
    pub fn provider(&self) -> Provider {
        match self {
            UpdateError::Fetch { provider, .. }
            | UpdateError::Profile { provider, .. }
            | UpdateError::Resolve { provider, .. }
            | UpdateError::EmptyBundle { provider, .. }
            | UpdateError::NoServers { provider }
            | UpdateError::Cancelled { provider }
            | UpdateError::DeadlineExceeded { provider, .. } => *provider,
        }
    }

    /// Whether the update stopped because its token fired
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UpdateError::Cancelled { .. })
    }
}

/// Result of one provider update cycle
#[derive(Debug)]
pub struct UpdateOutcome {
    /// Provider updated
    pub provider: Provider,
    /// Warnings, in the order they were found
    pub warnings: Vec<Warning>,
    /// Committed catalog, or why nothing was committed
    pub result: Result<Arc<ProviderCatalog>, UpdateError>,
}

impl UpdateOutcome {
    /// Whether a new catalog was committed
    pub fn is_committed(&self) -> bool {
        self.result.is_ok()
    }

    /// Log every warning, prefixed with the provider name
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            warn!("{}: {}", self.provider, warning);
        }
    }
}

/// Runs provider updates against injected capabilities and commits
/// results to a shared store
pub struct Updater {
    fetcher: Arc<dyn Fetcher>,
    lookup: Arc<dyn HostLookup>,
    clock: Arc<dyn Clock>,
    store: Arc<CatalogStore>,
    refuse_empty: bool,
}

impl Updater {
    /// Create a new updater
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        lookup: Arc<dyn HostLookup>,
        clock: Arc<dyn Clock>,
        store: Arc<CatalogStore>,
    ) -> Self {
        Self {
            fetcher,
            lookup,
            clock,
            store,
            refuse_empty: false,
        }
    }

    /// Fail updates that would commit an empty catalog instead of
    /// replacing the previous one
    pub fn refuse_empty(mut self, enabled: bool) -> Self {
        self.refuse_empty = enabled;
        self
    }

    /// Store the updater commits to
    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// Run one update cycle for a provider.
    ///
    /// The store is only touched when the whole cycle succeeds.
    pub async fn update(
        &self,
        descriptor: &ProviderDescriptor,
        cancel: &CancellationToken,
    ) -> UpdateOutcome {
        let provider = descriptor.provider;
        info!("Updating {} servers from {}", provider, descriptor.url);

        let mut warnings = Vec::new();
        let result = match self.find_servers(descriptor, cancel, &mut warnings).await {
            Ok(servers) => {
                let now = self.clock.now().trunc_subsecs(0);
                let catalog = Arc::new(ProviderCatalog::new(provider, now, servers));
                self.store.replace(catalog.clone());
                info!(
                    "{} catalog updated: {} servers, {} warnings",
                    provider,
                    catalog.len(),
                    warnings.len()
                );
                Ok(catalog)
            }
            Err(e) => {
                debug!("{} update aborted: {}", provider, e);
                Err(e)
            }
        };

        UpdateOutcome {
            provider,
            warnings,
            result,
        }
    }

    /// Fetch, parse and resolve; returns the accepted servers unsorted
    async fn find_servers(
        &self,
        descriptor: &ProviderDescriptor,
        cancel: &CancellationToken,
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<ServerRecord>, UpdateError> {
        let provider = descriptor.provider;

        let bundle = fetch_bundle(self.fetcher.as_ref(), &descriptor.url, descriptor.format, cancel)
            .await
            .map_err(|e| match e {
                FetchError::Cancelled => UpdateError::Cancelled { provider },
                source => UpdateError::Fetch { provider, source },
            })?;

        let mut servers = Vec::new();
        let mut seen_hosts = HashSet::new();
        let mut profiles = 0usize;

        for (file, content) in bundle.iter() {
            if cancel.is_cancelled() {
                return Err(UpdateError::Cancelled { provider });
            }

            if !descriptor.is_profile(file) {
                debug!("{}: skipping non-profile file {}", provider, file);
                continue;
            }
            profiles += 1;

            let text = String::from_utf8_lossy(content);
            let parsed = (descriptor.parse)(&text).map_err(|source| UpdateError::Profile {
                provider,
                file: file.to_string(),
                source,
            })?;
            if let Some(message) = parsed.warning {
                warnings.push(Warning::in_file(message, file));
            }

            let candidate = ServerCandidate::new(parsed.host, file);
            if !seen_hosts.insert(candidate.hostname.clone()) {
                debug!(
                    "{}: {} already listed, skipping {}",
                    provider, candidate.hostname, candidate.source_file
                );
                continue;
            }

            if let Some(record) = self.resolve_candidate(descriptor, &candidate, cancel, warnings).await? {
                servers.push(record);
            }
        }

        if self.refuse_empty && profiles == 0 {
            return Err(UpdateError::EmptyBundle {
                provider,
                suffix: descriptor.file_suffix,
            });
        }
        if self.refuse_empty && servers.is_empty() {
            return Err(UpdateError::NoServers { provider });
        }

        Ok(servers)
    }

    /// Resolve one candidate and apply the address-count policy.
    /// `None` means the candidate was dropped with a warning.
    async fn resolve_candidate(
        &self,
        descriptor: &ProviderDescriptor,
        candidate: &ServerCandidate,
        cancel: &CancellationToken,
        warnings: &mut Vec<Warning>,
    ) -> Result<Option<ServerRecord>, UpdateError> {
        let provider = descriptor.provider;
        let host = &candidate.hostname;

        let addresses = resolve_repeat(self.lookup.as_ref(), host, descriptor.repetitions, cancel)
            .await
            .map_err(|e| match e {
                ResolveError::Cancelled => UpdateError::Cancelled { provider },
                source => UpdateError::Resolve { provider, source },
            })?;

        match Resolution::of(&addresses) {
            Resolution::Missing => {
                warnings.push(candidate.warning(format!("no address found for host {:?}", host)));
                Ok(None)
            }
            Resolution::Single(ip) => {
                debug!("{}: {} -> {}", provider, host, ip);
                Ok(Some(ServerRecord::new(host.clone(), ip)))
            }
            Resolution::Ambiguous { first, count } => {
                debug!("{}: {} -> {} ({} addresses)", provider, host, first, count);
                warnings.push(candidate.warning(format!(
                    "more than one address found for host {:?}",
                    host
                )));
                Ok(Some(ServerRecord::new(host.clone(), first)))
            }
        }
    }
}
