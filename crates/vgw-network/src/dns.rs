//! Async DNS Resolver
//!
//! Thin wrapper around hickory's tokio resolver for hostname lookups:
//! - System configuration or Cloudflare upstreams
//! - Resolver-side caching disabled, so repeated lookups of the same
//!   name issue fresh queries
//! - "No records" answers are an empty result, not an error

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// DNS resolution errors
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("Resolution failed for {domain}: {reason}")]
    ResolutionFailed { domain: String, reason: String },

    #[error("Resolver error: {0}")]
    ResolverError(String),
}

/// DNS resolver configuration
#[derive(Debug, Clone)]
pub struct DnsConfig {
    /// Whether to use system DNS or Cloudflare
    pub use_system_dns: bool,
    /// Timeout for a single DNS query
    pub timeout: Duration,
    /// Query attempts per lookup before the resolver gives up
    pub attempts: usize,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            use_system_dns: true,
            timeout: Duration::from_secs(5),
            attempts: 2,
        }
    }
}

/// Async DNS resolver
pub struct DnsResolver {
    /// Underlying resolver
    resolver: TokioAsyncResolver,
    /// Configuration
    config: DnsConfig,
}

impl DnsResolver {
    /// Create a new DNS resolver
    pub fn new(config: DnsConfig) -> Result<Self, DnsError> {
        let (resolver_config, mut opts) = if config.use_system_dns {
            hickory_resolver::system_conf::read_system_conf()
                .map_err(|e| DnsError::ResolverError(e.to_string()))?
        } else {
            (ResolverConfig::cloudflare(), ResolverOpts::default())
        };

        opts.timeout = config.timeout;
        opts.attempts = config.attempts;
        opts.cache_size = 0;

        let resolver = TokioAsyncResolver::tokio(resolver_config, opts);

        info!(
            "DNS resolver initialized ({})",
            if config.use_system_dns { "system" } else { "cloudflare" }
        );

        Ok(Self { resolver, config })
    }

    /// Resolver configuration
    pub fn config(&self) -> &DnsConfig {
        &self.config
    }

    /// Resolve a domain to its IP addresses, in answer order.
    pub async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>, DnsError> {
        let normalized = domain.to_lowercase();

        debug!("DNS lookup for: {}", normalized);
        match self.resolver.lookup_ip(normalized.as_str()).await {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => {
                    debug!("DNS: no records for {}", normalized);
                    Ok(Vec::new())
                }
                _ => Err(DnsError::ResolutionFailed {
                    domain: normalized,
                    reason: e.to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn cloudflare() -> DnsResolver {
        DnsResolver::new(DnsConfig {
            use_system_dns: false,
            ..DnsConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_dns_resolver_creation() {
        let resolver = cloudflare();
        assert!(!resolver.config().use_system_dns);
        assert_eq!(resolver.config().attempts, 2);
    }

    #[tokio::test]
    async fn test_ip_literal_lookup() {
        let resolver = cloudflare();

        // IP literals are answered without touching the network
        let addresses = resolver.lookup("10.1.2.3").await.unwrap();
        assert_eq!(addresses, vec![IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))]);
    }
}
