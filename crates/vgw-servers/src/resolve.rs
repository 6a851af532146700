//! Repeated hostname resolution
//!
//! Some provider resolvers hand out a subset of a round-robin record per
//! query, so a hostname can be looked up several times and the answers
//! merged.

use crate::capability::HostLookup;
use std::net::IpAddr;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("lookup of {host:?} failed: {reason}")]
    Lookup { host: String, reason: String },

    #[error("resolution cancelled")]
    Cancelled,
}

/// How many addresses a hostname resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No address at all
    Missing,
    /// Exactly one address
    Single(IpAddr),
    /// Several addresses; `first` is the first one answered
    Ambiguous { first: IpAddr, count: usize },
}

impl Resolution {
    /// Classify a resolution result
    pub fn of(addresses: &[IpAddr]) -> Self {
        match addresses {
            [] => Resolution::Missing,
            [single] => Resolution::Single(*single),
            [first, ..] => Resolution::Ambiguous {
                first: *first,
                count: addresses.len(),
            },
        }
    }
}

/// Look `host` up `repetitions` times (at least once).
///
/// Addresses are deduplicated across attempts, in first-seen order.
/// A failed lookup or a fired `cancel` ends the whole resolution.
pub async fn resolve_repeat(
    lookup: &dyn HostLookup,
    host: &str,
    repetitions: usize,
    cancel: &CancellationToken,
) -> Result<Vec<IpAddr>, ResolveError> {
    let mut addresses: Vec<IpAddr> = Vec::new();

    for attempt in 1..=repetitions.max(1) {
        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            result = lookup.lookup(host) => result?,
        };

        for ip in answer {
            if !addresses.contains(&ip) {
                addresses.push(ip);
            }
        }
        debug!(
            "Resolved {} (attempt {}): {} distinct addresses so far",
            host,
            attempt,
            addresses.len()
        );
    }

    Ok(addresses)
}
