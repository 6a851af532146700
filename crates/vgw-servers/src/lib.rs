//! vgw servers - VPN provider server catalogs
//!
//! Builds and maintains the list of servers each supported VPN provider
//! offers, from the OpenVPN profile bundles the providers publish.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Fetcher    │──▶│   Archive    │──▶│   Profile    │──▶│  HostLookup  │
//! │ (HTTP GET)   │   │ (zip/tar.gz) │   │   parser     │   │ (repeated)   │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                 │
//!                         ┌──────────────┐   ┌──────────────┐     │
//!                         │ CatalogStore │◀──│   Updater    │◀────┘
//!                         │ (per-provider│   │ (sort, stamp,│
//!                         │  atomic swap)│   │   commit)    │
//!                         └──────────────┘   └──────────────┘
//! ```
//!
//! # Guarantees
//!
//! - A catalog is sorted by hostname and holds each hostname once
//! - A provider's catalog is replaced whole, or not at all
//! - The same bundle and DNS answers always render the same listing
//! - Cancelling an update leaves the previous catalog in place

mod archive;
mod capability;
mod config;
mod listing;
mod looper;
mod models;
mod profile;
mod provider;
mod resolve;
mod store;
mod updater;

pub use archive::{extract, fetch_bundle, ArchiveFormat, FetchError, ProfileBundle};
pub use capability::{Clock, Fetcher, HostLookup, SystemClock};
pub use config::{ConfigError, DnsSettings, HttpSettings, SourceOverride, UpdaterConfig};
pub use listing::{parse_listing, render_listing, ListingError};
pub use looper::{CycleReport, LooperConfig, LooperHandle, UpdateLooper};
pub use models::{CatalogError, ProviderCatalog, ServerCandidate, ServerRecord, Warning};
pub use profile::{openvpn_remote, ParsedProfile, ProfileError, ProfileParser};
pub use provider::{Provider, ProviderDescriptor, ProviderError};
pub use resolve::{resolve_repeat, Resolution, ResolveError};
pub use store::{CatalogStore, StoreError};
pub use updater::{UpdateError, UpdateOutcome, Updater};
