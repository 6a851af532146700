//! vgw Network Layer
//!
//! Transport primitives used by the gateway's server-list updater.
//!
//! - `HttpClient`: hyper over tokio, rustls for HTTPS, redirect following
//!   and a bounded response body
//! - `DnsResolver`: hickory-based lookups with caching disabled so that
//!   repeated queries really hit the resolver

mod client;
mod dns;

pub use client::{HttpClient, HttpClientConfig, HttpError, Response};
pub use dns::{DnsConfig, DnsError, DnsResolver};
