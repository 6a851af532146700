//! Injected capabilities
//!
//! The pipeline never talks to the network or the system clock directly.
//! It goes through these traits, which the gateway wires to
//! [`vgw_network`] and the tests wire to in-memory fakes.
//!
//! Cancellation is applied by the caller: the pipeline races every
//! capability call against its cancellation token and drops the call's
//! future once the token fires.

use crate::archive::FetchError;
use crate::resolve::ResolveError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use tracing::debug;
use vgw_network::{DnsResolver, HttpClient, HttpError};

/// Downloads raw bytes
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`; any non-success response is an error
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Resolves hostnames
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Addresses for `host` in answer order; an empty list means
    /// the name exists nowhere, not that the lookup failed
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Time source used to stamp catalogs
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = HttpClient::get(self, url).await.map_err(|e| match e {
            HttpError::Timeout => FetchError::Transport(format!("GET {} timed out", url)),
            other => FetchError::Transport(other.to_string()),
        })?;

        if !response.is_success() {
            return Err(FetchError::Status(response.status.as_u16()));
        }
        debug!(
            "Downloaded {} ({} bytes, {})",
            response.final_url,
            response.body.len(),
            response.content_type().unwrap_or("no content type")
        );
        Ok(response.body)
    }
}

#[async_trait]
impl HostLookup for DnsResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        DnsResolver::lookup(self, host)
            .await
            .map_err(|e| ResolveError::Lookup {
                host: host.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                if n == 0 {
                    break;
                }
                read += n;
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/bundle.zip", addr)
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_bad_status() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let client = HttpClient::with_defaults();

        let result = Fetcher::get(&client, &url).await;
        assert!(matches!(result, Err(FetchError::Status(503))));
    }

    #[tokio::test]
    async fn test_http_fetcher_returns_body() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: close\r\n\r\nzip").await;
        let client = HttpClient::with_defaults();

        let body = Fetcher::get(&client, &url).await.unwrap();
        assert_eq!(body, b"zip");
    }

    #[tokio::test]
    async fn test_http_fetcher_transport_error() {
        let client = HttpClient::with_defaults();
        let result = Fetcher::get(&client, "gopher://example.com/").await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let first = SystemClock.now();
        let second = SystemClock.now();
        assert!(second >= first);
    }
}
