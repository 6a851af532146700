//! HTTP Client
//!
//! Uses hyper with tokio for plain HTTP/1.1 GET requests.
//! Features:
//! - Automatic HTTPS with rustls (webpki roots)
//! - Redirect following with a hop limit
//! - Response body size cap
//! - Overall request timeout

use http_body_util::{BodyExt, Empty, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderMap, CONTENT_TYPE, HOST, LOCATION, USER_AGENT};
use hyper::{Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP client errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Body read error: {0}")]
    BodyError(String),

    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Overall request timeout, redirects included
    pub timeout: Duration,
    /// TCP connection timeout
    pub connect_timeout: Duration,
    /// User-Agent string
    pub user_agent: String,
    /// Maximum response body size
    pub max_body_size: usize,
    /// Maximum number of redirects followed
    pub max_redirects: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("vgw/{}", env!("CARGO_PKG_VERSION")),
            max_body_size: 64 * 1024 * 1024, // 64 MB, profile bundles are zipped text
            max_redirects: 5,
        }
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
    /// Time to first byte of the last hop
    pub ttfb: Duration,
    /// Total download time
    pub total_time: Duration,
    /// Final URL (after redirects)
    pub final_url: String,
}

impl Response {
    /// Check if response was successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get body as string
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.clone())
    }

    /// Get Content-Type header
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }
}

/// HTTP GET client
pub struct HttpClient {
    /// Configuration
    config: HttpClientConfig,
    /// Shared TLS connector
    tls: TlsConnector,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        info!(
            "HTTP client initialized (timeout: {:?}, max redirects: {})",
            config.timeout, config.max_redirects
        );

        Self {
            config,
            tls: TlsConnector::from(Arc::new(tls_config)),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(HttpClientConfig::default())
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Perform a GET request, following redirects.
    ///
    /// Non-2xx final responses are returned as-is; callers decide
    /// what a bad status means for them.
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        match tokio::time::timeout(self.config.timeout, self.get_following_redirects(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("HTTP GET {} timed out after {:?}", url, self.config.timeout);
                Err(HttpError::Timeout)
            }
        }
    }

    async fn get_following_redirects(&self, url: &str) -> Result<Response, HttpError> {
        let start = Instant::now();
        let mut current = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        for _ in 0..=self.config.max_redirects {
            let mut response = self.send_get(&current).await?;

            if response.status.is_redirection() {
                let location = response
                    .headers
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok());
                if let Some(location) = location {
                    let next = current
                        .join(location)
                        .map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
                    debug!("HTTP redirect {} -> {}", current, next);
                    current = next;
                    continue;
                }
            }

            response.total_time = start.elapsed();
            response.final_url = current.to_string();
            return Ok(response);
        }

        Err(HttpError::TooManyRedirects(self.config.max_redirects))
    }

    /// Single request/response exchange on a fresh connection
    async fn send_get(&self, url: &Url) -> Result<Response, HttpError> {
        let is_https = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(HttpError::InvalidUrl(format!("Unsupported scheme: {}", other))),
        };
        let host = url
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if is_https { 443 } else { 80 });

        // Origin-form request target
        let target = &url[url::Position::BeforePath..];
        let uri: Uri = target
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| HttpError::InvalidUrl(e.to_string()))?;

        let host_header = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.clone(),
        };

        let request = Request::builder()
            .method(hyper::Method::GET)
            .uri(uri)
            .header(USER_AGENT, &self.config.user_agent)
            .header(HOST, host_header)
            .body(Empty::<Bytes>::new())
            .map_err(|e| HttpError::HttpError(e.to_string()))?;

        // IPv6 literals come back bracketed from the URL
        let connect_host = host.trim_start_matches('[').trim_end_matches(']');
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((connect_host, port)),
        )
        .await
        .map_err(|_| HttpError::ConnectionFailed(format!("connect to {}:{} timed out", host, port)))?
        .map_err(|e| HttpError::ConnectionFailed(e.to_string()))?;

        let ttfb_start = Instant::now();

        let response = if is_https {
            let server_name = rustls::pki_types::ServerName::try_from(connect_host.to_string())
                .map_err(|_| HttpError::TlsError("Invalid server name".to_string()))?;
            let tls_stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| HttpError::TlsError(e.to_string()))?;
            exchange(tls_stream, request).await?
        } else {
            exchange(stream, request).await?
        };

        let ttfb = ttfb_start.elapsed();
        let status = response.status();
        let headers = response.headers().clone();

        let collected = Limited::new(response.into_body(), self.config.max_body_size)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    HttpError::BodyTooLarge(self.config.max_body_size)
                } else {
                    HttpError::BodyError(e.to_string())
                }
            })?;
        let body = collected.to_bytes().to_vec();

        debug!(
            "HTTP GET {} -> {} ({} bytes, {:?} TTFB)",
            url,
            status,
            body.len(),
            ttfb
        );

        Ok(Response {
            status,
            headers,
            body,
            ttfb,
            total_time: ttfb,
            final_url: url.to_string(),
        })
    }
}

/// HTTP/1.1 handshake and request over an established stream
async fn exchange<S>(
    stream: S,
    request: Request<Empty<Bytes>>,
) -> Result<hyper::Response<Incoming>, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| HttpError::HttpError(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!("Connection error: {}", e);
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| HttpError::HttpError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response per accepted connection, in order.
    async fn serve(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[test]
    fn test_client_creation() {
        let client = HttpClient::with_defaults();
        assert_eq!(client.config().max_redirects, 5);
        assert!(client.config().user_agent.starts_with("vgw/"));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let client = HttpClient::with_defaults();
        let result = client.get("not a url").await;
        assert!(matches!(result, Err(HttpError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let client = HttpClient::with_defaults();
        let result = client.get("ftp://example.com/configs.zip").await;
        assert!(matches!(result, Err(HttpError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_simple_get() {
        let base = serve(vec![ok_response("hello")]).await;
        let client = HttpClient::with_defaults();

        let response = client.get(&format!("{}/configs.zip", base)).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.text().unwrap(), "hello");
        assert_eq!(response.content_type(), Some("application/zip"));
        assert!(response.final_url.ends_with("/configs.zip"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned() {
        let base = serve(vec![
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
        ])
        .await;
        let client = HttpClient::with_defaults();

        let response = client.get(&base).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_follows_redirect() {
        let base = serve(vec![
            "HTTP/1.1 302 Found\r\nLocation: /moved.zip\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string(),
            ok_response("moved"),
        ])
        .await;
        let client = HttpClient::with_defaults();

        let response = client.get(&format!("{}/original.zip", base)).await.unwrap();
        assert_eq!(response.text().unwrap(), "moved");
        assert!(response.final_url.ends_with("/moved.zip"));
    }

    #[tokio::test]
    async fn test_redirect_limit() {
        let redirect =
            "HTTP/1.1 302 Found\r\nLocation: /again\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string();
        let base = serve(vec![redirect.clone(), redirect]).await;
        let client = HttpClient::new(HttpClientConfig {
            max_redirects: 1,
            ..HttpClientConfig::default()
        });

        let result = client.get(&base).await;
        assert!(matches!(result, Err(HttpError::TooManyRedirects(1))));
    }

    #[tokio::test]
    async fn test_body_size_cap() {
        let base = serve(vec![ok_response("0123456789")]).await;
        let client = HttpClient::new(HttpClientConfig {
            max_body_size: 4,
            ..HttpClientConfig::default()
        });

        let result = client.get(&base).await;
        assert!(matches!(result, Err(HttpError::BodyTooLarge(4))));
    }
}
