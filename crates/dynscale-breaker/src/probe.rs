//! Single HTTP probe against a breaker endpoint.

use std::time::Duration;

use http::Uri;
use tracing::debug;

use crate::error::{BreakerError, BreakerResult};

/// Outcome of one breaker probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The endpoint returned 2xx: scaling may proceed.
    Closed,
    /// The endpoint returned non-2xx.
    Open(u16),
    /// No answer: connection error, bad request or timeout.
    Failed,
}

impl ProbeResult {
    pub fn is_open(&self) -> bool {
        !matches!(self, ProbeResult::Closed)
    }
}

/// A parsed breaker URL plus its request timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    authority: String,
    path: String,
    timeout: Duration,
}

impl Endpoint {
    /// Parse an `http://host[:port]/path` URL.
    pub fn parse(url: &str, timeout: Duration) -> BreakerResult<Self> {
        let invalid = |reason: &str| BreakerError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// is supported"));
        }
        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        if authority.as_str().contains('@') {
            return Err(invalid("credentials in the URL are not supported"));
        }
        let host = authority.host();
        let port = authority.port_u16().unwrap_or(80);
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            url: url.to_string(),
            authority: format!("{host}:{port}"),
            path,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// GET the endpoint, naming the table and config key in headers.
pub async fn http_probe(endpoint: &Endpoint, table: &str, config_key: &str) -> ProbeResult {
    let url = endpoint.url();
    let address = endpoint.authority.as_str();

    let result = tokio::time::timeout(endpoint.timeout, async {
        let stream = match tokio::net::TcpStream::connect(address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %url, "breaker connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %url, "breaker handshake failed");
                return ProbeResult::Failed;
            }
        };

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(endpoint.path.as_str())
            .header("host", address)
            .header("user-agent", concat!("dynscale/", env!("CARGO_PKG_VERSION")))
            .header("x-table-name", table)
            .header("x-table-key", config_key)
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %url, %table, "breaker request could not be built");
                return ProbeResult::Failed;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) if resp.status().is_success() => ProbeResult::Closed,
            Ok(resp) => {
                debug!(status = %resp.status(), %url, "breaker answered non-2xx");
                ProbeResult::Open(resp.status().as_u16())
            }
            Err(e) => {
                debug!(error = %e, %url, "breaker request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%url, "breaker request timed out");
            ProbeResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_path() {
        let endpoint =
            Endpoint::parse("http://breaker.local:8080/status?env=prod", Duration::from_secs(1))
                .unwrap();
        assert_eq!(endpoint.authority, "breaker.local:8080");
        assert_eq!(endpoint.path, "/status?env=prod");
    }

    #[test]
    fn default_port_and_path() {
        let endpoint = Endpoint::parse("http://breaker.local", Duration::from_secs(1)).unwrap();
        assert_eq!(endpoint.authority, "breaker.local:80");
        assert_eq!(endpoint.path, "/");
    }

    #[test]
    fn rejects_https_and_credentials() {
        assert!(Endpoint::parse("https://breaker.local/", Duration::from_secs(1)).is_err());
        assert!(Endpoint::parse("http://u:p@breaker.local/", Duration::from_secs(1)).is_err());
        assert!(Endpoint::parse("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn only_closed_is_not_open() {
        assert!(!ProbeResult::Closed.is_open());
        assert!(ProbeResult::Open(503).is_open());
        assert!(ProbeResult::Failed.is_open());
    }
}
