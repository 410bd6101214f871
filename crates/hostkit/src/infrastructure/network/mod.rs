//! HTTP adapter: manifest fetches and archive downloads over `reqwest`.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tracing::debug;

use crate::application::ports::{Fetcher, NetworkError};

/// Upper bound for one request, including the body of a large archive.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Blocking HTTP GET client.
///
/// Non-2xx responses and empty bodies are errors, so a CDN error page or a
/// truncated response never reaches `tar`.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`NetworkError::Transport`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent(concat!("hostkit/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NetworkError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Response, NetworkError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| NetworkError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, NetworkError> {
        let body = self.get(url)?.text().map_err(|e| NetworkError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if body.trim().is_empty() {
            return Err(NetworkError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(body)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64, NetworkError> {
        let mut response = self.get(url)?;
        let io_err = |source| NetworkError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut file = File::create(dest).map_err(io_err)?;
        let written = response
            .copy_to(&mut file)
            .map_err(|e| NetworkError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        file.sync_all().map_err(io_err)?;

        if written == 0 {
            return Err(NetworkError::EmptyBody {
                url: url.to_string(),
            });
        }
        debug!("wrote {written} bytes to {}", dest.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_host_is_transport_error() {
        // Arrange: port 9 (discard) on loopback is closed on test hosts.
        let fetcher = HttpFetcher::new().unwrap();

        // Act
        let result = fetcher.fetch_text("http://127.0.0.1:9/manifest.json");

        // Assert
        assert!(matches!(result, Err(NetworkError::Transport { .. })));
    }

    #[test]
    fn test_invalid_url_is_transport_error() {
        let fetcher = HttpFetcher::new().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let result = fetcher.download("not a url", &dir.path().join("x.tar.gz"));

        assert!(matches!(result, Err(NetworkError::Transport { .. })));
        assert!(!dir.path().join("x.tar.gz").exists());
    }
}
