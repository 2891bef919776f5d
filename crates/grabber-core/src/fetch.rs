//! File retrieval over HTTP(S) or from the local filesystem.

use std::path::{Path, PathBuf};

use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error};

use crate::config::FetchConfig;
use crate::content::ContentKind;
use crate::error::{GrabberError, Result};

/// Content type reported for local files with an unrecognized extension.
const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes of a retrieved file and the content type declared for them.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub bytes: Vec<u8>,
    /// Lowercased content type, possibly with parameters.
    pub content_type: String,
}

/// Where a location points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl Location {
    pub fn parse(location: &str) -> Result<Self> {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(location).map_err(|e| GrabberError::Fetch {
                location: location.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Location::Remote(url));
        }

        if lower.starts_with("file://") {
            let path = Url::parse(location)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| GrabberError::Fetch {
                    location: location.to_string(),
                    reason: "invalid file URL".to_string(),
                })?;
            return Ok(Location::Local(path));
        }

        Ok(Location::Local(PathBuf::from(location)))
    }
}

/// Retrieves files for extraction.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GrabberError::Config(format!("invalid header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| GrabberError::Config(format!("invalid value for header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| GrabberError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Retrieve the file at `location`.
    pub async fn fetch(&self, location: &str) -> Result<FetchedFile> {
        let file = match Location::parse(location)? {
            Location::Remote(url) => self.fetch_remote(location, url).await?,
            Location::Local(path) => read_local(location, &path).await?,
        };

        if file.bytes.is_empty() {
            return Err(GrabberError::EmptyContent);
        }

        debug!(
            "Fetched {} bytes from {} ({})",
            file.bytes.len(),
            location,
            file.content_type
        );
        Ok(file)
    }

    async fn fetch_remote(&self, location: &str, url: Url) -> Result<FetchedFile> {
        let fetch_err = |e: reqwest::Error| GrabberError::Fetch {
            location: location.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            error!("HTTP error! Status: {}", status.as_u16());
            return Err(GrabberError::HttpStatus {
                location: location.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let bytes = response.bytes().await.map_err(fetch_err)?.to_vec();
        Ok(FetchedFile {
            bytes,
            content_type,
        })
    }
}

async fn read_local(location: &str, path: &Path) -> Result<FetchedFile> {
    let bytes = tokio::fs::read(path).await.map_err(|e| GrabberError::Fetch {
        location: location.to_string(),
        reason: e.to_string(),
    })?;

    let content_type = ContentKind::from_extension(path)
        .map(|kind| kind.mime_type())
        .unwrap_or(UNKNOWN_CONTENT_TYPE)
        .to_string();

    Ok(FetchedFile {
        bytes,
        content_type,
    })
}
