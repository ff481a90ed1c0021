use std::fmt::Debug;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::connection::error::ConnectionError;

/// Transfers the bytes of one URL scheme into a local file.
#[async_trait]
pub trait ProtocolHandler: Send + Sync + Debug {
    /// URL schemes this handler serves
    fn schemes(&self) -> &[&'static str];

    /// Whether a waiting transfer may be canceled by its requester
    fn is_cancelable(&self) -> bool;

    /// Copy `url` into `destination`, adding to `progress` as bytes arrive.
    async fn fetch(&self, url: &Url, destination: &Path, progress: &AtomicU64) -> io::Result<u64>;
}

/// Local files. Copies are not cancelable.
#[derive(Debug, Default)]
pub struct FileProtocolHandler;

#[async_trait]
impl ProtocolHandler for FileProtocolHandler {
    fn schemes(&self) -> &[&'static str] {
        &["file"]
    }

    fn is_cancelable(&self) -> bool {
        false
    }

    async fn fetch(&self, url: &Url, destination: &Path, progress: &AtomicU64) -> io::Result<u64> {
        let source = url.to_file_path().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("'{}' has no local path", url))
        })?;
        let copied = tokio::fs::copy(&source, destination).await?;
        progress.fetch_add(copied, Ordering::SeqCst);
        Ok(copied)
    }
}

/// HTTP and HTTPS, streamed to disk. Transfers are cancelable.
#[derive(Debug, Clone)]
pub struct HttpProtocolHandler {
    client: reqwest::Client,
}

impl HttpProtocolHandler {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ConnectionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProtocolHandler for HttpProtocolHandler {
    fn schemes(&self) -> &[&'static str] {
        &["http", "https"]
    }

    fn is_cancelable(&self) -> bool {
        true
    }

    async fn fetch(&self, url: &Url, destination: &Path, progress: &AtomicU64) -> io::Result<u64> {
        let response = self.client
            .get(url.clone())
            .send()
            .await
            .map_err(io::Error::other)?;

        let status = response.status();
        if !status.is_success() {
            return Err(io::Error::other(format!("HTTP {} for {}", status, url)));
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(io::Error::other)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.fetch_add(chunk.len() as u64, Ordering::SeqCst);
        }
        file.flush().await?;
        Ok(written)
    }
}
