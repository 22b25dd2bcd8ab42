// Asset fetching: one same-origin GET, or a local read

use crate::client::HttpClient;
use looptrack_core::{is_remote, AudioError, Result};
use std::fs;

/// Source of raw asset bytes
pub trait Fetcher: Send + Sync {
    fn fetch(&self, src: &str) -> Result<Vec<u8>>;
}

/// Fetches `http(s)://` sources over the network and everything else from disk
#[derive(Clone)]
pub struct AssetFetcher {
    client: HttpClient,
    max_retries: u32,
}

impl AssetFetcher {
    pub fn new(max_retries: u32) -> Self {
        Self {
            client: HttpClient::new(),
            max_retries,
        }
    }
}

impl Default for AssetFetcher {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Fetcher for AssetFetcher {
    fn fetch(&self, src: &str) -> Result<Vec<u8>> {
        log::info!("Fetching asset: {}", src);
        if is_remote(src) {
            return self.client.get_bytes(src, self.max_retries);
        }

        let bytes = fs::read(src)
            .map_err(|e| AudioError::IoError(format!("read {}: {}", src, e)))?;
        log::debug!("Read {} bytes from {}", bytes.len(), src);
        Ok(bytes)
    }
}
