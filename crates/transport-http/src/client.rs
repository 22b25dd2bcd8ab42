// HTTP client configuration and utilities

use looptrack_core::{AudioError, Result};
use std::io::Read;
use std::time::Duration;

/// Refuse bodies larger than this; a looping background track is small
pub const MAX_ASSET_BYTES: u64 = 256 * 1024 * 1024;

const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// Create a configured HTTP agent with proper timeouts and settings
pub fn create_http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(Duration::from_secs(60))
        .timeout_write(Duration::from_secs(30))
        .user_agent(concat!("looptrack/", env!("CARGO_PKG_VERSION")))
        .redirects(10)
        .build()
}

/// HTTP client wrapper
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            agent: create_http_agent(),
        }
    }

    /// GET the whole body, retrying with exponential backoff
    pub fn get_bytes(&self, url: &str, max_retries: u32) -> Result<Vec<u8>> {
        let response = retry_request(&self.agent, url, max_retries)?;
        read_body(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry a request with exponential backoff
pub fn retry_request(agent: &ureq::Agent, url: &str, max_retries: u32) -> Result<ureq::Response> {
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match agent.get(url).call() {
            Ok(response) => return Ok(response),
            // The server answered; asking again will not change a 404
            Err(ureq::Error::Status(code, _)) => {
                return Err(AudioError::NetworkError(format!(
                    "HTTP GET {} returned status {}",
                    url, code
                )));
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < max_retries {
                    let delay = backoff_delay(attempt);
                    log::warn!("Request failed (attempt {}), retrying after {:?}", attempt + 1, delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    Err(AudioError::NetworkError(format!(
        "Request failed after {} attempts: {}",
        max_retries + 1,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// 250 ms doubling per attempt, capped at 16 s
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(250 * 2u64.pow(attempt.min(MAX_BACKOFF_DOUBLINGS)))
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>> {
    let content_length = response
        .header("Content-Length")
        .and_then(|s| s.parse::<u64>().ok());

    if let Some(len) = content_length {
        if len > MAX_ASSET_BYTES {
            return Err(AudioError::LoadError(format!(
                "Asset too large: {} bytes",
                len
            )));
        }
    }

    let capacity = content_length.unwrap_or(0) as usize;
    let mut bytes = Vec::with_capacity(capacity);
    response
        .into_reader()
        .take(MAX_ASSET_BYTES + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| AudioError::NetworkError(format!("Download failed: {}", e)))?;

    if bytes.len() as u64 > MAX_ASSET_BYTES {
        return Err(AudioError::LoadError("Asset too large".to_string()));
    }

    log::info!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}
