//! Guide download and decompression
//!
//! Plain ureq GET with bounded retry. The payload is gzip-sniffed by magic
//! bytes rather than trusting the config hint or the URL extension; mirrors
//! frequently serve plain XML from `.gz` paths and vice versa.

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

/// Download tuning, overridable from the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum download attempts per source.
    pub max_retries: u32,
    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            connect_timeout_secs: 30,
            read_timeout_secs: 120,
            user_agent: format!("epgfilter/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn build_agent(config: &FetchConfig) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(config.read_timeout_secs)))
        .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
        .build()
        .new_agent()
}

/// Download a guide document, retrying transient failures.
pub fn fetch(url: &str, config: &FetchConfig) -> Result<Vec<u8>, String> {
    let agent = build_agent(config);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match try_fetch(&agent, url, config) {
            Ok(body) => return Ok(body),
            Err(e) if attempts >= config.max_retries => {
                return Err(format!("Download failed after {} attempts: {}", attempts, e));
            }
            Err(e) => {
                warn!("attempt {} for {} failed: {}", attempts, url, e);
                std::thread::sleep(Duration::from_millis(config.retry_delay_ms));
            }
        }
    }
}

fn try_fetch(agent: &ureq::Agent, url: &str, config: &FetchConfig) -> Result<Vec<u8>, String> {
    let response = agent
        .get(url)
        .header("User-Agent", &config.user_agent)
        .call()
        .map_err(|e| format!("Request failed: {}", e))?;

    let status = response.status();
    if status != 200 && status != 206 {
        return Err(format!("HTTP error: {}", status));
    }

    let mut body = Vec::new();
    response
        .into_body()
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| format!("Read failed: {}", e))?;

    Ok(body)
}

/// Gunzip the payload when the gzip magic bytes are present, otherwise pass it
/// through untouched. `gzip_hint` is the config's expectation and only drives
/// a diagnostic when it disagrees with the payload.
pub fn decompress(source: &str, body: Vec<u8>, gzip_hint: bool) -> Result<Vec<u8>, String> {
    let is_gzip = body.starts_with(&[0x1f, 0x8b]);
    if is_gzip != gzip_hint {
        debug!(
            "{}: payload is {}, config says {}",
            source,
            if is_gzip { "gzip" } else { "plain" },
            if gzip_hint { "gzip" } else { "plain" },
        );
    }
    if !is_gzip {
        return Ok(body);
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|e| format!("Decompression failed: {}", e))?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn gzip_payload_is_sniffed_and_decoded() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<tv></tv>").unwrap();
        let compressed = encoder.finish().unwrap();

        // Hint does not matter; the magic bytes decide.
        assert_eq!(decompress("test", compressed.clone(), true).unwrap(), b"<tv></tv>");
        assert_eq!(decompress("test", compressed, false).unwrap(), b"<tv></tv>");
    }

    #[test]
    fn plain_payload_passes_through() {
        let body = b"<tv></tv>".to_vec();
        assert_eq!(decompress("test", body.clone(), false).unwrap(), body);
        assert_eq!(decompress("test", body.clone(), true).unwrap(), body);
    }

    #[test]
    fn corrupt_gzip_is_an_error() {
        let mut body = vec![0x1f, 0x8b];
        body.extend_from_slice(b"definitely not a deflate stream");
        assert!(decompress("test", body, true).is_err());
    }
}
