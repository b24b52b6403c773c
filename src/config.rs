//! Configuration management
//!
//! One JSON file per deployment: sources in priority order, the channel
//! allow-list, the reference timezone, merge policy, and output destination.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::FetchConfig;
use crate::merge::MergePolicy;
use crate::output::OutputFormat;

/// One guide mirror. Sources are listed most-trusted first.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub name: String,
    pub url: String,
    /// Whether the mirror is expected to serve gzip. The payload is sniffed
    /// either way; a mismatch is only logged.
    #[serde(default)]
    pub gzip: bool,
}

impl SourceConfig {
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sources: Vec<SourceConfig>,
    /// Channel identifiers to retain, in each source's native identifier
    /// space. Matched verbatim.
    pub channels: Vec<String>,
    /// IANA name of the reference timezone the broadcast day is computed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub merge: MergePolicy,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_timezone() -> String {
    "Europe/Madrid".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("epg-today.xml")
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;

        if config.sources.is_empty() {
            return Err(format!("Config {} lists no sources", path.display()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "sources": [{ "url": "https://example.com/guide.xml" }],
                "channels": ["La 1 HD"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.sources[0].label(), "https://example.com/guide.xml");
        assert!(!config.sources[0].gzip);
        assert_eq!(config.timezone, "Europe/Madrid");
        assert_eq!(config.merge, MergePolicy::FirstWins);
        assert_eq!(config.format, OutputFormat::Xml);
        assert_eq!(config.output, PathBuf::from("epg-today.xml"));
        assert_eq!(config.fetch.max_retries, 3);
    }

    #[test]
    fn full_config_round_trips() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "sources": [
                    { "name": "primary", "url": "https://a.example/guiatv.xml.gz", "gzip": true },
                    { "name": "fallback", "url": "https://b.example/guide.xml" }
                ],
                "channels": ["La 1 HD", "La 2", "Antena 3 HD"],
                "timezone": "Europe/Madrid",
                "merge": "concatenate",
                "output": "./programacion-hoy.json",
                "format": "json",
                "fetch": { "max_retries": 5 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].label(), "primary");
        assert!(config.sources[0].gzip);
        assert_eq!(config.merge, MergePolicy::Concatenate);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.retry_delay_ms, 2000);
    }
}
