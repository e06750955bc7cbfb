//! Server settings read from the environment

use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_ANALYSIS_EDGE: u32 = 1600;
const DEFAULT_ANALYSIS_TTL_SECS: u64 = 60 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    /// Long-edge limit of the buffer analysis runs on
    pub max_analysis_edge: u32,
    /// How long an analysis stays addressable after upload
    pub analysis_ttl: Duration,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_analysis_edge: DEFAULT_MAX_ANALYSIS_EDGE,
            analysis_ttl: Duration::from_secs(DEFAULT_ANALYSIS_TTL_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// `PORT`, `MAX_ANALYSIS_EDGE`, `ANALYSIS_TTL_SECS` and `MAX_UPLOAD_BYTES`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parse(&lookup, "PORT").unwrap_or(defaults.port),
            max_analysis_edge: parse(&lookup, "MAX_ANALYSIS_EDGE")
                .filter(|&edge: &u32| edge > 0)
                .unwrap_or(defaults.max_analysis_edge),
            analysis_ttl: parse(&lookup, "ANALYSIS_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.analysis_ttl),
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
        }
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}
