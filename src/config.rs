//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Fetch and cache tuning come from a named profile (`standard` or
//! `constrained`) with optional per-field overrides; `settings()`
//! resolves and validates everything before any scan starts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::sources::SourceKind;
use crate::types::{ScanError, ScanRequest};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub fetch: FetchOverrides,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Extra course aliases: `"variant" = "canonical"`.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

/// Resource profile. Constrained targets phones and small devices.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Standard,
    Constrained,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub days_back: i64,
    #[serde(default = "default_days_forward")]
    pub days_forward: i64,
    #[serde(default = "default_min_field")]
    pub min_field_size: u32,
    #[serde(default = "default_max_field")]
    pub max_field_size: u32,
    #[serde(default)]
    pub interactive_fallback: bool,
    /// Overall scan deadline. Unset = no deadline.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

fn default_days_forward() -> i64 {
    1
}

fn default_min_field() -> u32 {
    3
}

fn default_max_field() -> u32 {
    12
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            days_back: 0,
            days_forward: default_days_forward(),
            min_field_size: default_min_field(),
            max_field_size: default_max_field(),
            interactive_fallback: false,
            deadline_secs: None,
        }
    }
}

/// Optional overrides on top of the profile defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FetchOverrides {
    pub max_concurrent_requests: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_base: Option<f64>,
    pub retry_base_delay_ms: Option<u64>,
    pub max_jitter_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    pub ttl_secs: Option<u64>,
    pub manual_fetch_ttl_secs: Option<u64>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".racescan_cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl_secs: None,
            manual_fetch_ttl_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_enabled_sources")]
    pub enabled: Vec<String>,
}

fn default_enabled_sources() -> Vec<String> {
    SourceKind::ALL.iter().map(|k| k.to_string()).collect()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_sources(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Fetch tuning used by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub max_concurrent_requests: usize,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: f64,
    pub base_delay: Duration,
    pub max_jitter: Duration,
    pub cache_ttl: Duration,
    pub manual_fetch_ttl: Duration,
    pub scan_deadline: Option<Duration>,
}

impl FetchSettings {
    /// Defaults for a profile, before overrides.
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Standard => Self {
                max_concurrent_requests: 12,
                request_timeout: Duration::from_secs(30),
                max_retries: 3,
                backoff_base: 2.0,
                base_delay: Duration::from_millis(1000),
                max_jitter: Duration::from_millis(1000),
                cache_ttl: Duration::from_secs(1800),
                manual_fetch_ttl: Duration::from_secs(6 * 3600),
                scan_deadline: None,
            },
            Profile::Constrained => Self {
                max_concurrent_requests: 6,
                request_timeout: Duration::from_secs(45),
                max_retries: 2,
                backoff_base: 1.5,
                base_delay: Duration::from_millis(1000),
                max_jitter: Duration::from_millis(1000),
                cache_ttl: Duration::from_secs(3600),
                manual_fetch_ttl: Duration::from_secs(12 * 3600),
                scan_deadline: None,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        let invalid = |msg: String| Err(ScanError::ConfigInvalid(msg));
        if self.max_concurrent_requests < 1 {
            return invalid("max_concurrent_requests must be at least 1".into());
        }
        if self.request_timeout < Duration::from_secs(1) {
            return invalid("request_timeout must be at least 1s".into());
        }
        if self.backoff_base < 1.0 || !self.backoff_base.is_finite() {
            return invalid(format!(
                "retry_backoff_base must be >= 1.0, got {}",
                self.backoff_base
            ));
        }
        if self.cache_ttl.is_zero() || self.manual_fetch_ttl.is_zero() {
            return invalid("cache TTLs must be positive".into());
        }
        if self.manual_fetch_ttl < self.cache_ttl {
            return invalid(format!(
                "manual_fetch_ttl ({}s) shorter than cache ttl ({}s)",
                self.manual_fetch_ttl.as_secs(),
                self.cache_ttl.as_secs()
            ));
        }
        if matches!(self.scan_deadline, Some(d) if d.is_zero()) {
            return invalid("deadline_secs must be positive".into());
        }
        Ok(())
    }
}

/// Everything a scan needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub request: ScanRequest,
    pub sources: Vec<SourceKind>,
    pub cache_dir: PathBuf,
    pub aliases: HashMap<String, String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve profile defaults and overrides, then validate.
    pub fn settings(&self) -> Result<Settings, ScanError> {
        let o = &self.fetch;
        let mut fetch = FetchSettings::for_profile(self.scan.profile);
        if let Some(v) = o.max_concurrent_requests {
            fetch.max_concurrent_requests = v;
        }
        if let Some(v) = o.request_timeout_secs {
            fetch.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = o.max_retries {
            fetch.max_retries = v;
        }
        if let Some(v) = o.retry_backoff_base {
            fetch.backoff_base = v;
        }
        if let Some(v) = o.retry_base_delay_ms {
            fetch.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = o.max_jitter_ms {
            fetch.max_jitter = Duration::from_millis(v);
        }
        if let Some(v) = self.cache.ttl_secs {
            fetch.cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = self.cache.manual_fetch_ttl_secs {
            fetch.manual_fetch_ttl = Duration::from_secs(v);
        }
        fetch.scan_deadline = self.scan.deadline_secs.map(Duration::from_secs);
        fetch.validate()?;

        let request = ScanRequest {
            days_back: self.scan.days_back,
            days_forward: self.scan.days_forward,
            min_field_size: self.scan.min_field_size,
            max_field_size: self.scan.max_field_size,
            interactive_fallback: self.scan.interactive_fallback,
        };
        request.validate()?;

        if self.sources.enabled.is_empty() {
            return Err(ScanError::ConfigInvalid("no sources enabled".into()));
        }
        let mut sources = Vec::with_capacity(self.sources.enabled.len());
        for id in &self.sources.enabled {
            let kind: SourceKind = id
                .parse()
                .map_err(|e: anyhow::Error| ScanError::ConfigInvalid(e.to_string()))?;
            if !sources.contains(&kind) {
                sources.push(kind);
            }
        }

        Ok(Settings {
            fetch,
            request,
            sources,
            cache_dir: self.cache.dir.clone(),
            aliases: self.aliases.clone(),
        })
    }
}
