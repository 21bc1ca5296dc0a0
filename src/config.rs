use std::time::Duration;

use crate::acquire::{AcceptancePolicy, ProxyEndpoint};

// ── Defaults ─────────────────────────────────────────────────────────────────

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 4000;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MIN_BODY_CHARS: usize = 1000;
const DEFAULT_DENIAL_MARKERS: &[&str] = &["Access Denied"];
const DEFAULT_PROXIES: &[&str] = &[
    "https://api.allorigins.win/raw?url={url}",
    "https://api.codetabs.com/v1/proxy?quest={url}",
];

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

// ── Settings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub extraction: ExtractionConfig,
    pub acquisition: AcquisitionConfig,
}

#[derive(Clone)]
pub struct ExtractionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

// Keeps the credential out of logs.
impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub proxies: Vec<ProxyEndpoint>,
    pub policy: AcceptancePolicy,
    pub condense_html: bool,
    pub insecure_tls: bool,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    /// when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("ANTHROPIC_API_KEY").ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))?;

        let extraction = ExtractionConfig {
            api_key,
            base_url: var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: var("EXTRACTION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_or("EXTRACTION_MAX_TOKENS", var("EXTRACTION_MAX_TOKENS"), DEFAULT_MAX_TOKENS)?,
            timeout: Duration::from_secs(parse_or(
                "GENERATION_TIMEOUT_SECS",
                var("GENERATION_TIMEOUT_SECS"),
                DEFAULT_GENERATION_TIMEOUT_SECS,
            )?),
        };

        let proxies = match var("LISTING_PROXIES") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_PROXIES.iter().map(|s| s.to_string()).collect(),
        };
        if proxies.is_empty() {
            return Err(ConfigError::Invalid {
                var: "LISTING_PROXIES",
                reason: "at least one proxy template is required".to_string(),
            });
        }
        let proxies = proxies
            .into_iter()
            .map(|template| {
                ProxyEndpoint::new(template).map_err(|reason| ConfigError::Invalid {
                    var: "LISTING_PROXIES",
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let denial_markers = match var("LISTING_DENIAL_MARKERS") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_DENIAL_MARKERS.iter().map(|s| s.to_string()).collect(),
        };

        let acquisition = AcquisitionConfig {
            proxies,
            policy: AcceptancePolicy {
                timeout: Duration::from_secs(parse_or(
                    "FETCH_TIMEOUT_SECS",
                    var("FETCH_TIMEOUT_SECS"),
                    DEFAULT_FETCH_TIMEOUT_SECS,
                )?),
                min_body_chars: parse_or(
                    "MIN_LISTING_BODY_CHARS",
                    var("MIN_LISTING_BODY_CHARS"),
                    DEFAULT_MIN_BODY_CHARS,
                )?,
                denial_markers,
            },
            condense_html: parse_bool("CONDENSE_LISTING_HTML", var("CONDENSE_LISTING_HTML"), true)?,
            insecure_tls: var("VEHICLE_EVALUATOR_INSECURE_SSL").as_deref() == Some("1"),
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            extraction,
            acquisition,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}
