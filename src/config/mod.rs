//! Host-level configuration: the on-disk layout and the global `KEY=value`
//! settings file.

pub mod paths;

pub use paths::Paths;

use crate::error::{Error, Result};
use crate::fsutil::atomic_write;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const HEALTH_TIMEOUT: &str = "HEALTH_TIMEOUT";
pub const PRE_HOOK_POLICY: &str = "PRE_HOOK_POLICY";
pub const PRUNE_IMAGES: &str = "PRUNE_IMAGES";

/// Keys with validation and defaults, in display order.
pub const KNOWN_KEYS: &[&str] = &[WEBHOOK_URL, HEALTH_TIMEOUT, PRE_HOOK_POLICY, PRUNE_IMAGES];

const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 60;

/// What to do when the pre-update hook exits non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreHookPolicy {
    /// End the attempt before anything is changed.
    #[default]
    Abort,
    /// Log the failure and carry on with the update.
    Continue,
}

impl FromStr for PreHookPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(PreHookPolicy::Abort),
            "continue" => Ok(PreHookPolicy::Continue),
            other => Err(Error::Config(format!(
                "{} must be 'abort' or 'continue', got '{}'",
                PRE_HOOK_POLICY, other
            ))),
        }
    }
}

impl fmt::Display for PreHookPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreHookPolicy::Abort => f.write_str("abort"),
            PreHookPolicy::Continue => f.write_str("continue"),
        }
    }
}

/// Effective settings after defaults and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub webhook_url: Option<String>,
    pub health_timeout: Duration,
    pub pre_hook_policy: PreHookPolicy,
    pub prune_images: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
            pre_hook_policy: PreHookPolicy::default(),
            prune_images: true,
        }
    }
}

/// The global configuration file.
///
/// Entries keep file order and unknown keys survive a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    entries: Vec<(String, String)>,
}

impl GlobalConfig {
    /// Load from `path`. A missing file is an empty configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::default();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                Error::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            config.insert(key, value);
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(&quote_value(value));
            out.push('\n');
        }
        atomic_write(path, &out)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Validate and store a value. Known keys are checked, others are kept as-is.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        validate_value(key, value)?;
        self.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn unset(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }

    fn insert(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Resolve effective settings, applying defaults for absent or empty keys.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(url) = self.get(WEBHOOK_URL).filter(|v| !v.trim().is_empty()) {
            validate_value(WEBHOOK_URL, url)?;
            settings.webhook_url = Some(url.trim().to_string());
        }
        if let Some(secs) = self.get(HEALTH_TIMEOUT).filter(|v| !v.trim().is_empty()) {
            settings.health_timeout = Duration::from_secs(parse_timeout(secs)?);
        }
        if let Some(policy) = self.get(PRE_HOOK_POLICY).filter(|v| !v.trim().is_empty()) {
            settings.pre_hook_policy = policy.parse()?;
        }
        if let Some(prune) = self.get(PRUNE_IMAGES).filter(|v| !v.trim().is_empty()) {
            settings.prune_images = parse_bool(prune)?;
        }
        Ok(settings)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let mut chars = key.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid_start || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Config(format!(
            "Invalid configuration key '{}': use letters, digits and underscores",
            key
        )));
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<()> {
    match key {
        WEBHOOK_URL => {
            if value.trim().is_empty() {
                return Ok(());
            }
            let parsed = url::Url::parse(value.trim()).map_err(|e| {
                Error::Config(format!("Invalid {} '{}': {}", WEBHOOK_URL, value, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(Error::Config(format!(
                    "Invalid {} '{}': scheme must be http or https, got '{}'",
                    WEBHOOK_URL,
                    value,
                    parsed.scheme()
                )));
            }
            Ok(())
        }
        HEALTH_TIMEOUT => parse_timeout(value).map(|_| ()),
        PRE_HOOK_POLICY => value.parse::<PreHookPolicy>().map(|_| ()),
        PRUNE_IMAGES => parse_bool(value).map(|_| ()),
        _ => Ok(()),
    }
}

fn parse_timeout(value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(Error::Config(format!(
            "{} must be a positive number of seconds, got '{}'",
            HEALTH_TIMEOUT, value
        ))),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{} must be true or false, got '{}'",
            PRUNE_IMAGES, value
        ))),
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$'));
    if !needs_quotes {
        return value.to_string();
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
