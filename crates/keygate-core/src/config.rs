//! Runtime configuration loaded from TOML, with environment overrides.
//!
//! Every field has a default, so keygate runs without a config file. The
//! defaults are the account API's long-standing policy: three failures
//! within thirty minutes lock a client out, tokens live seven minutes.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub lockout: LockoutConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Brute-force lockout policy.
#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    /// Failures inside the window that lock the client out.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// How long a failure is remembered.
    #[serde(default = "default_block_window_secs")]
    pub block_window_secs: u64,
    /// Minimum spacing between opportunistic full sweeps.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            block_window_secs: default_block_window_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Session token signing.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

/// One rate tier: `per_period` requests every `period_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TierConfig {
    pub per_period: u32,
    pub period_secs: u64,
}

/// Request limits applied per client key.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Applies to every request.
    #[serde(default = "default_global_tier")]
    pub global: TierConfig,
    /// Health/status probes.
    #[serde(default = "default_status_tier")]
    pub status: TierConfig,
    /// First-account bootstrap.
    #[serde(default = "default_bootstrap_tier")]
    pub bootstrap: TierConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global: default_global_tier(),
            status: default_status_tier(),
            bootstrap: default_bootstrap_tier(),
        }
    }
}

fn default_max_attempts() -> usize { 3 }
fn default_block_window_secs() -> u64 { 1800 }
fn default_cleanup_interval_secs() -> u64 { 300 }
fn default_ttl_minutes() -> u64 { 7 }

fn default_global_tier() -> TierConfig {
    TierConfig { per_period: 1, period_secs: 1 }
}

fn default_status_tier() -> TierConfig {
    TierConfig { per_period: 1, period_secs: 60 }
}

fn default_bootstrap_tier() -> TierConfig {
    TierConfig { per_period: 2, period_secs: 3600 }
}

const WEAK_SECRETS: &[&str] = &["change-me", "secret", "password", "jwt-secret"];

impl Settings {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the file does not exist.
    /// - [`CoreError::PermissionDenied`] if the file is not readable.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => CoreError::PermissionDenied(path.to_path_buf()),
            _ => CoreError::Io(e),
        })?;
        toml::from_str(&content).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }

    /// Reads the file named by `KEYGATE_CONFIG` (or starts from defaults),
    /// applies `KEYGATE_*` overrides and validates the result.
    pub fn from_env() -> CoreResult<Self> {
        let mut settings = match std::env::var_os("KEYGATE_CONFIG").map(PathBuf::from) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.finalize()?;
        Ok(settings)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("KEYGATE_JWT_SECRET") {
            self.session.jwt_secret = secret;
        }
        if let Some(ttl) = lookup("KEYGATE_TOKEN_TTL_MINUTES").and_then(|v| v.parse().ok()) {
            self.session.ttl_minutes = ttl;
        }
        if let Some(max) = lookup("KEYGATE_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.lockout.max_attempts = max;
        }
        if let Some(window) = lookup("KEYGATE_BLOCK_WINDOW_SECS").and_then(|v| v.parse().ok()) {
            self.lockout.block_window_secs = window;
        }
        if let Some(every) = lookup("KEYGATE_CLEANUP_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.lockout.cleanup_interval_secs = every;
        }
    }

    /// Fills in a random signing secret when none is set and rejects
    /// placeholder secrets and degenerate limits.
    pub fn finalize(&mut self) -> CoreResult<()> {
        if self.session.jwt_secret.is_empty() {
            self.session.jwt_secret = uuid::Uuid::new_v4().to_string();
            tracing::warn!(
                "No JWT secret configured. Generated random secret (will change on restart)."
            );
        }
        if WEAK_SECRETS.iter().any(|&w| self.session.jwt_secret == w) {
            return Err(CoreError::ConfigParse(
                "JWT secret matches a known weak/placeholder value; set KEYGATE_JWT_SECRET"
                    .to_string(),
            ));
        }
        if self.session.jwt_secret.len() < 32 {
            tracing::warn!("JWT secret is shorter than 32 characters.");
        }

        if self.session.ttl_minutes == 0 || self.session.ttl_minutes.checked_mul(60).is_none() {
            return Err(CoreError::ConfigParse(format!(
                "session.ttl_minutes must be between 1 and {}",
                u64::MAX / 60
            )));
        }

        if self.lockout.max_attempts == 0 {
            return Err(CoreError::ConfigParse(
                "lockout.max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, tier) in [
            ("global", self.rate_limit.global),
            ("status", self.rate_limit.status),
            ("bootstrap", self.rate_limit.bootstrap),
        ] {
            if tier.per_period == 0 || tier.period_secs == 0 {
                return Err(CoreError::ConfigParse(format!(
                    "rate_limit.{name} needs per_period and period_secs above zero"
                )));
            }
        }
        Ok(())
    }
}
