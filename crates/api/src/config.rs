//! Gateway configuration, read from the process environment.
//!
//! | variable                         | default                    |
//! |----------------------------------|----------------------------|
//! | `TURNSTILE_PROFILES`             | none (comma separated)     |
//! | `TURNSTILE_BIND`                 | `0.0.0.0:8080`             |
//! | `TURNSTILE_SESSION_IDLE_MINUTES` | `30`                       |
//! | `TURNSTILE_ADMIN_PASSWORD`       | unset (no bootstrap admin) |
//! | `RECAPTCHA_SECRET`               | unset (gate skipped)       |
//! | `RECAPTCHA_VERIFY_URL`           | Google `siteverify`        |
//! | `RECAPTCHA_TIMEOUT_SECS`         | `5`                        |
//! | `DATABASE_URL`                   | unset (in-memory store)    |
//!
//! Blank values count as unset.

use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use turnstile_auth::policy::PolicySettings;
use turnstile_infra::verification::{DEFAULT_TIMEOUT, DEFAULT_VERIFY_URL};
use turnstile_observability::LogFormat;

/// Deployment-mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Profile {
    /// Local development: no secure-transport requirement, pretty logs.
    Dev,
    /// Strict CSRF exemption matching.
    DebugCsp,
    /// Auto-provisioning of unknown login usernames.
    Demo,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Dev => "dev",
            Profile::DebugCsp => "debug-csp",
            Profile::Demo => "demo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dev" => Some(Profile::Dev),
            "debug-csp" => Some(Profile::DebugCsp),
            "demo" => Some(Profile::Demo),
            _ => None,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub profiles: BTreeSet<Profile>,
    pub bind: SocketAddr,
    pub session_idle: chrono::Duration,
    /// Password of an `admin` account seeded into the in-memory store.
    pub admin_password: Option<String>,
    pub recaptcha_secret: Option<String>,
    pub verify_url: String,
    pub verify_timeout: Duration,
    pub database_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            profiles: BTreeSet::new(),
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            session_idle: chrono::Duration::minutes(30),
            admin_password: None,
            recaptcha_secret: None,
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            verify_timeout: DEFAULT_TIMEOUT,
            database_url: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(list) = get("TURNSTILE_PROFILES") {
            for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                match Profile::parse(name) {
                    Some(profile) => {
                        config.profiles.insert(profile);
                    }
                    None => warn!(profile = name, "ignoring unknown profile"),
                }
            }
        }

        if let Some(bind) = get("TURNSTILE_BIND") {
            config.bind = bind.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "TURNSTILE_BIND",
                value: bind.clone(),
                reason: e.to_string(),
            })?;
        }

        if let Some(minutes) = get("TURNSTILE_SESSION_IDLE_MINUTES") {
            let parsed = positive("TURNSTILE_SESSION_IDLE_MINUTES", &minutes)?;
            config.session_idle = chrono::Duration::minutes(i64::from(parsed));
        }

        if let Some(seconds) = get("RECAPTCHA_TIMEOUT_SECS") {
            let parsed = positive("RECAPTCHA_TIMEOUT_SECS", &seconds)?;
            config.verify_timeout = Duration::from_secs(u64::from(parsed));
        }

        if let Some(url) = get("RECAPTCHA_VERIFY_URL") {
            config.verify_url = url;
        }
        config.recaptcha_secret = get("RECAPTCHA_SECRET");
        config.admin_password = get("TURNSTILE_ADMIN_PASSWORD");
        config.database_url = get("DATABASE_URL");

        Ok(config)
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.insert(profile);
        self
    }

    pub fn has_profile(&self, profile: Profile) -> bool {
        self.profiles.contains(&profile)
    }

    pub fn is_demo(&self) -> bool {
        self.has_profile(Profile::Demo)
    }

    pub fn policy_settings(&self) -> PolicySettings {
        PolicySettings {
            require_secure_channel: !self.has_profile(Profile::Dev),
            strict_csrf: self.has_profile(Profile::DebugCsp),
        }
    }

    pub fn log_format(&self) -> LogFormat {
        if self.has_profile(Profile::Dev) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

fn positive(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}
