use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::locale::Locale;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    match profiled_env_opt(profile, key) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Unparsable config value, using default");
                default
            }
        },
        None => default,
    }
}

/// Like [`profiled_env_parse`] for keys without a default.
fn profiled_env_parse_opt<T: std::str::FromStr>(profile: &str, key: &str) -> Option<T> {
    let raw = profiled_env_opt(profile, key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Unparsable config value, ignoring");
            None
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub tool_loop: ToolLoopConfig,
    pub retry: RetryDefaults,
    pub locale: Locale,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FLOWTOOL_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FLOWTOOL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            tool_loop: ToolLoopConfig::from_env_profiled(p),
            retry: RetryDefaults::from_env_profiled(p),
            locale: profiled_env_parse(p, "FLOWTOOL_LOCALE", Locale::En),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  tool_loop:  max_rounds={}, tool_timeout_ms={}",
            self.tool_loop.max_tool_call_rounds,
            self.tool_loop.tool_call_timeout_ms
        );
        tracing::info!(
            "  retry:      max_retries={}, initial_delay_ms={}, max_delay_ms={}, multiplier={}",
            self.retry.max_retries,
            self.retry.initial_delay_ms,
            self.retry.max_delay_ms,
            self.retry.backoff_multiplier
        );
        tracing::info!("  locale:     {}", self.locale);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            tool_loop: ToolLoopConfig::default(),
            retry: RetryDefaults::default(),
            locale: Locale::En,
        }
    }
}

// ── Function-calling loop ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolLoopConfig {
    pub max_tool_call_rounds: u32,
    pub tool_call_timeout_ms: u64,
}

impl ToolLoopConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            max_tool_call_rounds: profiled_env_parse(
                p,
                "MAX_TOOL_CALL_ROUNDS",
                defaults.max_tool_call_rounds,
            ),
            tool_call_timeout_ms: profiled_env_parse(
                p,
                "TOOL_CALL_TIMEOUT_MS",
                defaults.tool_call_timeout_ms,
            ),
        }
    }
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_tool_call_rounds: 10,
            tool_call_timeout_ms: 60_000,
        }
    }
}

// ── MCP retry policy ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDefaults {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: Option<f64>,
    /// Per-attempt timeout for remote tool calls.
    pub timeout_ms: u64,
}

impl RetryDefaults {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: profiled_env_parse(p, "MCP_MAX_RETRIES", defaults.max_retries),
            initial_delay_ms: profiled_env_parse(
                p,
                "MCP_INITIAL_DELAY_MS",
                defaults.initial_delay_ms,
            ),
            max_delay_ms: profiled_env_parse(p, "MCP_MAX_DELAY_MS", defaults.max_delay_ms),
            backoff_multiplier: profiled_env_parse(
                p,
                "MCP_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            ),
            jitter_factor: profiled_env_parse_opt(p, "MCP_JITTER_FACTOR"),
            timeout_ms: profiled_env_parse(p, "MCP_TIMEOUT_MS", defaults.timeout_ms),
        }
        .sanitized()
    }

    /// First setting that would make the retry policy unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !valid_multiplier(self.backoff_multiplier) {
            return Err(ConfigError::InvalidValue {
                key: "MCP_BACKOFF_MULTIPLIER".into(),
                value: self.backoff_multiplier.to_string(),
            });
        }
        if let Some(jitter) = self.jitter_factor.filter(|j| !valid_jitter(*j)) {
            return Err(ConfigError::InvalidValue {
                key: "MCP_JITTER_FACTOR".into(),
                value: jitter.to_string(),
            });
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                key: "MCP_INITIAL_DELAY_MS".into(),
                value: format!(
                    "{} (exceeds MCP_MAX_DELAY_MS {})",
                    self.initial_delay_ms, self.max_delay_ms
                ),
            });
        }
        Ok(())
    }

    /// Replace each unusable setting with its default, warning per key.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !valid_multiplier(self.backoff_multiplier) {
            tracing::warn!(
                key = "MCP_BACKOFF_MULTIPLIER",
                value = self.backoff_multiplier,
                "Backoff multiplier must be finite and >= 1, using default"
            );
            self.backoff_multiplier = defaults.backoff_multiplier;
        }
        if let Some(jitter) = self.jitter_factor.filter(|j| !valid_jitter(*j)) {
            tracing::warn!(
                key = "MCP_JITTER_FACTOR",
                value = jitter,
                "Jitter factor must be within [0, 1], disabling jitter"
            );
            self.jitter_factor = None;
        }
        if self.initial_delay_ms > self.max_delay_ms {
            tracing::warn!(
                key = "MCP_INITIAL_DELAY_MS",
                value = self.initial_delay_ms,
                max_delay_ms = self.max_delay_ms,
                "Initial delay exceeds max delay, using default"
            );
            self.initial_delay_ms = defaults.initial_delay_ms.min(self.max_delay_ms);
        }
        self
    }
}

fn valid_multiplier(multiplier: f64) -> bool {
    multiplier.is_finite() && multiplier >= 1.0
}

fn valid_jitter(jitter: f64) -> bool {
    (0.0..=1.0).contains(&jitter)
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: None,
            timeout_ms: 30_000,
        }
    }
}
