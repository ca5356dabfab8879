use std::time::Duration;

use thiserror::Error;

use crate::lang::Language;

// ============================================================================
// Config (root)
// ============================================================================

/// Process configuration, sourced from environment variables once at startup
/// and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub params: ModelParams,
    pub limits: LimitsConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub language: Language,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `API_KEY` is required; its absence is a startup-fatal error. Every
    /// other variable falls back to a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let language = match lookup("LANGUAGE") {
            Some(tag) => Language::from_tag(&tag).ok_or_else(|| ConfigError::Invalid {
                var: "LANGUAGE",
                value: tag,
            })?,
            None => Language::default(),
        };

        let config = Self {
            api: ApiConfig {
                api_key,
                base_url: lookup("API_URL").unwrap_or_else(default_base_url),
                model: lookup("MODEL_NAME").unwrap_or_else(default_model),
                timeout_seconds: parse_var(&lookup, "API_TIMEOUT", default_timeout_seconds())?,
            },
            params: ModelParams {
                temperature: parse_var(&lookup, "DEFAULT_TEMPERATURE", default_temperature())?,
                max_tokens: parse_var(&lookup, "DEFAULT_MAX_TOKENS", default_max_tokens())?,
                top_p: parse_var(&lookup, "DEFAULT_TOP_P", default_top_p())?,
                top_k: parse_var(&lookup, "DEFAULT_TOP_K", default_top_k())?,
                repetition_penalty: parse_var(
                    &lookup,
                    "DEFAULT_REPETITION_PENALTY",
                    default_repetition_penalty(),
                )?,
            },
            limits: LimitsConfig {
                max_history: parse_var(&lookup, "MAX_HISTORY_LENGTH", default_max_history())?,
                max_message_len: parse_var(&lookup, "MAX_MESSAGE_LENGTH", default_max_message_len())?,
                max_threads: parse_var(&lookup, "MAX_CHATS", default_max_threads())?,
            },
            rate_limit: RateLimitConfig {
                ceiling: parse_var(&lookup, "RATE_LIMIT_CEILING", default_rate_ceiling())?,
                window_seconds: parse_var(&lookup, "RATE_LIMIT_WINDOW", default_rate_window())?,
                block_on_limit: parse_var(&lookup, "RATE_LIMIT_BLOCK", false)?,
                scope: match lookup("RATE_LIMIT_SCOPE") {
                    Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                        "global" => RateLimitScope::Global,
                        "per-session" | "per_session" => RateLimitScope::PerSession,
                        _ => {
                            return Err(ConfigError::Invalid {
                                var: "RATE_LIMIT_SCOPE",
                                value: raw,
                            });
                        }
                    },
                    None => RateLimitScope::Global,
                },
            },
            retry: RetryConfig {
                max_attempts: parse_var(&lookup, "RETRY_MAX_ATTEMPTS", default_max_attempts())?,
                base_delay_ms: parse_var(&lookup, "RETRY_BASE_DELAY_MS", default_base_delay_ms())?,
                max_delay_ms: parse_var(&lookup, "RETRY_MAX_DELAY_MS", default_max_delay_ms())?,
            },
            language,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.ceiling == 0 {
            return Err(ConfigError::OutOfRange {
                var: "RATE_LIMIT_CEILING",
                reason: "must be at least 1",
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                var: "RETRY_MAX_ATTEMPTS",
                reason: "must be at least 1",
            });
        }
        if self.limits.max_message_len == 0 {
            return Err(ConfigError::OutOfRange {
                var: "MAX_MESSAGE_LENGTH",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(default),
    }
}

// ============================================================================
// ApiConfig
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_model() -> String {
    "local-model".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

// ============================================================================
// ModelParams
// ============================================================================

/// Sampling parameters forwarded verbatim to the completion API.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_top_p() -> f32 {
    0.9
}

fn default_top_k() -> u32 {
    40
}

fn default_repetition_penalty() -> f32 {
    1.1
}

// ============================================================================
// LimitsConfig
// ============================================================================

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Non-system messages kept when building a request; oldest are dropped.
    pub max_history: usize,
    /// Maximum length of a single user message, in characters.
    pub max_message_len: usize,
    /// Maximum number of live threads per manager.
    pub max_threads: usize,
}

fn default_max_history() -> usize {
    20
}

fn default_max_message_len() -> usize {
    4096
}

fn default_max_threads() -> usize {
    50
}

// ============================================================================
// RateLimitConfig
// ============================================================================

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Calls allowed per rolling window.
    pub ceiling: u32,
    pub window_seconds: u64,
    /// Block until the window resets instead of failing fast.
    pub block_on_limit: bool,
    pub scope: RateLimitScope,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Whether the rate limit budget is shared process-wide (one API key) or
/// tracked per user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    Global,
    PerSession,
}

fn default_rate_ceiling() -> u32 {
    5
}

fn default_rate_window() -> u64 {
    60
}

// ============================================================================
// RetryConfig
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total dispatch attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API_KEY is not set")]
    MissingApiKey,

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{var} out of range: {reason}")]
    OutOfRange {
        var: &'static str,
        reason: &'static str,
    },
}

// ============================================================================
// Tests
// ============================================================================
