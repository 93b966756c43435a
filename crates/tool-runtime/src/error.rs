//! Error taxonomy for tool execution and remote tool transports.
//!
//! Every failure that leaves this crate is a [`ClassifiedError`]: a machine
//! [`ErrorCode`], the technical message, a localized user message, an ordered
//! list of remediation suggestions and a `retryable` flag.
//!
//! Raw errors are normalized by [`classify_error`], which applies (in order):
//! an explicit code carried by the error, the HTTP status lookup table, and
//! finally keyword sniffing on the message.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use flowtool_core::Locale;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::messages;

// ── Codes ───────────────────────────────────────────────────────────

/// Closed set of error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Connection
    Unreachable,
    AuthFailed,
    ProtocolError,
    Timeout,
    ConnectionClosed,
    SslError,
    // Tool
    ToolNotFound,
    InvalidParams,
    ExecutionError,
    ParseError,
    // Configuration
    InvalidConfig,
    InvalidUrl,
    MissingAuth,
    // Quota
    RateLimited,
    QuotaExceeded,
    // Server
    ServerError,
    ServiceUnavailable,
    Unknown,
}

/// Coarse grouping of [`ErrorCode`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Connection,
    Tool,
    Configuration,
    Quota,
    Server,
    Unknown,
}

/// Codes that are retried automatically unless a custom predicate is supplied.
pub const RETRYABLE_ERROR_CODES: &[ErrorCode] = &[
    ErrorCode::Unreachable,
    ErrorCode::Timeout,
    ErrorCode::ConnectionClosed,
    ErrorCode::RateLimited,
    ErrorCode::ServiceUnavailable,
];

impl ErrorCode {
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::Unreachable,
        ErrorCode::AuthFailed,
        ErrorCode::ProtocolError,
        ErrorCode::Timeout,
        ErrorCode::ConnectionClosed,
        ErrorCode::SslError,
        ErrorCode::ToolNotFound,
        ErrorCode::InvalidParams,
        ErrorCode::ExecutionError,
        ErrorCode::ParseError,
        ErrorCode::InvalidConfig,
        ErrorCode::InvalidUrl,
        ErrorCode::MissingAuth,
        ErrorCode::RateLimited,
        ErrorCode::QuotaExceeded,
        ErrorCode::ServerError,
        ErrorCode::ServiceUnavailable,
        ErrorCode::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unreachable => "UNREACHABLE",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ConnectionClosed => "CONNECTION_CLOSED",
            ErrorCode::SslError => "SSL_ERROR",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::ExecutionError => "EXECUTION_ERROR",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::MissingAuth => "MISSING_AUTH",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::Unreachable
            | ErrorCode::AuthFailed
            | ErrorCode::ProtocolError
            | ErrorCode::Timeout
            | ErrorCode::ConnectionClosed
            | ErrorCode::SslError => ErrorCategory::Connection,
            ErrorCode::ToolNotFound
            | ErrorCode::InvalidParams
            | ErrorCode::ExecutionError
            | ErrorCode::ParseError => ErrorCategory::Tool,
            ErrorCode::InvalidConfig | ErrorCode::InvalidUrl | ErrorCode::MissingAuth => {
                ErrorCategory::Configuration
            }
            ErrorCode::RateLimited | ErrorCode::QuotaExceeded => ErrorCategory::Quota,
            ErrorCode::ServerError | ErrorCode::ServiceUnavailable => ErrorCategory::Server,
            ErrorCode::Unknown => ErrorCategory::Unknown,
        }
    }

    /// Membership in [`RETRYABLE_ERROR_CODES`].
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_ERROR_CODES.contains(self)
    }

    /// Direct HTTP status lookup. Takes precedence over message sniffing.
    pub fn from_http_status(status: u16) -> Option<ErrorCode> {
        match status {
            400 => Some(ErrorCode::InvalidParams),
            401 | 403 => Some(ErrorCode::AuthFailed),
            404 => Some(ErrorCode::ToolNotFound),
            408 | 504 => Some(ErrorCode::Timeout),
            429 => Some(ErrorCode::RateLimited),
            500 => Some(ErrorCode::ServerError),
            502 | 503 => Some(ErrorCode::ServiceUnavailable),
            501 | 505..=599 => Some(ErrorCode::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Classified error ────────────────────────────────────────────────

/// A normalized, user-presentable error.
///
/// Built once at the failure site. The builder methods consume `self`, so a
/// value is never changed after it has been handed to someone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub code: ErrorCode,
    /// Technical description of what failed.
    pub message: String,
    /// Localized message suitable for end users.
    pub user_message: String,
    /// Ordered remediation checklist.
    pub suggestions: Vec<String>,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl ClassifiedError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::localized(code, message, Locale::default())
    }

    pub fn localized(code: ErrorCode, message: impl Into<String>, locale: Locale) -> Self {
        Self {
            code,
            message: message.into(),
            user_message: messages::user_message(code, locale).to_string(),
            suggestions: messages::suggestions(code, locale)
                .iter()
                .map(|s| s.to_string())
                .collect(),
            retryable: code.is_retryable(),
            http_status: None,
        }
    }

    /// Re-render the user message and suggestions in another locale.
    pub fn with_locale(self, locale: Locale) -> Self {
        Self {
            http_status: self.http_status,
            ..Self::localized(self.code, self.message, locale)
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::ToolNotFound,
            format!("Tool '{}' is not registered", name),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExecutionError, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation timed out after {}ms", after.as_millis()),
        )
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ClassifiedError {}

// ── Classification ──────────────────────────────────────────────────

/// Metadata an error can expose to [`classify_error`].
///
/// Only `Display` is required; the hooks let transport errors short-circuit
/// the heuristics with facts they already know.
pub trait ErrorMetadata: fmt::Display {
    /// An already-classified form of this error, returned unchanged.
    fn classified(&self) -> Option<ClassifiedError> {
        None
    }

    /// An explicit code known at the failure site.
    fn error_code(&self) -> Option<ErrorCode> {
        None
    }

    fn http_status(&self) -> Option<u16> {
        None
    }
}

impl ErrorMetadata for ClassifiedError {
    fn classified(&self) -> Option<ClassifiedError> {
        Some(self.clone())
    }

    fn error_code(&self) -> Option<ErrorCode> {
        Some(self.code)
    }

    fn http_status(&self) -> Option<u16> {
        self.http_status
    }
}

impl ErrorMetadata for String {}

impl ErrorMetadata for &str {}

/// Normalize any error into a [`ClassifiedError`] (English messages).
pub fn classify_error<E: ErrorMetadata + ?Sized>(err: &E) -> ClassifiedError {
    if let Some(classified) = err.classified() {
        return classified;
    }

    let message = err.to_string();
    let status = err.http_status();
    let code = err
        .error_code()
        .or_else(|| status.and_then(ErrorCode::from_http_status))
        .unwrap_or_else(|| classify_message(&message));

    let classified = ClassifiedError::new(code, message);
    match status {
        Some(status) => classified.with_http_status(status),
        None => classified,
    }
}

/// One row of the message-sniffing table.
struct MessageRule {
    code: ErrorCode,
    keywords: &'static [&'static str],
    statuses: &'static [u16],
}

/// Priority-ordered; the first matching rule wins.
const MESSAGE_RULES: &[MessageRule] = &[
    MessageRule {
        code: ErrorCode::Unreachable,
        keywords: &[
            "econnrefused",
            "enotfound",
            "ehostunreach",
            "enetunreach",
            "getaddrinfo",
            "fetch failed",
            "connection refused",
            "could not connect",
            "unreachable",
            "network",
            "dns",
        ],
        statuses: &[],
    },
    MessageRule {
        code: ErrorCode::AuthFailed,
        keywords: &[
            "unauthorized",
            "unauthorised",
            "forbidden",
            "authentication",
            "auth failed",
            "invalid api key",
            "invalid token",
            "permission denied",
        ],
        statuses: &[401, 403],
    },
    MessageRule {
        code: ErrorCode::Timeout,
        keywords: &["timeout", "timed out", "etimedout", "deadline exceeded"],
        statuses: &[],
    },
    MessageRule {
        code: ErrorCode::SslError,
        keywords: &["ssl", "tls", "certificate", "cert_"],
        statuses: &[],
    },
    MessageRule {
        code: ErrorCode::RateLimited,
        keywords: &["rate limit", "rate-limit", "ratelimit", "too many requests"],
        statuses: &[429],
    },
    MessageRule {
        code: ErrorCode::ToolNotFound,
        keywords: &["not found", "unknown tool", "no such tool"],
        statuses: &[404],
    },
    MessageRule {
        code: ErrorCode::InvalidParams,
        keywords: &["invalid", "bad request", "validation"],
        statuses: &[400],
    },
    MessageRule {
        code: ErrorCode::ServerError,
        keywords: &["internal server error"],
        statuses: &[500],
    },
    MessageRule {
        code: ErrorCode::ServiceUnavailable,
        keywords: &["service unavailable", "temporarily unavailable", "overloaded"],
        statuses: &[503],
    },
];

static STATUS_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([1-5][0-9]{2})\b").expect("status token regex"));

/// Keyword/status sniffing over a free-form error message.
pub fn classify_message(message: &str) -> ErrorCode {
    let lowered = message.to_lowercase();
    let statuses: BTreeSet<u16> = STATUS_TOKEN
        .captures_iter(message)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();

    MESSAGE_RULES
        .iter()
        .find(|rule| {
            rule.keywords.iter().any(|k| lowered.contains(k))
                || rule.statuses.iter().any(|s| statuses.contains(s))
        })
        .map(|rule| rule.code)
        .unwrap_or(ErrorCode::Unknown)
}
