//! Credential and login callback types

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access / refresh token pair with an absolute expiry
///
/// Replaced wholesale on every successful exchange or refresh; never patched
/// field by field.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl TokenSet {
    /// Build a token set from a token endpoint response received now.
    ///
    /// `expires_at` is always derived as `now + expires_in`.
    #[must_use]
    pub fn issued_now(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        token_type: Option<String>,
    ) -> Self {
        Self::issued_at(Utc::now(), access_token, refresh_token, expires_in, token_type)
    }

    /// Same as [`TokenSet::issued_now`] with an explicit issue time.
    ///
    /// A lifetime past the representable range saturates; use
    /// [`TokenSet::try_issued_at`] to reject it instead.
    #[must_use]
    pub fn issued_at(
        issued_at: DateTime<Utc>,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        token_type: Option<String>,
    ) -> Self {
        let expires_at = expiry_after(issued_at, expires_in).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::with_expiry(expires_at, access_token, refresh_token, token_type)
    }

    /// Checked variant of [`TokenSet::issued_now`].
    ///
    /// Returns `None` when `now + expires_in` is not a valid timestamp.
    #[must_use]
    pub fn try_issued_now(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        token_type: Option<String>,
    ) -> Option<Self> {
        Self::try_issued_at(Utc::now(), access_token, refresh_token, expires_in, token_type)
    }

    /// Checked variant of [`TokenSet::issued_at`].
    #[must_use]
    pub fn try_issued_at(
        issued_at: DateTime<Utc>,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        token_type: Option<String>,
    ) -> Option<Self> {
        let expires_at = expiry_after(issued_at, expires_in)?;
        Some(Self::with_expiry(expires_at, access_token, refresh_token, token_type))
    }

    fn with_expiry(
        expires_at: DateTime<Utc>,
        access_token: String,
        refresh_token: Option<String>,
        token_type: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.filter(|token| !token.is_empty()),
            expires_at,
            token_type: token_type
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
        }
    }

    /// `true` when the token expires within `buffer_seconds` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        now >= self.expires_at - Duration::seconds(buffer_seconds)
    }

    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|token| !token.is_empty())
    }
}

fn expiry_after(issued_at: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    issued_at.checked_add_signed(Duration::try_seconds(expires_in)?)
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &format_args!("<{} chars>", self.access_token.len()))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Outcome of the single browser redirect caught by the loopback listener
///
/// Exactly one of a code or an error is carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackResult {
    Code { code: String, state: Option<String> },
    Error { error: String, description: Option<String>, state: Option<String> },
    /// The listener was stopped before any redirect arrived.
    Cancelled,
}

impl CallbackResult {
    pub const NO_CODE_OR_ERROR: &'static str = "no code or error";

    /// Classify redirect query parameters.
    ///
    /// An `error` parameter wins over a `code`; neither present is reported as
    /// an error result. Empty values count as absent.
    pub fn from_query<'a, I>(params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;

        for (key, value) in params {
            if value.is_empty() {
                continue;
            }
            match key {
                "code" => code = Some(value.to_string()),
                "state" => state = Some(value.to_string()),
                "error" => error = Some(value.to_string()),
                "error_description" => description = Some(value.to_string()),
                _ => {}
            }
        }

        match (error, code) {
            (Some(error), _) => Self::Error { error, description, state },
            (None, Some(code)) => Self::Code { code, state },
            (None, None) => Self::Error {
                error: Self::NO_CODE_OR_ERROR.to_string(),
                description,
                state,
            },
        }
    }

    /// Error result used when the callback could not be processed at all.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Error { error: error.into(), description: None, state: None }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code { code, .. } => Some(code),
            _ => None,
        }
    }

    #[must_use]
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Code { state, .. } | Self::Error { state, .. } => state.as_deref(),
            Self::Cancelled => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { error, .. } => Some(error),
            Self::Cancelled => Some("cancelled"),
            Self::Code { .. } => None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Code { .. })
    }

    /// Human-readable message for error outcomes.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Error { error, description: Some(description), .. } => {
                Some(format!("{error}: {description}"))
            }
            Self::Error { error, description: None, .. } => Some(error.clone()),
            Self::Cancelled => Some("login was cancelled".to_string()),
            Self::Code { .. } => None,
        }
    }
}
