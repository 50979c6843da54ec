//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Credential lifecycle
pub const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;
pub const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const LOGIN_TIMEOUT_SECS: u64 = 300;

// Export polling
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_EXPORT_TYPE: &str = "3DTiles";

// Settings collaborator keys
pub const SETTINGS_ACCESS_TOKEN: &str = "accessToken";
pub const SETTINGS_REFRESH_TOKEN: &str = "refreshToken";
pub const SETTINGS_EXPIRY: &str = "expiry";
pub const SETTINGS_TOKEN_TYPE: &str = "tokenType";
pub const SETTINGS_CLIENT_ID: &str = "clientId";
pub const SETTINGS_REDIRECT_URI: &str = "redirectUri";
