//! PKCE (Proof Key for Code Exchange) parameters for OAuth 2.0
//!
//! Implements RFC 7636 for a public desktop client that cannot keep a client
//! secret. One [`PkceParameters`] instance belongs to exactly one login
//! attempt and is dropped after the token exchange.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Verifier length in characters (RFC 7636 upper bound).
pub const VERIFIER_LENGTH: usize = 128;

/// Random bytes behind the CSRF state token.
pub const STATE_BYTES: usize = 32;

/// Only challenge method this client emits.
pub const CHALLENGE_METHOD: &str = "S256";

/// RFC 7636 unreserved characters: `[A-Za-z0-9-._~]`.
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier, challenge and CSRF state for a single authorization request
#[derive(Clone, PartialEq, Eq)]
pub struct PkceParameters {
    /// 128 characters from the unreserved set. Kept secret until the code
    /// is exchanged.
    pub verifier: String,

    /// `BASE64URL(SHA256(verifier))` without padding, sent with the
    /// authorization request.
    pub challenge: String,

    /// 32 random bytes, base64url without padding. Must round-trip through
    /// the redirect unchanged.
    pub state: String,
}

impl PkceParameters {
    /// Generate a fresh triple from the thread-local CSPRNG
    ///
    /// # Examples
    /// ```
    /// use meshport_common::auth::pkce::{verify_challenge, PkceParameters};
    ///
    /// let params = PkceParameters::generate();
    /// assert_eq!(params.verifier.len(), 128);
    /// assert!(verify_challenge(&params.verifier, &params.challenge));
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = derive_challenge(&verifier);
        let state = generate_state();

        Self { verifier, challenge, state }
    }

    /// Always `"S256"`
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD
    }

    /// Compare the state echoed by the redirect with the one sent out
    #[must_use]
    pub fn state_matches(&self, received: Option<&str>) -> bool {
        received.is_some_and(|state| state == self.state)
    }
}

// Secrets stay out of logs.
impl fmt::Debug for PkceParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceParameters")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .field("state", &"<redacted>")
            .finish()
    }
}

/// Generate a 128-character verifier drawn uniformly from the unreserved set
#[must_use]
pub fn generate_verifier() -> String {
    let mut rng = rand::thread_rng();
    (0..VERIFIER_LENGTH)
        .map(|_| char::from(VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())]))
        .collect()
}

/// `BASE64URL(SHA256(ASCII(verifier)))`
#[must_use]
pub fn derive_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Random CSRF state token
#[must_use]
pub fn generate_state() -> String {
    let bytes: [u8; STATE_BYTES] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Recompute the challenge for `verifier` and compare it with `challenge`
#[must_use]
pub fn verify_challenge(verifier: &str, challenge: &str) -> bool {
    !verifier.is_empty() && derive_challenge(verifier) == challenge
}

/// True if `verifier` satisfies the RFC 7636 length and charset rules
#[must_use]
pub fn is_valid_verifier(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len()) && verifier.bytes().all(|b| VERIFIER_CHARSET.contains(&b))
}
