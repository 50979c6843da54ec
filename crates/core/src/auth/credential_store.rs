//! Current token set and its validity policy
//!
//! The store is the single owner of the active [`TokenSet`]. Persistence goes
//! through the [`SettingsStore`] port; the store only decides what is valid
//! and how the record is laid out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use meshport_domain::constants::{
    SETTINGS_ACCESS_TOKEN, SETTINGS_CLIENT_ID, SETTINGS_EXPIRY, SETTINGS_REDIRECT_URI,
    SETTINGS_REFRESH_TOKEN, SETTINGS_TOKEN_TYPE, TOKEN_EXPIRY_BUFFER_SECS,
};
use meshport_domain::{AuthConfig, MeshportError, Result, TokenSet};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::ports::SettingsStore;

const ALL_KEYS: [&str; 6] = [
    SETTINGS_ACCESS_TOKEN,
    SETTINGS_REFRESH_TOKEN,
    SETTINGS_EXPIRY,
    SETTINGS_TOKEN_TYPE,
    SETTINGS_CLIENT_ID,
    SETTINGS_REDIRECT_URI,
];

pub struct CredentialStore {
    settings: Arc<dyn SettingsStore>,
    client_id: String,
    redirect_uri: String,
    expiry_buffer_secs: i64,
    current: RwLock<Option<TokenSet>>,
}

impl CredentialStore {
    /// Store bound to one app registration (`client_id` + `redirect_uri`).
    pub fn new(settings: Arc<dyn SettingsStore>, config: &AuthConfig) -> Self {
        Self {
            settings,
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            expiry_buffer_secs: TOKEN_EXPIRY_BUFFER_SECS,
            current: RwLock::new(None),
        }
    }

    pub fn with_expiry_buffer(mut self, seconds: i64) -> Self {
        self.expiry_buffer_secs = seconds;
        self
    }

    pub async fn current(&self) -> Option<TokenSet> {
        self.current.read().await.clone()
    }

    /// A token set is present and does not expire within the buffer.
    pub async fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now()).await
    }

    pub async fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|tokens| !tokens.expires_within(now, self.expiry_buffer_secs))
    }

    /// Present, about to expire, and refreshable.
    pub async fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now()).await
    }

    pub async fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        self.current.read().await.as_ref().is_some_and(|tokens| {
            tokens.expires_within(now, self.expiry_buffer_secs) && tokens.can_refresh()
        })
    }

    /// Replace the current token set and persist it.
    ///
    /// A token set with an empty access token is rejected and nothing
    /// changes.
    pub async fn save(&self, tokens: TokenSet) -> Result<()> {
        if tokens.access_token.is_empty() {
            return Err(MeshportError::InvalidInput(
                "refusing to store a token set without an access token".to_string(),
            ));
        }

        self.settings.set(SETTINGS_ACCESS_TOKEN, &tokens.access_token).await?;
        match tokens.refresh_token.as_deref() {
            Some(refresh) => self.settings.set(SETTINGS_REFRESH_TOKEN, refresh).await?,
            None => self.settings.remove(SETTINGS_REFRESH_TOKEN).await?,
        }
        self.settings.set(SETTINGS_EXPIRY, &tokens.expires_at.timestamp().to_string()).await?;
        self.settings.set(SETTINGS_TOKEN_TYPE, &tokens.token_type).await?;
        self.settings.set(SETTINGS_CLIENT_ID, &self.client_id).await?;
        self.settings.set(SETTINGS_REDIRECT_URI, &self.redirect_uri).await?;

        debug!(expires_at = %tokens.expires_at, has_refresh = tokens.can_refresh(), "Stored token set");
        *self.current.write().await = Some(tokens);
        Ok(())
    }

    /// Load the persisted token set into memory.
    ///
    /// Records written for a different client id or redirect URI, and records
    /// that cannot be parsed, are cleared and reported as absent.
    pub async fn load(&self) -> Result<Option<TokenSet>> {
        let Some(access_token) = self.settings.get(SETTINGS_ACCESS_TOKEN).await? else {
            *self.current.write().await = None;
            return Ok(None);
        };

        let client_id = self.settings.get(SETTINGS_CLIENT_ID).await?;
        let redirect_uri = self.settings.get(SETTINGS_REDIRECT_URI).await?;
        if client_id.as_deref() != Some(self.client_id.as_str())
            || redirect_uri.as_deref() != Some(self.redirect_uri.as_str())
        {
            warn!("Stored credentials belong to another app registration; discarding");
            self.clear().await?;
            return Ok(None);
        }

        let expires_at = self
            .settings
            .get(SETTINGS_EXPIRY)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        let Some(expires_at) = expires_at.filter(|_| !access_token.is_empty()) else {
            warn!("Stored credentials are incomplete; discarding");
            self.clear().await?;
            return Ok(None);
        };

        let tokens = TokenSet {
            access_token,
            refresh_token: self
                .settings
                .get(SETTINGS_REFRESH_TOKEN)
                .await?
                .filter(|token| !token.is_empty()),
            expires_at,
            token_type: self
                .settings
                .get(SETTINGS_TOKEN_TYPE)
                .await?
                .unwrap_or_else(|| "Bearer".to_string()),
        };

        debug!(expires_at = %tokens.expires_at, "Loaded stored token set");
        *self.current.write().await = Some(tokens.clone());
        Ok(Some(tokens))
    }

    /// Forget the token set in memory and in settings.
    pub async fn clear(&self) -> Result<()> {
        *self.current.write().await = None;
        for key in ALL_KEYS {
            self.settings.remove(key).await?;
        }
        debug!("Cleared stored credentials");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::testing::InMemorySettingsStore;

    fn config() -> AuthConfig {
        AuthConfig { client_id: "native-abc".into(), ..AuthConfig::default() }
    }

    fn store() -> (Arc<InMemorySettingsStore>, CredentialStore) {
        let settings = Arc::new(InMemorySettingsStore::new());
        let store = CredentialStore::new(settings.clone(), &config());
        (settings, store)
    }

    fn tokens_expiring_in(seconds: i64) -> TokenSet {
        TokenSet::issued_now("access".into(), Some("refresh".into()), seconds, None)
    }

    #[tokio::test]
    async fn validity_respects_one_minute_buffer() {
        let (_, store) = store();
        let now = Utc::now();

        store.save(TokenSet::issued_at(now, "a".into(), None, 30, None)).await.unwrap();
        assert!(!store.is_valid_at(now).await);

        store.save(TokenSet::issued_at(now, "a".into(), None, 120, None)).await.unwrap();
        assert!(store.is_valid_at(now).await);
    }

    #[tokio::test]
    async fn empty_store_is_not_valid() {
        let (_, store) = store();
        assert!(!store.is_valid().await);
        assert!(!store.needs_refresh().await);
    }

    #[tokio::test]
    async fn needs_refresh_only_when_expiring_with_refresh_token() {
        let (_, store) = store();

        store.save(tokens_expiring_in(30)).await.unwrap();
        assert!(store.needs_refresh().await);

        store.save(TokenSet::issued_now("a".into(), None, 30, None)).await.unwrap();
        assert!(!store.needs_refresh().await);

        store.save(tokens_expiring_in(3600)).await.unwrap();
        assert!(!store.needs_refresh().await);
    }

    #[tokio::test]
    async fn rejects_empty_access_token() {
        let (settings, store) = store();
        let err = store.save(TokenSet::issued_now(String::new(), None, 3600, None)).await;

        assert!(matches!(err, Err(MeshportError::InvalidInput(_))));
        assert!(store.current().await.is_none());
        assert!(settings.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_in_a_new_store() {
        let (settings, store) = store();
        let tokens = tokens_expiring_in(3600);
        store.save(tokens.clone()).await.unwrap();

        assert_eq!(settings.value(SETTINGS_CLIENT_ID).as_deref(), Some("native-abc"));

        let reopened = CredentialStore::new(settings, &config());
        let loaded = reopened.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(loaded.expires_at.timestamp(), tokens.expires_at.timestamp());
        assert!(reopened.is_valid().await);
    }

    #[tokio::test]
    async fn load_discards_other_client_registration() {
        let (settings, store) = store();
        store.save(tokens_expiring_in(3600)).await.unwrap();

        let other = AuthConfig { client_id: "native-other".into(), ..config() };
        let reopened = CredentialStore::new(settings.clone(), &other);

        assert!(reopened.load().await.unwrap().is_none());
        assert!(settings.is_empty());
    }

    #[tokio::test]
    async fn load_discards_unparsable_expiry() {
        let (settings, store) = store();
        store.save(tokens_expiring_in(3600)).await.unwrap();
        settings.set(SETTINGS_EXPIRY, "tomorrow").await.unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (settings, store) = store();
        store.save(tokens_expiring_in(3600)).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.current().await.is_none());
        assert!(settings.is_empty());
    }

    #[tokio::test]
    async fn save_without_refresh_token_removes_stale_one() {
        let (settings, store) = store();
        store.save(tokens_expiring_in(3600)).await.unwrap();
        store
            .save(TokenSet::issued_now("b".into(), None, 3600, None))
            .await
            .unwrap();

        assert!(settings.value(SETTINGS_REFRESH_TOKEN).is_none());
        let expiry = settings.value(SETTINGS_EXPIRY).unwrap().parse::<i64>().unwrap();
        assert!(expiry > (Utc::now() + Duration::minutes(59)).timestamp());
    }
}
