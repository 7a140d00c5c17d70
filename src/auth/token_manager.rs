//! Cache-or-renew orchestration on top of a [`TokenProvider`].

use std::time::SystemTime;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::store::TokenStore;
use super::token::{FreshnessPolicy, Token};
use super::TokenProvider;

#[derive(Debug, thiserror::Error)]
pub enum Error<RenewalError> {
    #[error("token provider: {0}")]
    Provider(#[source] RenewalError),
}

pub struct TokenManager<Provider> {
    provider: Provider,
    store: Box<dyn TokenStore>,
    policy: FreshnessPolicy,
    /// Serializes renewals within this process. Independent processes sharing
    /// the same slot may still race; each would mint an equally valid token.
    renewal: Mutex<()>,
}

impl<Provider> TokenManager<Provider>
where
    Provider: TokenProvider,
{
    pub fn new(provider: Provider, store: Box<dyn TokenStore>, policy: FreshnessPolicy) -> Self {
        Self {
            provider,
            store,
            policy,
            renewal: Mutex::const_new(()),
        }
    }

    /// Return the cached token if it is still fresh, renewing it otherwise.
    pub async fn get_token(&self) -> Result<Token, Error<Provider::Error>> {
        self.token(false).await
    }

    /// Renew unconditionally, skipping the cached slot. For callers whose
    /// previous token was rejected by the bank mid-flight.
    pub async fn force_renew(&self) -> Result<Token, Error<Provider::Error>> {
        self.token(true).await
    }

    async fn token(&self, bypass_cache: bool) -> Result<Token, Error<Provider::Error>> {
        let _renewal = self.renewal.lock().await;

        if !bypass_cache {
            if let Some(token) = self.store.read() {
                if self.policy.is_fresh(&token, SystemTime::now()) {
                    debug!(message = "Using cached token", token_issued_at = ?token.issued_at);
                    return Ok(token);
                }
                debug!(message = "Cached token stale, renewing", token_issued_at = ?token.issued_at);
            }
        }

        info!(
            message = "Requesting a new access token",
            bypass_cache = bypass_cache,
        );

        let token = self
            .provider
            .get_auth_token()
            .await
            .map_err(Error::Provider)?;
        self.store.write(&token);

        debug!(message = "Got new token", token_issued_at = ?token.issued_at);

        Ok(token)
    }
}

#[async_trait::async_trait]
impl<Provider> TokenProvider for TokenManager<Provider>
where
    Provider: TokenProvider,
{
    type Error = Error<Provider::Error>;

    async fn get_auth_token(&self) -> Result<Token, Self::Error> {
        self.get_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{FileStore, MemoryStore};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        value: String,
    }

    #[async_trait::async_trait]
    impl TokenProvider for CountingProvider {
        type Error = Infallible;

        async fn get_auth_token(&self) -> Result<Token, Self::Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Token::new(
                format!("{}-{}", self.value, n),
                SystemTime::now(),
                Duration::from_secs(600),
            ))
        }
    }

    fn counting_provider(value: &str) -> (CountingProvider, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            calls: Arc::clone(&calls),
            value: value.into(),
        };
        (provider, calls)
    }

    #[tokio::test]
    async fn second_request_reuses_cached_token() {
        let (provider, calls) = counting_provider("tok");
        let manager = TokenManager::new(
            provider,
            Box::new(MemoryStore::new()),
            FreshnessPolicy::new(80),
        );

        let first = manager.get_token().await.unwrap();
        let second = manager.get_token().await.unwrap();
        assert_eq!(first.access_token, "tok-1");
        assert_eq!(second.access_token, "tok-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_renew_bypasses_a_fresh_cache() {
        let (provider, calls) = counting_provider("tok");
        let manager = TokenManager::new(
            provider,
            Box::new(MemoryStore::new()),
            FreshnessPolicy::new(80),
        );

        manager.get_token().await.unwrap();
        let renewed = manager.force_renew().await.unwrap();
        assert_eq!(renewed.access_token, "tok-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_tolerance_renews_on_every_request() {
        let (provider, calls) = counting_provider("tok");
        let manager = TokenManager::new(
            provider,
            Box::new(MemoryStore::new()),
            FreshnessPolicy::new(0),
        );

        manager.get_token().await.unwrap();
        manager.get_token().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shared_slot_spares_a_second_process_its_grant() {
        let dir = tempfile::tempdir().unwrap();
        let ttl = Duration::from_secs(600);

        let (provider_a, calls_a) = counting_provider("tok-a");
        let manager_a = TokenManager::new(
            provider_a,
            Box::new(FileStore::new(dir.path(), ttl)),
            FreshnessPolicy::new(80),
        );
        manager_a.get_token().await.unwrap();
        assert_eq!(calls_a.load(Ordering::SeqCst), 1);

        let (provider_b, calls_b) = counting_provider("tok-b");
        let manager_b = TokenManager::new(
            provider_b,
            Box::new(FileStore::new(dir.path(), ttl)),
            FreshnessPolicy::new(80),
        );
        let token = manager_b.get_token().await.unwrap();
        assert_eq!(token.access_token, "tok-a-1");
        assert_eq!(calls_b.load(Ordering::SeqCst), 0);
    }
}
