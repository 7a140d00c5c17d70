//! Authorization logic: token acquisition, freshness, and caching.

pub mod client_credentials;
pub mod store;
pub mod token;
pub mod token_manager;

pub use token::{FreshnessPolicy, Token};

/// Source of bearer tokens. Implemented by the raw grant exchange
/// ([`client_credentials::ClientCredentials`]) and by the caching layer on
/// top of it ([`token_manager::TokenManager`]).
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    type Error: Send + Sync;

    async fn get_auth_token(&self) -> Result<Token, Self::Error>;
}
