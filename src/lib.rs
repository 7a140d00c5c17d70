//! Client for the Banco do Brasil Open Banking boleto (cobranças) API.
//!
//! Obtains OAuth2 client-credential tokens, caches them in memory or in a
//! shared on-disk slot so independent processes skip redundant grant
//! exchanges, and issues signed register/query requests for boletos.

pub mod auth;
pub mod boletos;
pub mod config;

pub use auth::client_credentials::{ClientCredentials, Error as AuthError};
pub use auth::token_manager::TokenManager;
pub use auth::{FreshnessPolicy, Token, TokenProvider};
pub use boletos::{BoletoClient, Error as ApiError, RemoteError};
pub use config::{Config, ConfigError, Environment, Intent};
