//! Client configuration and environment selection.

use std::path::PathBuf;
use std::time::Duration;

/// The only bank code this client speaks for.
pub const BANCO_DO_BRASIL: &str = "001";

/// Token lifetime granted by the bank when the grant response omits one.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(600);
/// Percentage of the ttl after which a cached token is renewed proactively.
pub const DEFAULT_TOLERANCE_PERCENT: u8 = 80;
/// Client-side bound on every network operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
/// Redirects followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bank {0} is not supported by this client")]
    UnsupportedBank(String),
    #[error("token directory {0} does not exist or is not a directory")]
    InvalidTokenDirectory(PathBuf),
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn token_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://oauth.sandbox.bb.com.br/oauth/token",
            Environment::Production => "https://oauth.bb.com.br/oauth/token",
        }
    }

    pub fn api_base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://api.sandbox.bb.com.br/cobrancas/v2",
            Environment::Production => "https://api.bb.com.br/cobrancas/v2",
        }
    }
}

/// The kind of resource operation the caller intends to perform. The grant
/// exchange requests a different scope for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Registering new boletos.
    Registration,
    /// Querying existing boletos.
    Information,
}

impl Intent {
    pub fn scope(&self) -> &'static str {
        match self {
            Intent::Registration => "cobrancas.boletos-requisicao",
            Intent::Information => "cobrancas.boletos-info",
        }
    }
}

/// Everything needed to construct a [`crate::BoletoClient`].
#[derive(Debug, Clone)]
pub struct Config {
    pub bank_code: String,
    pub client_id: String,
    pub client_secret: String,
    pub app_key: String,
    pub sandbox: bool,
    pub operation_intent: Option<Intent>,
    /// Directory for the shared on-disk token slot. When absent the token is
    /// cached in memory only.
    pub token_directory: Option<PathBuf>,
    pub token_ttl: Duration,
    pub tolerance_percent: u8,
    pub timeout: Duration,
}

impl Config {
    pub fn new(
        bank_code: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Self {
        Self {
            bank_code: bank_code.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            app_key: app_key.into(),
            sandbox: false,
            operation_intent: None,
            token_directory: None,
            token_ttl: DEFAULT_TOKEN_TTL,
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn environment(&self) -> Environment {
        if self.sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bank_code != BANCO_DO_BRASIL {
            return Err(ConfigError::UnsupportedBank(self.bank_code.clone()));
        }
        if let Some(dir) = &self.token_directory {
            if !dir.is_dir() {
                return Err(ConfigError::InvalidTokenDirectory(dir.clone()));
            }
        }
        Ok(())
    }
}
