//! Boleto (cobranças) operations against the bank's resource API.

use reqwest::Method;
use serde::Deserialize;

use crate::auth::client_credentials::ClientCredentials;
use crate::auth::store::{FileStore, MemoryStore, TokenStore};
use crate::auth::token_manager::TokenManager;
use crate::auth::{FreshnessPolicy, TokenProvider};
use crate::config::{Config, ConfigError, MAX_REDIRECTS};

/// Error reported by the bank itself, forwarded verbatim for diagnosability.
#[derive(Debug)]
pub struct RemoteError {
    pub details: serde_json::Value,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl std::error::Error for RemoteError {}

#[derive(Debug, thiserror::Error)]
pub enum Error<AuthError> {
    #[error("auth: {0}")]
    Auth(#[source] AuthError),
    #[error("bank service unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("bank service reported an error: {0}")]
    Remote(RemoteError),
}

/// Dispatcher for authenticated calls against the boleto API.
pub struct BoletoClient<AuthTokenProvider> {
    pub client: reqwest::Client,
    pub base_url: String,
    pub app_key: String,
    pub token_provider: AuthTokenProvider,
}

impl BoletoClient<TokenManager<ClientCredentials>> {
    /// Validated constructor over the full configuration surface.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let environment = config.environment();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        let credentials = ClientCredentials {
            client: client.clone(),
            token_url: environment.token_url().to_owned(),
            client_id: config.client_id,
            client_secret: config.client_secret,
            scope: config
                .operation_intent
                .map(|intent| intent.scope().to_owned()),
            token_ttl: config.token_ttl,
        };
        let store: Box<dyn TokenStore> = match &config.token_directory {
            Some(dir) => Box::new(FileStore::new(dir, config.token_ttl)),
            None => Box::new(MemoryStore::new()),
        };
        let token_provider = TokenManager::new(
            credentials,
            store,
            FreshnessPolicy::new(config.tolerance_percent),
        );

        Ok(Self {
            client,
            base_url: environment.api_base_url().to_owned(),
            app_key: config.app_key,
            token_provider,
        })
    }
}

impl<AuthTokenProvider> BoletoClient<AuthTokenProvider>
where
    AuthTokenProvider: TokenProvider,
{
    /// Register a new boleto.
    pub async fn register_boleto(
        &self,
        registration: &model::BoletoRegistration,
    ) -> Result<model::RegisteredBoleto, Error<AuthTokenProvider::Error>> {
        let auth_token = self.auth_token().await?;
        let request = self
            .request(Method::POST, &self.boletos_url(""), &auth_token)
            .json(registration)
            .build()
            .map_err(Error::Unreachable)?;
        self.execute(request).await
    }

    /// Fetch the details of a single registered boleto.
    pub async fn get_boleto(
        &self,
        numero: &str,
        numero_convenio: u64,
    ) -> Result<model::BoletoDetails, Error<AuthTokenProvider::Error>> {
        let auth_token = self.auth_token().await?;
        let url = self.boletos_url(&format!("/{}", numero));
        let request = self
            .request(Method::GET, &url, &auth_token)
            .query(&[("numeroConvenio", numero_convenio)])
            .build()
            .map_err(Error::Unreachable)?;
        self.execute(request).await
    }

    /// List registered boletos matching the given filters.
    pub async fn list_boletos(
        &self,
        query: &model::BoletoListQuery,
    ) -> Result<model::BoletoList, Error<AuthTokenProvider::Error>> {
        let auth_token = self.auth_token().await?;
        let request = self
            .request(Method::GET, &self.boletos_url(""), &auth_token)
            .query(query)
            .build()
            .map_err(Error::Unreachable)?;
        self.execute(request).await
    }

    fn boletos_url(&self, suffix: &str) -> String {
        format!("{}/boletos{}", self.base_url, suffix)
    }

    fn request(&self, method: Method, url: &str, auth_token: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .query(&[("gw-dev-app-key", self.app_key.as_str())])
            .bearer_auth(auth_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
    }

    async fn auth_token(&self) -> Result<String, Error<AuthTokenProvider::Error>> {
        let token = self
            .token_provider
            .get_auth_token()
            .await
            .map_err(Error::Auth)?;
        Ok(token.access_token)
    }

    /// Perform the call and classify the outcome: transport failures are
    /// `Unreachable`, any body carrying an `erros`/`error` member (and any
    /// non-success payload) is `Remote`, everything else deserializes into
    /// the operation's response type.
    async fn execute<T>(
        &self,
        request: reqwest::Request,
    ) -> Result<T, Error<AuthTokenProvider::Error>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .execute(request)
            .await
            .map_err(Error::Unreachable)?;
        let status = response.status();
        let body = response.text().await.map_err(Error::Unreachable)?;

        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(_) => {
                return Err(Error::Remote(RemoteError {
                    details: serde_json::Value::String(body),
                }))
            }
        };
        if let Some(details) = remote_error_details(&value) {
            return Err(Error::Remote(RemoteError { details }));
        }
        if !status.is_success() {
            return Err(Error::Remote(RemoteError { details: value }));
        }
        T::deserialize(&value).map_err(|_| Error::Remote(RemoteError { details: value }))
    }
}

fn remote_error_details(value: &serde_json::Value) -> Option<serde_json::Value> {
    value
        .get("erros")
        .or_else(|| value.get("error"))
        .cloned()
}

pub mod model {
    //! Typed payloads for the boleto endpoints. Unknown response members are
    //! kept in `extra` rather than dropped.

    use serde::{Deserialize, Serialize};

    /// Registration request body. Dates use the bank's `dd.mm.yyyy` format.
    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BoletoRegistration {
        pub numero_convenio: u64,
        pub numero_carteira: u32,
        pub numero_variacao_carteira: u32,
        pub codigo_modalidade: u32,
        pub data_emissao: String,
        pub data_vencimento: String,
        pub valor_original: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub valor_abatimento: Option<f64>,
        /// "A" (accepted) or "N".
        pub codigo_aceite: String,
        pub codigo_tipo_titulo: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub descricao_tipo_titulo: Option<String>,
        pub numero_titulo_cliente: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub numero_titulo_beneficiario: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub mensagem_bloqueto_ocorrencia: Option<String>,
        pub pagador: Pagador,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Pagador {
        /// 1 for CPF, 2 for CNPJ.
        pub tipo_inscricao: u8,
        pub numero_inscricao: u64,
        pub nome: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub endereco: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub cep: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub cidade: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub bairro: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub uf: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub telefone: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RegisteredBoleto {
        pub numero: Option<String>,
        pub numero_carteira: Option<u32>,
        pub numero_variacao_carteira: Option<u32>,
        pub codigo_cliente: Option<u64>,
        pub linha_digitavel: Option<String>,
        pub codigo_barra_numerico: Option<String>,
        pub numero_contrato_cobranca: Option<u64>,
        #[serde(flatten)]
        pub extra: serde_json::Map<String, serde_json::Value>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BoletoDetails {
        pub codigo_estado_titulo_cobranca: Option<u32>,
        pub estado_titulo_cobranca: Option<String>,
        pub data_registro: Option<String>,
        pub data_vencimento: Option<String>,
        pub valor_original: Option<f64>,
        pub contrato: Option<u64>,
        #[serde(flatten)]
        pub extra: serde_json::Map<String, serde_json::Value>,
    }

    /// Filters for the listing endpoint.
    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BoletoListQuery {
        /// "A" for open boletos, "B" for settled ones.
        pub indicador_situacao: String,
        pub agencia_beneficiario: u32,
        pub conta_beneficiario: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub data_inicio_vencimento: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub data_fim_vencimento: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub indice: Option<u32>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BoletoList {
        #[serde(default)]
        pub boletos: Vec<BoletoSummary>,
        pub indicador_continuidade: Option<String>,
        pub quantidade_registros: Option<u32>,
        pub proximo_indice: Option<u32>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BoletoSummary {
        #[serde(rename = "numeroBoletoBB")]
        pub numero_boleto_bb: Option<String>,
        pub data_registro: Option<String>,
        pub data_vencimento: Option<String>,
        pub valor_original: Option<f64>,
        pub carteira_convenio: Option<u32>,
        pub variacao_carteira_convenio: Option<u32>,
        pub codigo_estado_titulo_cobranca: Option<u32>,
        pub estado_titulo_cobranca: Option<String>,
        #[serde(flatten)]
        pub extra: serde_json::Map<String, serde_json::Value>,
    }
}
