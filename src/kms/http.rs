//! HTTP client for a remote key custodian
//!
//! Wire protocol (JSON, byte fields standard base64):
//!
//! - `POST {endpoint}/v1/{keyPath}:encrypt` with `{plaintext, keyVersion?}`
//!   returns `{ciphertext, keyVersion}`
//! - `POST {endpoint}/v1/{keyPath}/versions/{keyVersion}:decrypt` with
//!   `{ciphertext}` returns `{plaintext}`
//! - `GET {endpoint}/healthz` returns any 2xx when the custodian is live

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::custodian::{CustodianCiphertext, CustodianError, KeyCustodian};
use crate::error::{VaultError, VaultResult};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptRequest<'a> {
    /// Base64 data key, borrowed from a buffer that is scrubbed on drop
    plaintext: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_version: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptResponse {
    ciphertext: String,
    key_version: String,
}

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

/// Key custodian reached over HTTPS
pub struct HttpCustodian {
    client: Client,
    endpoint: String,
    token: Option<Zeroizing<String>>,
}

impl HttpCustodian {
    /// Create a client for the custodian at `endpoint`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> VaultResult<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(VaultError::Config("KMS endpoint is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            token: None,
        })
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Zeroizing::new(token.into()));
        self
    }

    /// The base URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        key_path: &str,
        key_version: &str,
    ) -> Result<T, CustodianError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| CustodianError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, key_path, key_version));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CustodianError::Malformed(e.to_string()))
    }
}

/// Map a non-success HTTP status to a custodian error
pub fn classify_status(
    status: StatusCode,
    body: &str,
    key_path: &str,
    key_version: &str,
) -> CustodianError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CustodianError::AccessDenied(format!("{}: {}", status, body))
        }
        StatusCode::NOT_FOUND => CustodianError::KeyVersionNotFound {
            key_path: key_path.to_string(),
            key_version: key_version.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => CustodianError::Throttled,
        StatusCode::REQUEST_TIMEOUT => CustodianError::Unavailable(status.to_string()),
        s if s.is_server_error() => CustodianError::Unavailable(format!("{}: {}", s, body)),
        s => CustodianError::Rejected(format!("{}: {}", s, body)),
    }
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>, CustodianError> {
    STANDARD
        .decode(value)
        .map_err(|e| CustodianError::Malformed(format!("{} is not base64: {}", field, e)))
}

#[async_trait]
impl KeyCustodian for HttpCustodian {
    async fn encrypt(
        &self,
        key_path: &str,
        key_version: Option<&str>,
        plaintext: &[u8],
    ) -> Result<CustodianCiphertext, CustodianError> {
        let url = format!("{}/v1/{}:encrypt", self.endpoint, key_path);
        let encoded = Zeroizing::new(STANDARD.encode(plaintext));
        let body = EncryptRequest {
            plaintext: encoded.as_str(),
            key_version,
        };

        let response: EncryptResponse = self
            .send(
                self.client.post(url).json(&body),
                key_path,
                key_version.unwrap_or("primary"),
            )
            .await?;

        if response.key_version.is_empty() {
            return Err(CustodianError::Malformed("empty keyVersion".to_string()));
        }

        Ok(CustodianCiphertext {
            ciphertext: decode("ciphertext", &response.ciphertext)?,
            key_version: response.key_version,
        })
    }

    async fn decrypt(
        &self,
        key_path: &str,
        key_version: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CustodianError> {
        let url = format!(
            "{}/v1/{}/versions/{}:decrypt",
            self.endpoint, key_path, key_version
        );
        let body = DecryptRequest {
            ciphertext: STANDARD.encode(ciphertext),
        };

        let response: DecryptResponse = self
            .send(self.client.post(url).json(&body), key_path, key_version)
            .await?;
        let plaintext = Zeroizing::new(response.plaintext);

        decode("plaintext", &plaintext).map(Zeroizing::new)
    }

    async fn health_check(&self) -> Result<(), CustodianError> {
        let url = format!("{}/healthz", self.endpoint);
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| CustodianError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CustodianError::Unavailable(response.status().to_string()))
        }
    }
}
