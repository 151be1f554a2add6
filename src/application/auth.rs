//! On-behalf-of token exchange against the identity provider.
//!
//! The exchange deliberately fails soft: whatever goes wrong, the caller gets
//! an `ExchangedToken` whose bearer is empty rather than an error. Downstream
//! API calls made with an empty bearer fail at the API boundary, which is
//! where the original deployment surfaced the problem. The failure reason is
//! still kept internally so logs and tests can tell the cases apart.

use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const OBO_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const OBO_TOKEN_USE: &str = "on_behalf_of";

/// Inbound bearer credential, owned by the request and never persisted.
#[derive(Debug, Clone)]
pub struct AccessCredential(String);

impl AccessCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn assertion(&self) -> &str {
        &self.0
    }
}

/// Process-wide confidential client settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub client_id: String,
    pub tenant_id: String,
    pub client_secret: String,
    /// Identity provider base, e.g. `https://login.microsoftonline.com`.
    pub authority: String,
    /// Fixed downstream resource scope, e.g.
    /// `https://graph.microsoft.com/.default`.
    pub audience: String,
}

impl IdentityConfig {
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[derive(Debug, Error)]
pub enum ExchangeFailure {
    #[error("inbound credential is empty")]
    EmptyAssertion,
    #[error("token endpoint request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("identity provider rejected the exchange: {status}")]
    Rejected { status: StatusCode, body: String },
    #[error("token response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("exchange cancelled")]
    Cancelled,
}

/// Outcome of one exchange. Externally this behaves like "token or empty";
/// the typed failure is only observable through `failure()` and logging.
#[derive(Debug)]
pub struct ExchangedToken {
    outcome: Result<String, ExchangeFailure>,
}

impl ExchangedToken {
    fn granted(token: String) -> Self {
        Self { outcome: Ok(token) }
    }

    fn failed(failure: ExchangeFailure) -> Self {
        Self {
            outcome: Err(failure),
        }
    }

    pub fn bearer(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    /// The bearer value attached to downstream requests. Empty on failure,
    /// matching the soft-fail contract.
    pub fn bearer_or_empty(&self) -> &str {
        self.bearer().unwrap_or("")
    }

    pub fn failure(&self) -> Option<&ExchangeFailure> {
        self.outcome.as_ref().err()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges an inbound user credential for a downstream access token.
///
/// Stateless apart from the shared client configuration: every call performs
/// a fresh exchange, nothing is cached across invocations.
#[derive(Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    config: Arc<IdentityConfig>,
}

impl TokenExchanger {
    pub fn new(http: reqwest::Client, config: Arc<IdentityConfig>) -> Self {
        Self { http, config }
    }

    pub fn audience(&self) -> &str {
        &self.config.audience
    }

    /// Perform the on-behalf-of exchange. Never returns an error: any
    /// failure, including cancellation, is folded into the returned token.
    pub async fn exchange(
        &self,
        credential: &AccessCredential,
        cancel: &CancellationToken,
    ) -> ExchangedToken {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ExchangeFailure::Cancelled),
            result = self.try_exchange(credential) => result,
        };

        match outcome {
            Ok(token) => {
                debug!("On-behalf-of exchange succeeded");
                ExchangedToken::granted(token)
            }
            Err(failure) => {
                warn!(%failure, "On-behalf-of exchange failed; continuing unauthenticated");
                ExchangedToken::failed(failure)
            }
        }
    }

    async fn try_exchange(
        &self,
        credential: &AccessCredential,
    ) -> Result<String, ExchangeFailure> {
        if credential.is_empty() {
            return Err(ExchangeFailure::EmptyAssertion);
        }

        let params = [
            ("grant_type", OBO_GRANT_TYPE),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("assertion", credential.assertion()),
            ("scope", self.config.audience.as_str()),
            ("requested_token_use", OBO_TOKEN_USE),
        ];

        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(ExchangeFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeFailure::Rejected { status, body });
        }

        let token: TokenResponse = response.json().await.map_err(ExchangeFailure::Decode)?;
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(authority: &str) -> Arc<IdentityConfig> {
        Arc::new(IdentityConfig {
            client_id: "client-id".into(),
            tenant_id: "tenant-id".into(),
            client_secret: "secret".into(),
            authority: authority.into(),
            audience: "https://graph.microsoft.com/.default".into(),
        })
    }

    fn exchanger_for(authority: &str) -> TokenExchanger {
        TokenExchanger::new(reqwest::Client::new(), config_for(authority))
    }

    #[tokio::test]
    async fn exchanges_credential_for_downstream_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-id/oauth2/v2.0/token"))
            .and(body_string_contains("requested_token_use=on_behalf_of"))
            .and(body_string_contains("assertion=user-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": "obo-token" })),
            )
            .mount(&server)
            .await;

        let exchanger = exchanger_for(&server.uri());
        let token = exchanger
            .exchange(&AccessCredential::new("user-token"), &CancellationToken::new())
            .await;

        assert_eq!(token.bearer(), Some("obo-token"));
        assert!(token.failure().is_none());
    }

    #[tokio::test]
    async fn rejected_exchange_degrades_to_empty_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let exchanger = exchanger_for(&server.uri());
        let token = exchanger
            .exchange(&AccessCredential::new("expired"), &CancellationToken::new())
            .await;

        assert!(token.bearer().is_none());
        assert_eq!(token.bearer_or_empty(), "");
        assert!(matches!(
            token.failure(),
            Some(ExchangeFailure::Rejected { status, .. }) if *status == StatusCode::BAD_REQUEST
        ));
    }

    #[tokio::test]
    async fn unreachable_provider_degrades_to_empty_bearer() {
        // Nothing listens on this port; the connection is refused.
        let exchanger = exchanger_for("http://127.0.0.1:9");
        let token = exchanger
            .exchange(&AccessCredential::new("user-token"), &CancellationToken::new())
            .await;

        assert!(token.bearer().is_none());
        assert!(matches!(token.failure(), Some(ExchangeFailure::Transport(_))));
    }

    #[tokio::test]
    async fn empty_credential_is_not_sent_to_the_provider() {
        let exchanger = exchanger_for("http://127.0.0.1:9");
        let token = exchanger
            .exchange(&AccessCredential::new("  "), &CancellationToken::new())
            .await;

        assert!(matches!(
            token.failure(),
            Some(ExchangeFailure::EmptyAssertion)
        ));
    }

    #[tokio::test]
    async fn cancellation_returns_failed_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "late" }))
                    .set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let exchanger = exchanger_for(&server.uri());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let token = exchanger
            .exchange(&AccessCredential::new("user-token"), &cancel)
            .await;

        assert!(token.bearer().is_none());
        assert!(matches!(token.failure(), Some(ExchangeFailure::Cancelled)));
    }
}
