//! OAuth token client for the Google identity provider.
//!
//! Uses the installed-application flow: a loopback redirect, PKCE, and an
//! authorization-code exchange. The token client never stores anything;
//! persisting the grant is `ProviderSession`'s job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::callback::CallbackServer;
use super::pkce::{random_state, PkceChallenge};
use super::AuthError;
use crate::api::ApiError;

/// Where Google publishes its OAuth endpoints
const OPENID_CONFIGURATION_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Always show the account chooser and consent screen
    Consent,
    /// Let the provider skip screens the user already answered
    Silent,
}

impl Prompt {
    fn as_param(&self) -> Option<&'static str> {
        match self {
            Prompt::Consent => Some("consent"),
            Prompt::Silent => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[async_trait]
pub trait TokenClient: Send + Sync {
    /// Run the provider's authorization flow and return a fresh access token.
    ///
    /// The returned future may never complete if the user walks away.
    async fn request_access_token(&self, prompt: Prompt) -> Result<TokenResponse, AuthError>;

    /// Revoke a previously issued access token
    async fn revoke(&self, access_token: &str) -> Result<(), AuthError>;
}

/// Receives the authorization URL the user must open
pub type AuthorizePresenter = Arc<dyn Fn(&Url) + Send + Sync>;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub revocation_endpoint: String,
}

pub struct GoogleTokenClient {
    http: Client,
    client_id: String,
    client_secret: Option<String>,
    scopes: Vec<String>,
    endpoints: IdentityEndpoints,
    presenter: AuthorizePresenter,
}

impl GoogleTokenClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        scopes: Vec<String>,
        endpoints: IdentityEndpoints,
        presenter: AuthorizePresenter,
    ) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret,
            scopes,
            endpoints,
            presenter,
        })
    }

    /// Fetch Google's OpenID configuration and build a token client from it
    pub async fn load(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        scopes: Vec<String>,
        presenter: AuthorizePresenter,
    ) -> Result<Self, AuthError> {
        Self::load_from(OPENID_CONFIGURATION_URL, client_id, client_secret, scopes, presenter).await
    }

    /// Build a token client from the OpenID configuration at `configuration_url`
    pub async fn load_from(
        configuration_url: &str,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        scopes: Vec<String>,
        presenter: AuthorizePresenter,
    ) -> Result<Self, AuthError> {
        let mut client = Self::new(
            client_id,
            client_secret,
            scopes,
            IdentityEndpoints {
                authorization_endpoint: String::new(),
                token_endpoint: String::new(),
                revocation_endpoint: String::new(),
            },
            presenter,
        )?;

        let response = client.http.get(configuration_url).send().await?;
        let response = check_response(response).await?;
        client.endpoints = response.json().await?;

        info!(scopes = client.scopes.len(), "Token client initialized");
        Ok(client)
    }

    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
        prompt: Prompt,
    ) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.endpoints.authorization_endpoint)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("state", state)
                .append_pair("code_challenge", code_challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(prompt) = prompt.as_param() {
                pairs.append_pair("prompt", prompt);
            }
        }
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(&self.endpoints.token_endpoint)
            .form(&form)
            .send()
            .await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TokenClient for GoogleTokenClient {
    async fn request_access_token(&self, prompt: Prompt) -> Result<TokenResponse, AuthError> {
        let server = CallbackServer::bind().await?;
        let redirect_uri = server.redirect_uri();
        let pkce = PkceChallenge::generate();
        let state = random_state();

        let url = self.authorization_url(&redirect_uri, &state, &pkce.challenge, prompt)?;
        debug!(?prompt, %redirect_uri, "Waiting for authorization");
        (self.presenter)(&url);

        let code = server.wait_for_code(&state).await?;
        let grant = self.exchange_code(&code, &pkce.verifier, &redirect_uri).await?;
        debug!(expires_in = grant.expires_in, "Authorization code exchanged");
        Ok(grant)
    }

    async fn revoke(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(&self.endpoints.revocation_endpoint)
            .form(&[("token", access_token)])
            .send()
            .await?;
        check_response(response).await?;
        info!("Access token revoked");
        Ok(())
    }
}

async fn check_response(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(presenter: AuthorizePresenter) -> GoogleTokenClient {
        GoogleTokenClient::new(
            "client-123.apps.googleusercontent.com",
            None,
            vec![
                "https://www.googleapis.com/auth/drive".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
            ],
            IdentityEndpoints {
                authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
                revocation_endpoint: "https://oauth2.googleapis.com/revoke".to_string(),
            },
            presenter,
        )
        .unwrap()
    }

    fn no_presenter() -> AuthorizePresenter {
        Arc::new(|_: &Url| {})
    }

    fn params(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_authorization_url_with_consent_prompt() {
        let client = client(no_presenter());
        let url = client
            .authorization_url("http://127.0.0.1:4321", "st", "chal", Prompt::Consent)
            .unwrap();
        let params = params(&url);

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "client-123.apps.googleusercontent.com");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:4321");
        assert_eq!(params["response_type"], "code");
        assert_eq!(
            params["scope"],
            "https://www.googleapis.com/auth/drive https://www.googleapis.com/auth/userinfo.profile"
        );
        assert_eq!(params["state"], "st");
        assert_eq!(params["code_challenge"], "chal");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["prompt"], "consent");
    }

    #[test]
    fn test_authorization_url_silent_has_no_prompt() {
        let client = client(no_presenter());
        let url = client
            .authorization_url("http://127.0.0.1:4321", "st", "chal", Prompt::Silent)
            .unwrap();
        assert!(!params(&url).contains_key("prompt"));
    }

    #[test]
    fn test_parse_openid_configuration() {
        let json = r#"{
            "issuer": "https://accounts.google.com",
            "authorization_endpoint": "https://accounts.google.com/o/oauth2/v2/auth",
            "token_endpoint": "https://oauth2.googleapis.com/token",
            "revocation_endpoint": "https://oauth2.googleapis.com/revoke",
            "scopes_supported": ["openid", "email", "profile"]
        }"#;
        let endpoints: IdentityEndpoints = serde_json::from_str(json).unwrap();
        assert_eq!(endpoints.token_endpoint, "https://oauth2.googleapis.com/token");
        assert_eq!(endpoints.revocation_endpoint, "https://oauth2.googleapis.com/revoke");
    }

    #[test]
    fn test_parse_token_response() {
        let json = r#"{"access_token": "ya29.a0", "expires_in": 3599, "scope": "https://www.googleapis.com/auth/drive", "token_type": "Bearer"}"#;
        let grant: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(grant.access_token, "ya29.a0");
        assert_eq!(grant.expires_in, 3599);
        assert_eq!(grant.token_type.as_deref(), Some("Bearer"));
    }

    // ===== Over HTTP =====

    fn mock_endpoints(server: &MockServer) -> IdentityEndpoints {
        IdentityEndpoints {
            authorization_endpoint: format!("{}/o/oauth2/v2/auth", server.uri()),
            token_endpoint: format!("{}/token", server.uri()),
            revocation_endpoint: format!("{}/revoke", server.uri()),
        }
    }

    fn mock_client(server: &MockServer, client_secret: Option<&str>) -> GoogleTokenClient {
        GoogleTokenClient::new(
            "client-123",
            client_secret.map(str::to_string),
            vec!["https://www.googleapis.com/auth/drive".to_string()],
            mock_endpoints(server),
            no_presenter(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_from_reads_openid_configuration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": "https://accounts.google.com",
                "authorization_endpoint": format!("{}/o/oauth2/v2/auth", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "revocation_endpoint": format!("{}/revoke", server.uri()),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleTokenClient::load_from(
            &format!("{}/.well-known/openid-configuration", server.uri()),
            "client-123",
            None,
            Vec::new(),
            no_presenter(),
        )
        .await
        .unwrap();
        assert_eq!(client.endpoints.token_endpoint, format!("{}/token", server.uri()));
        assert_eq!(client.endpoints.revocation_endpoint, format!("{}/revoke", server.uri()));
    }

    #[tokio::test]
    async fn test_load_from_fails_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = GoogleTokenClient::load_from(&server.uri(), "client-123", None, Vec::new(), no_presenter()).await;
        assert!(matches!(result, Err(AuthError::Provider(ApiError::ServerError(_)))));
    }

    #[tokio::test]
    async fn test_exchange_code_posts_pkce_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("client_id=client-123"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("code_verifier=the-verifier"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("client_secret=shh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh", "expires_in": 3599, "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = mock_client(&server, Some("shh"))
            .exchange_code("auth-code", "the-verifier", "http://127.0.0.1:5000")
            .await
            .unwrap();
        assert_eq!(grant.access_token, "ya29.fresh");
        assert_eq!(grant.expires_in, 3599);
    }

    #[tokio::test]
    async fn test_exchange_code_without_secret_omits_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.fresh", "expires_in": 3599
            })))
            .mount(&server)
            .await;

        mock_client(&server, None)
            .exchange_code("auth-code", "the-verifier", "http://127.0.0.1:5000")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(body.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A5000"));
        assert!(!body.contains("client_secret"));
    }

    #[tokio::test]
    async fn test_exchange_code_maps_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error": "invalid_grant"}"#))
            .mount(&server)
            .await;

        let result = mock_client(&server, None)
            .exchange_code("stale-code", "v", "http://127.0.0.1:5000")
            .await;
        assert!(matches!(
            result,
            Err(AuthError::Provider(ApiError::InvalidResponse(ref msg))) if msg.contains("invalid_grant")
        ));
    }

    #[tokio::test]
    async fn test_revoke_posts_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .and(body_string_contains("token=ya29.old"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        mock_client(&server, None).revoke("ya29.old").await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_token"))
            .mount(&server)
            .await;

        assert!(mock_client(&server, None).revoke("ya29.gone").await.is_err());
    }
}
