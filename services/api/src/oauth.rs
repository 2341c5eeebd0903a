//! Google OAuth2 login with PKCE

use anyhow::Result;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::Deserialize;
use tracing::info;

use crate::{config::AppConfig, models::NewUser};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Cookie holding the CSRF state between redirect and callback
pub const STATE_COOKIE: &str = "google_oauth_state";
/// Cookie holding the PKCE verifier between redirect and callback
pub const VERIFIER_COOKIE: &str = "google_code_verifier";

/// Authorization redirect prepared for the browser
#[derive(Debug)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub pkce_verifier: String,
}

/// Google OAuth2 client
#[derive(Clone)]
pub struct GoogleOAuth {
    client: BasicClient,
    http: reqwest::Client,
}

impl GoogleOAuth {
    /// Create a client from configuration; `None` when credentials are absent
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        let Some((client_id, client_secret)) = config.google_credentials() else {
            return Ok(None);
        };

        let client = BasicClient::new(
            ClientId::new(client_id.to_string()),
            Some(ClientSecret::new(client_secret.to_string())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())?,
            Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?),
        )
        .set_redirect_uri(RedirectUrl::new(config.google_redirect_url.clone())?);

        Ok(Some(Self {
            client,
            http: reqwest::Client::new(),
        }))
    }

    /// Generate the authorization URL with a PKCE challenge and CSRF state
    pub fn authorization_request(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|scope| Scope::new(scope.to_string())))
            .set_pkce_challenge(pkce_challenge)
            .url();

        AuthorizationRequest {
            url: url.to_string(),
            state: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        }
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, code: String, pkce_verifier: String) -> Result<String> {
        info!("Exchanging Google authorization code");

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(oauth2::reqwest::async_http_client)
            .await?;

        Ok(token_response.access_token().secret().clone())
    }

    /// Fetch the Google profile behind an access token
    pub async fn fetch_profile(&self, access_token: &str) -> Result<GoogleProfile> {
        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to get Google user profile: {}", response.status());
        }

        Ok(response.json().await?)
    }
}

/// Google userinfo response
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl From<GoogleProfile> for NewUser {
    fn from(profile: GoogleProfile) -> Self {
        let name = profile
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| profile.email.clone());
        Self {
            external_identity_id: profile.id,
            email: profile.email,
            name,
            picture_url: profile.picture,
        }
    }
}
