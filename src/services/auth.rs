use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::AuthError;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// An authenticated user. Handed to every operation that acts on their behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub id_token: String,
    pub email_verified: bool,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Creates the account and sends a verification email. The returned
    /// session is unverified until the user follows the link.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Resolves an id token issued by [`Authenticator::authenticate`] back into a session.
    async fn verify(&self, id_token: &str) -> Result<Session, AuthError>;
}

/// Email/password accounts through the Firebase Identity Toolkit REST API.
pub struct FirebaseAuthenticator {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
    email: String,
    local_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuthenticator {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = format!("{}/accounts:{}?key={}", self.base_url, method, self.api_key);
        debug!("Calling identity provider: accounts:{}", method);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !status.is_success() {
            let code = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            warn!("accounts:{} rejected: {}", method, code);
            return Err(map_provider_error(&code));
        }

        serde_json::from_str(&text).map_err(|e| AuthError::Provider(format!("unexpected response: {}", e)))
    }

    async fn lookup(&self, id_token: &str) -> Result<LookupUser, AuthError> {
        let response: LookupResponse = self.call("lookup", json!({ "idToken": id_token })).await?;
        response.users.into_iter().next().ok_or(AuthError::InvalidToken)
    }
}

#[async_trait]
impl Authenticator for FirebaseAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let token: TokenResponse = self
            .call(
                "signInWithPassword",
                json!({
                    "email": credentials.email,
                    "password": credentials.password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let user = self.lookup(&token.id_token).await?;
        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        info!("User {} signed in", token.email);
        Ok(Session {
            user_id: token.local_id,
            email: token.email,
            id_token: token.id_token,
            email_verified: true,
        })
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let token: TokenResponse = self
            .call(
                "signUp",
                json!({
                    "email": credentials.email,
                    "password": credentials.password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                json!({ "requestType": "VERIFY_EMAIL", "idToken": token.id_token }),
            )
            .await?;

        info!("User {} signed up, verification email sent", token.email);
        Ok(Session {
            user_id: token.local_id,
            email: token.email,
            id_token: token.id_token,
            email_verified: false,
        })
    }

    async fn verify(&self, id_token: &str) -> Result<Session, AuthError> {
        let user = self.lookup(id_token).await?;
        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }
        Ok(Session {
            user_id: user.local_id,
            email: user.email,
            id_token: id_token.to_string(),
            email_verified: true,
        })
    }
}

/// Maps Identity Toolkit error codes such as `WEAK_PASSWORD : Password should be ...`.
fn map_provider_error(message: &str) -> AuthError {
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL"
        | "USER_DISABLED" => AuthError::InvalidCredentials,
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "WEAK_PASSWORD" => AuthError::WeakPassword,
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" => AuthError::InvalidToken,
        _ => AuthError::Provider(message.to_string()),
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}
