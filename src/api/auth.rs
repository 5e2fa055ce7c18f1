// Auth endpoints and the session lifecycle operations built on them.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::http::{ApiClient, ApiError};
use crate::session::User;

const AUTH_PREFIX: &str = "/auth";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Web,
    Mobile,
    Desktop,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Token payload returned by a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Register a new account. Does not log the user in.
pub async fn register(client: &ApiClient, req: &RegisterRequest) -> Result<User, ApiError> {
    client.post(&format!("{AUTH_PREFIX}/register"), req).await
}

/// Authenticate and install the returned session: on success the token pair
/// and user profile are stored in memory and durable storage before the
/// payload is handed back.
pub async fn login(client: &ApiClient, req: &LoginRequest) -> Result<TokenResponse, ApiError> {
    let tokens: TokenResponse = client.post(&format!("{AUTH_PREFIX}/login"), req).await?;
    client
        .session()
        .set_session(&tokens.access_token, &tokens.refresh_token, &tokens.user)
        .map_err(ApiError::Storage)?;
    Ok(tokens)
}

/// Log out: best-effort notify the backend, then clear local state
/// unconditionally. A failed or unreachable backend never leaves the client
/// in an apparently-logged-in state.
pub async fn logout(client: &ApiClient) -> Result<(), ApiError> {
    if client.session().is_logged_in() {
        if let Err(e) = client.post_empty::<()>(&format!("{AUTH_PREFIX}/logout")).await {
            warn!(error = %e, "backend logout failed; clearing local session anyway");
        }
    }
    client.session().clear().map_err(ApiError::Storage)
}

/// Refresh the cached user profile. On failure the prior profile is left
/// untouched and the error is surfaced to the caller.
pub async fn fetch_current_user(client: &ApiClient) -> Result<User, ApiError> {
    let user: User = client.get(&format!("{AUTH_PREFIX}/me")).await?;
    client.session().set_user(&user).map_err(ApiError::Storage)?;
    Ok(user)
}

/// Change the account password. The session is untouched.
pub async fn change_password(
    client: &ApiClient,
    req: &ChangePasswordRequest,
) -> Result<(), ApiError> {
    client.post(&format!("{AUTH_PREFIX}/password/change"), req).await
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
