// Session state: the current token/user pair, mirrored between memory and
// durable storage.
//
// The store is the exclusive owner of session state. The only writers are
// the auth operations (login / logout / fetch_current_user) and the HTTP
// pipeline's 401 handler; everything else reads snapshots. Every mutation
// holds the state lock across the storage transaction, so the in-memory view
// and the durable view can never be observed out of sync.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{SessionStorage, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER_INFO};

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Banned,
}

/// Immutable snapshot of the authenticated user, refreshed only by explicit
/// fetch-current-user calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub real_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
}

/// In-memory session state with write-through persistence.
pub struct SessionStore {
    state: Mutex<SessionState>,
    storage: SessionStorage,
}

impl SessionStore {
    /// Wrap the given storage, restoring any persisted session into memory.
    ///
    /// A stored user without a stored access token is discarded: the user
    /// profile is only meaningful inside an authenticated session.
    pub fn open(storage: SessionStorage) -> Result<Self> {
        let access_token = storage.get(KEY_ACCESS_TOKEN)?;
        let refresh_token = storage.get(KEY_REFRESH_TOKEN)?;
        let user = if access_token.is_some() {
            match storage.get(KEY_USER_INFO)? {
                Some(json) => match serde_json::from_str(&json) {
                    Ok(user) => Some(user),
                    Err(e) => {
                        warn!(error = %e, "discarding unreadable stored user profile");
                        None
                    }
                },
                None => None,
            }
        } else {
            None
        };

        Ok(Self {
            state: Mutex::new(SessionState {
                access_token,
                refresh_token,
                user,
            }),
            storage,
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state mutex poisoned")
    }

    // -- Read state --

    pub fn access_token(&self) -> Option<String> {
        self.state().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state().user.clone()
    }

    // -- Derived queries (plain functions over the snapshot) --

    pub fn is_logged_in(&self) -> bool {
        self.state().access_token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self.state().user.as_ref().map(|u| &u.role),
            Some(Role::Admin)
        )
    }

    /// The username of the current user, or an empty string when logged out.
    pub fn display_name(&self) -> String {
        self.state()
            .user
            .as_ref()
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    // -- Mutations --

    /// Install a freshly issued session: both tokens and the user profile,
    /// in memory and in durable storage.
    pub fn set_session(&self, access_token: &str, refresh_token: &str, user: &User) -> Result<()> {
        let mut state = self.state();
        let user_json =
            serde_json::to_string(user).context("failed to serialize user profile")?;
        self.storage.set_many(&[
            (KEY_ACCESS_TOKEN, access_token),
            (KEY_REFRESH_TOKEN, refresh_token),
            (KEY_USER_INFO, &user_json),
        ])?;
        state.access_token = Some(access_token.to_string());
        state.refresh_token = Some(refresh_token.to_string());
        state.user = Some(user.clone());
        Ok(())
    }

    /// Replace the cached user profile, leaving the tokens untouched.
    pub fn set_user(&self, user: &User) -> Result<()> {
        let mut state = self.state();
        let user_json =
            serde_json::to_string(user).context("failed to serialize user profile")?;
        self.storage.set(KEY_USER_INFO, &user_json)?;
        state.user = Some(user.clone());
        Ok(())
    }

    /// Null the session everywhere: memory and durable storage.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state();
        self.storage.clear()?;
        state.access_token = None;
        state.refresh_token = None;
        state.user = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
