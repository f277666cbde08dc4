use crate::errors::AppError;
use crate::models::{Role, User};
use crate::password;
use crate::state::AppState;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

const SESSION_TTL_HOURS: i64 = 24;

struct SessionEntry {
    user_id: Uuid,
    expires: DateTime<Utc>,
}

// Logins held in memory only; a restart signs everyone out, and a token
// lapses a day after issue.
#[derive(Default)]
pub struct Sessions {
    tokens: Mutex<HashMap<String, SessionEntry>>,
}

impl Sessions {
    pub async fn issue(&self, user_id: Uuid) -> String {
        self.issue_at(user_id, Utc::now()).await
    }

    pub async fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> String {
        let token = password::generate_token();
        let mut tokens = self.tokens.lock().await;
        tokens.retain(|_, entry| entry.expires > now);
        tokens.insert(
            token.clone(),
            SessionEntry {
                user_id,
                expires: now + Duration::hours(SESSION_TTL_HOURS),
            },
        );
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<Uuid> {
        self.resolve_at(token, Utc::now()).await
    }

    pub async fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        let mut tokens = self.tokens.lock().await;
        match tokens.get(token) {
            Some(entry) if entry.expires > now => Some(entry.user_id),
            Some(_) => {
                tokens.remove(token);
                None
            }
            None => None,
        }
    }

    pub async fn revoke(&self, token: &str) {
        self.tokens.lock().await.remove(token);
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// Tokens are re-checked against the document on every request, so a token for
// a deleted account behaves exactly like no token.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = bearer_token(headers)?;
    let user_id = state.sessions.resolve(token).await?;
    let store = state.store.lock().await;
    store.find_user(user_id).cloned()
}

pub async fn authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    current_user(state, headers)
        .await
        .ok_or(AppError::Unauthenticated)
}

// An account flagged for rotation may still inspect its session, log out and
// update its own profile; everything else goes through here and is refused.
pub async fn active_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user = authenticated_user(state, headers).await?;
    if user.must_change_password {
        return Err(AppError::PasswordChangeRequired);
    }
    Ok(user)
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}
