//! Session/auth gateway.
//!
//! Owns the bearer token for the client. The token is persisted in the
//! `session` collection so a restarted client resumes where it left off, and
//! every other manager receives the [`Session`] explicitly from here.

use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backend::AuthAuthority;
use crate::db::{Collection, Record, Repository};
use crate::errors::AppError;
use crate::models::{LoginRequest, Session, SignupRequest, User};

/// Query/fragment parameter an external provider redirects back with.
pub const SESSION_ID_PARAM: &str = "session_id";

const STORED_SESSION_ID: &str = "current";

/// The persisted token, one per client store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    id: String,
    token: String,
    user: User,
}

impl Record for StoredSession {
    const COLLECTION: Collection = Collection::Session;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Remove the one-time session identifier from a callback URL.
///
/// The fragment is checked before the query. The parameter is stripped from
/// both, so reloading the rewritten URL cannot replay the exchange.
pub fn take_session_id(url: &mut Url) -> Option<String> {
    let mut found = None;

    if let Some(fragment) = url.fragment().map(str::to_string) {
        let mut kept = Vec::new();
        for part in fragment.split('&') {
            match part.split_once('=') {
                Some((SESSION_ID_PARAM, value)) => {
                    if found.is_none() && !value.is_empty() {
                        found = Some(value.to_string());
                    }
                }
                _ if part.is_empty() => {}
                _ => kept.push(part),
            }
        }
        if kept.is_empty() {
            url.set_fragment(None);
        } else {
            url.set_fragment(Some(&kept.join("&")));
        }
    }

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.iter().any(|(k, _)| k == SESSION_ID_PARAM) {
        let mut kept = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            if key == SESSION_ID_PARAM {
                if found.is_none() && !value.is_empty() {
                    found = Some(value);
                }
            } else {
                kept.push((key, value));
            }
        }
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    found
}

/// Holds the current session and its persisted copy.
pub struct SessionGateway {
    authority: Arc<dyn AuthAuthority>,
    store: Repository,
    current: Mutex<Option<Session>>,
}

impl SessionGateway {
    pub fn new(authority: Arc<dyn AuthAuthority>, store: Repository) -> Self {
        Self {
            authority,
            store,
            current: Mutex::new(None),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session = self.authority.login(&request).await?;
        self.establish(session).await
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<Session, AppError> {
        request.validate()?;
        let session = self.authority.signup(request).await?;
        self.establish(session).await
    }

    pub async fn exchange_external_session(&self, session_id: &str) -> Result<Session, AppError> {
        let session = self.authority.exchange_external_session(session_id).await?;
        tracing::info!(user_id = %session.user.id, "External sign-in completed");
        self.establish(session).await
    }

    /// Complete an external sign-in from the URL the provider redirected to.
    ///
    /// The identifier is removed from `url` before the exchange is attempted.
    /// Returns `None` when the URL carries no identifier.
    pub async fn exchange_from_url(&self, url: &mut Url) -> Result<Option<Session>, AppError> {
        let Some(session_id) = take_session_id(url) else {
            return Ok(None);
        };
        self.exchange_external_session(&session_id).await.map(Some)
    }

    /// Resolve the current user, restoring from the store on first use.
    ///
    /// A token the authority no longer accepts is discarded and the session
    /// is reported as absent. Other failures keep the token for a retry.
    pub async fn current_user(&self) -> Result<Option<User>, AppError> {
        let held = self.held_token().await;
        let token = match held {
            Some(token) => token,
            None => match self.store.get::<StoredSession>(STORED_SESSION_ID).await? {
                Some(stored) => stored.token,
                None => return Ok(None),
            },
        };

        match self.authority.who_am_i(&token).await {
            Ok(user) => {
                let session = self.establish(Session { token, user }).await?;
                Ok(Some(session.user))
            }
            Err(e) if e.clears_session() => {
                tracing::info!("Stored session rejected; signing out locally");
                self.clear().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Notify the authority, then forget the session locally.
    ///
    /// The local clear happens even when the authority cannot be reached.
    pub async fn logout(&self) -> Result<(), AppError> {
        let token = match self.held_token().await {
            Some(token) => Some(token),
            None => self
                .store
                .get::<StoredSession>(STORED_SESSION_ID)
                .await
                .ok()
                .flatten()
                .map(|stored| stored.token),
        };

        if let Some(token) = token {
            if let Err(e) = self.authority.logout(&token).await {
                tracing::warn!("Remote logout failed: {}", e);
            }
        }

        self.clear().await
    }

    /// The session already held in memory, if any.
    pub async fn session(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    /// The current session, or `Unauthorized` when signed out.
    pub async fn require(&self) -> Result<Session, AppError> {
        if let Some(session) = self.session().await {
            return Ok(session);
        }
        if self.current_user().await?.is_some() {
            if let Some(session) = self.session().await {
                return Ok(session);
            }
        }
        Err(AppError::Unauthorized("Please log in to continue".to_string()))
    }

    /// Pass a result through, tearing the session down if it reports an
    /// expired or revoked token.
    pub async fn observe<T>(&self, result: Result<T, AppError>) -> Result<T, AppError> {
        if let Err(e) = &result {
            if e.clears_session() {
                tracing::info!("Session no longer accepted; signing out locally");
                if let Err(clear_err) = self.clear().await {
                    tracing::error!("Failed to clear stored session: {}", clear_err);
                }
            }
        }
        result
    }

    async fn held_token(&self) -> Option<String> {
        self.current.lock().await.as_ref().map(|s| s.token.clone())
    }

    async fn establish(&self, session: Session) -> Result<Session, AppError> {
        let stored = StoredSession {
            id: STORED_SESSION_ID.to_string(),
            token: session.token.clone(),
            user: session.user.clone(),
        };
        self.store.put(&stored).await?;
        *self.current.lock().await = Some(session.clone());
        Ok(session)
    }

    async fn clear(&self) -> Result<(), AppError> {
        *self.current.lock().await = None;
        self.store.delete::<StoredSession>(STORED_SESSION_ID).await?;
        Ok(())
    }
}
