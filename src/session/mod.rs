// Session manager - authentication lifecycle and token persistence
//
// Owns the session triple (access token, refresh token, user) and keeps it in
// sync with durable storage. The transport reads the access token straight
// from the same storage, so anything persisted here authorizes the next call.
//
// Phases:
// - Anonymous: no access token
// - Authenticating: login/register in flight
// - Authenticated: access token present
// - RefreshFailed: the last refresh was rejected and there is no access token
//
// Token refresh is never triggered implicitly by a failed request; callers
// use refresh() or rely on bootstrap() at startup.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;
use tokio::sync::watch;

use crate::error::{ApiError, BestEffort};
use crate::messages::{Locale, Message};
use crate::models::{RegisterRequest, SessionPayload, UserProfile};
use crate::storage::{
    SessionStorage, SharedStorage, StorageError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
    SESSION_KEYS, USER_KEY,
};
use crate::stores::Revision;
use crate::transport::Transport;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    RefreshFailed,
}

/// In-memory session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<String>,
    /// Set when a refresh was rejected; cleared by any successful exchange or logout
    pub refresh_failed: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_any_token(&self) -> bool {
        !self.access_token.is_empty() || !self.refresh_token.is_empty()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Authenticating
        } else if self.is_authenticated() {
            SessionPhase::Authenticated
        } else if self.refresh_failed {
            SessionPhase::RefreshFailed
        } else {
            SessionPhase::Anonymous
        }
    }
}

pub struct SessionManager {
    transport: Arc<Transport>,
    storage: SharedStorage,
    locale: Locale,
    state: Mutex<SessionState>,
    revision: Revision,
}

impl SessionManager {
    /// Create the manager, hydrating the session from storage
    ///
    /// `storage` must be the same storage the transport reads tokens from.
    pub fn new(transport: Arc<Transport>, storage: SharedStorage, locale: Locale) -> Self {
        let state = hydrate(storage.as_ref());
        Self {
            transport,
            storage,
            locale,
            state: Mutex::new(state),
            revision: Revision::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read-only views
    // ─────────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated()
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.lock().user.clone()
    }

    pub fn loading(&self) -> bool {
        self.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Recover a session at startup
    ///
    /// With a refresh token but no access token, try to refresh; if that
    /// fails, log out completely. Never returns an error.
    pub async fn bootstrap(&self) -> SessionPhase {
        let needs_refresh = {
            let state = self.lock();
            !state.refresh_token.is_empty() && state.access_token.is_empty()
        };

        if needs_refresh {
            tracing::debug!("Access token missing, refreshing persisted session");
            if let Err(e) = self.refresh().await {
                tracing::info!("Session refresh failed at startup, signing out: {}", e);
                let _ = self.logout().await;
            }
        }

        self.phase()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionPayload, ApiError> {
        self.begin();
        let body = json!({ "email": email, "password": password });
        let result = self.exchange("/auth/login", &body).await;
        let result = self.finish(result, Message::LoginFailed);
        if result.is_ok() {
            tracing::info!("Signed in as {}", email);
        }
        result
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<SessionPayload, ApiError> {
        self.begin();
        let result = self.exchange("/auth/register", request).await;
        let result = self.finish(result, Message::RegisterFailed);
        if result.is_ok() {
            tracing::info!("Registered {}", request.email);
        }
        result
    }

    /// Exchange the refresh token for a new session triple
    pub async fn refresh(&self) -> Result<SessionPayload, ApiError> {
        let refresh_token = self.lock().refresh_token.clone();
        if refresh_token.is_empty() {
            return Err(ApiError::MissingRefreshToken);
        }

        let body = json!({ "refreshToken": refresh_token });
        match self.exchange("/auth/refresh", &body).await {
            Ok(payload) => {
                tracing::debug!("Session refreshed");
                Ok(payload)
            }
            Err(e) => {
                self.lock().refresh_failed = true;
                self.revision.bump();
                Err(e)
            }
        }
    }

    /// Sign out
    ///
    /// The remote call is best-effort: local state and storage are cleared
    /// whatever happens on the wire.
    pub async fn logout(&self) -> BestEffort {
        let (has_token, refresh_token) = {
            let state = self.lock();
            (state.has_any_token(), state.refresh_token.clone())
        };

        let outcome = if has_token {
            let body = json!({ "refreshToken": refresh_token });
            match self.transport.post_unit("/auth/logout", &body).await {
                Ok(()) => BestEffort::Completed,
                Err(e) => {
                    tracing::warn!("Remote logout failed: {}", e);
                    BestEffort::Failed(e)
                }
            }
        } else {
            BestEffort::Skipped
        };

        *self.lock() = SessionState::default();
        if let Err(e) = clear_persisted(self.storage.as_ref()) {
            tracing::error!("Failed to clear persisted session: {}", e);
        }
        self.revision.bump();

        tracing::info!("Signed out");
        outcome
    }

    /// Change the password; session state is left alone
    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), ApiError> {
        let body = json!({ "currentPassword": current, "newPassword": new });
        self.transport.post_unit("/auth/password", &body).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn begin(&self) {
        {
            let mut state = self.lock();
            state.loading = true;
            state.error = None;
        }
        self.revision.bump();
    }

    fn finish<T>(&self, result: Result<T, ApiError>, message: Message) -> Result<T, ApiError> {
        {
            let mut state = self.lock();
            state.loading = false;
            if let Err(e) = &result {
                state.error = Some(self.failure_text(e, message));
            }
        }
        self.revision.bump();
        result
    }

    async fn exchange<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<SessionPayload, ApiError> {
        let payload: SessionPayload = self.transport.post_json(path, body).await?;
        self.persist(&payload)?;
        Ok(payload)
    }

    /// Overwrite the whole triple, storage first, then memory
    ///
    /// A failed write leaves no mixed triple behind: storage is wiped and the
    /// in-memory session is dropped with it.
    fn persist(&self, payload: &SessionPayload) -> Result<(), ApiError> {
        let user_json = serde_json::to_string(&payload.user)
            .map_err(|e| ApiError::Storage(format!("failed to encode user: {}", e)))?;

        if let Err(e) = write_persisted(
            self.storage.as_ref(),
            &payload.access_token,
            &payload.refresh_token,
            &user_json,
        ) {
            tracing::error!("Failed to persist session, discarding it: {}", e);
            if let Err(e) = clear_persisted(self.storage.as_ref()) {
                tracing::error!("Failed to clear persisted session: {}", e);
            }
            *self.lock() = SessionState::default();
            self.revision.bump();
            return Err(e.into());
        }

        {
            let mut state = self.lock();
            state.access_token = payload.access_token.clone();
            state.refresh_token = payload.refresh_token.clone();
            state.user = payload.user.clone();
            state.refresh_failed = false;
        }
        self.revision.bump();
        Ok(())
    }

    /// Fallback text for a failed exchange
    fn failure_text(&self, err: &ApiError, message: Message) -> String {
        let message = match err {
            ApiError::Storage(_) => Message::SessionSaveFailed,
            _ => message,
        };
        err.user_message(message.text(self.locale))
    }
}

fn write_persisted(
    storage: &dyn SessionStorage,
    access_token: &str,
    refresh_token: &str,
    user_json: &str,
) -> Result<(), StorageError> {
    storage.set(ACCESS_TOKEN_KEY, access_token)?;
    storage.set(REFRESH_TOKEN_KEY, refresh_token)?;
    storage.set(USER_KEY, user_json)
}

/// Load the persisted triple; anything unreadable yields an empty session
fn hydrate(storage: &dyn SessionStorage) -> SessionState {
    match read_persisted(storage) {
        Ok(state) => state,
        Err(reason) => {
            tracing::warn!("Discarding persisted session: {}", reason);
            if let Err(e) = clear_persisted(storage) {
                tracing::error!("Failed to clear persisted session: {}", e);
            }
            SessionState::default()
        }
    }
}

fn read_persisted(storage: &dyn SessionStorage) -> Result<SessionState, String> {
    let access_token = storage
        .get(ACCESS_TOKEN_KEY)
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let refresh_token = storage
        .get(REFRESH_TOKEN_KEY)
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let user = match storage.get(USER_KEY).map_err(|e| e.to_string())? {
        Some(raw) => serde_json::from_str::<Option<UserProfile>>(&raw)
            .map_err(|e| format!("corrupt user record: {}", e))?,
        None => None,
    };

    Ok(SessionState {
        access_token,
        refresh_token,
        user,
        ..Default::default()
    })
}

/// Remove every session entry, attempting all of them even if one fails
fn clear_persisted(storage: &dyn SessionStorage) -> Result<(), StorageError> {
    let mut first_error = None;
    for key in SESSION_KEYS {
        if let Err(e) = storage.remove(key) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
