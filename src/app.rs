//! Application context: the one place stores are wired together
//!
//! Built once at startup and passed by reference; there are no global
//! singletons. The transport and the session manager share one storage, so
//! tokens persisted by the session authorize every later request.

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ApiError, BestEffort};
use crate::messages::Locale;
use crate::session::SessionManager;
use crate::storage::{FileStorage, MemoryStorage, SharedStorage};
use crate::stores::{DefectStore, ProjectStore};
use crate::transport::Transport;

pub struct AppContext {
    pub transport: Arc<Transport>,
    pub session: SessionManager,
    pub defects: DefectStore,
    pub projects: ProjectStore,
}

impl AppContext {
    /// Wire everything over an explicit storage
    pub fn new(base_url: &str, storage: SharedStorage, locale: Locale) -> Result<Self, ApiError> {
        let transport = Arc::new(Transport::new(base_url, storage.clone())?);
        Ok(Self {
            session: SessionManager::new(transport.clone(), storage, locale),
            defects: DefectStore::new(transport.clone(), locale),
            projects: ProjectStore::new(transport.clone(), locale),
            transport,
        })
    }

    /// Sessions persisted under `storage_dir`, one directory per API origin
    pub fn with_file_storage(
        base_url: &str,
        storage_dir: &Path,
        locale: Locale,
    ) -> Result<Self, ApiError> {
        let storage = FileStorage::for_origin(storage_dir, base_url);
        tracing::debug!("Session storage at {}", storage.root().display());
        Self::new(base_url, Arc::new(storage), locale)
    }

    /// Nothing survives the process
    pub fn ephemeral(base_url: &str, locale: Locale) -> Result<Self, ApiError> {
        Self::new(base_url, Arc::new(MemoryStorage::new()), locale)
    }

    pub fn from_config(config: &Config, ephemeral: bool) -> Result<Self, ApiError> {
        if ephemeral {
            Self::ephemeral(&config.api_base_url, config.locale)
        } else {
            Self::with_file_storage(&config.api_base_url, &config.storage_dir, config.locale)
        }
    }

    /// Log out and drop every cached record
    pub async fn sign_out(&self) -> BestEffort {
        let outcome = self.session.logout().await;
        self.defects.reset();
        self.projects.reset();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListFilter;
    use crate::session::SessionPhase;
    use crate::storage::{SessionStorage, ACCESS_TOKEN_KEY};
    use crate::testing::{session_json, FakeApi};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Json;
    use serde_json::json;

    #[tokio::test]
    async fn test_login_token_authorizes_store_requests() {
        let api = FakeApi::start(|r| {
            r.route(
                "/auth/login",
                post(|| async { Json(session_json("a1", "r1")) }),
            )
            .route("/projects", get(|| async { Json(json!({"items": []})) }))
        })
        .await;

        let app = AppContext::ephemeral(&api.base_url(), Locale::En).unwrap();
        app.session.login("x@y.z", "pw").await.unwrap();
        app.projects.fetch(&ListFilter::new()).await.unwrap();

        let calls = api.calls("GET", "/projects");
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer a1"));
    }

    #[tokio::test]
    async fn test_file_storage_survives_restart() {
        let api = FakeApi::start(|r| {
            r.route(
                "/auth/login",
                post(|| async { Json(session_json("a1", "r1")) }),
            )
        })
        .await;
        let dir = tempfile::tempdir().unwrap();

        {
            let app = AppContext::with_file_storage(&api.base_url(), dir.path(), Locale::En).unwrap();
            app.session.login("x@y.z", "pw").await.unwrap();
        }

        let app = AppContext::with_file_storage(&api.base_url(), dir.path(), Locale::En).unwrap();
        assert_eq!(app.session.bootstrap().await, SessionPhase::Authenticated);
        assert_eq!(app.session.user().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_sign_out_clears_caches() {
        let api = FakeApi::start(|r| {
            r.route("/auth/logout", post(|| async { StatusCode::NO_CONTENT }))
                .route(
                    "/projects",
                    get(|| async { Json(json!({"items": [{"id": "p1", "name": "A"}]})) }),
                )
        })
        .await;
        let storage = Arc::new(MemoryStorage::new());
        storage.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        let app = AppContext::new(&api.base_url(), storage.clone(), Locale::En).unwrap();

        app.projects.fetch(&ListFilter::new()).await.unwrap();
        assert_eq!(app.projects.items().len(), 1);

        assert!(app.sign_out().await.is_completed());
        assert!(app.projects.items().is_empty());
        assert!(!app.session.is_authenticated());
        assert!(storage.is_empty());
    }
}
