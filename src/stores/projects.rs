// Project cache - same list contract as the defect cache

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::Revision;
use crate::error::ApiError;
use crate::messages::{Locale, Message};
use crate::models::{ListFilter, ListResponse, NewProject, ProjectRecord};
use crate::transport::Transport;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectState {
    pub items: Vec<ProjectRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct ProjectStore {
    transport: Arc<Transport>,
    locale: Locale,
    state: Mutex<ProjectState>,
    revision: Revision,
}

impl ProjectStore {
    pub fn new(transport: Arc<Transport>, locale: Locale) -> Self {
        Self {
            transport,
            locale,
            state: Mutex::new(ProjectState::default()),
            revision: Revision::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProjectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut ProjectState)) {
        {
            let mut state = self.lock();
            f(&mut *state);
        }
        self.revision.bump();
    }

    pub fn snapshot(&self) -> ProjectState {
        self.lock().clone()
    }

    pub fn items(&self) -> Vec<ProjectRecord> {
        self.lock().items.clone()
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

    /// Replace the list; on failure it is emptied
    pub async fn fetch(&self, filter: &ListFilter) -> Result<(), ApiError> {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self
            .transport
            .get_json::<ListResponse<ProjectRecord>>("/projects", filter.to_query())
            .await;

        match result {
            Ok(response) => {
                let count = response.items.len();
                self.update(|state| {
                    state.loading = false;
                    state.items = response.items;
                });
                tracing::debug!("Loaded {} projects", count);
                Ok(())
            }
            Err(e) => {
                let message = e.user_message(Message::ProjectsLoadFailed.text(self.locale));
                self.update(|state| {
                    state.loading = false;
                    state.items.clear();
                    state.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Create a project; it goes to the front of the list
    pub async fn create(&self, payload: &NewProject) -> Result<ProjectRecord, ApiError> {
        self.update(|state| state.error = None);

        let result: Result<ProjectRecord, ApiError> =
            self.transport.post_json("/projects", payload).await;

        match result {
            Ok(project) => {
                let created = project.clone();
                self.update(|state| state.items.insert(0, created));
                tracing::info!("Created project {}", project.name);
                Ok(project)
            }
            Err(e) => {
                let message = e.user_message(Message::ProjectCreateFailed.text(self.locale));
                self.update(|state| state.error = Some(message));
                Err(e)
            }
        }
    }

    pub fn reset(&self) {
        self.update(|state| *state = ProjectState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bodies, FakeApi};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Json;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn store(api: &FakeApi) -> ProjectStore {
        let (transport, _storage) = api.transport();
        ProjectStore::new(transport, Locale::En)
    }

    #[tokio::test]
    async fn test_fetch_replaces_items() {
        let api = FakeApi::start(|r| {
            r.route(
                "/projects",
                get(|| async {
                    Json(json!({"items": [
                        {"id": "p1", "name": "Tower A", "stage": "construction"},
                        {"id": "p2", "name": "Bridge"},
                    ]}))
                }),
            )
        })
        .await;
        let store = store(&api);

        store.fetch(&ListFilter::new()).await.unwrap();
        let state = store.snapshot();
        assert_eq!(state.items.len(), 2);
        assert_eq!(state.items[0].stage.as_deref(), Some("construction"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_fetch_failure_empties_items_with_fallback() {
        let api = FakeApi::start(|r| {
            r.route(
                "/projects",
                get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            )
        })
        .await;
        let store = store(&api);
        store.lock().items =
            vec![serde_json::from_value(json!({"id": "old", "name": "Old"})).unwrap()];

        let err = store.fetch(&ListFilter::new()).await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert!(store.items().is_empty());
        assert_eq!(
            store.error().as_deref(),
            Some(Message::ProjectsLoadFailed.text(Locale::En))
        );
    }

    #[tokio::test]
    async fn test_create_prepends_and_sends_dates() {
        let seen = bodies();
        let api = {
            let seen = seen.clone();
            FakeApi::start(move |r| {
                r.route(
                    "/projects",
                    post(move |Json(body): Json<Value>| {
                        let seen = seen.clone();
                        async move {
                            seen.lock().unwrap().push(body.clone());
                            (
                                StatusCode::CREATED,
                                Json(json!({"id": "p9", "name": body["name"]})),
                            )
                        }
                    }),
                )
            })
            .await
        };
        let store = store(&api);
        store.lock().items =
            vec![serde_json::from_value(json!({"id": "p1", "name": "Existing"})).unwrap()];

        let payload = NewProject {
            name: "Depot".to_string(),
            stage: None,
            description: Some("Bus depot".to_string()),
            start_date: NaiveDate::from_ymd_opt(2025, 4, 1),
            end_date: None,
        };
        let created = store.create(&payload).await.unwrap();

        assert_eq!(created.id, "p9");
        let ids: Vec<String> = store.items().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p9", "p1"]);
        let sent = seen.lock().unwrap();
        assert_eq!(sent[0]["startDate"], "2025-04-01");
        assert!(sent[0].get("endDate").is_none());
    }

    #[tokio::test]
    async fn test_create_failure_keeps_items() {
        let api = FakeApi::start(|r| {
            r.route(
                "/projects",
                post(|| async {
                    (
                        StatusCode::FORBIDDEN,
                        Json(json!({"message": "Недостаточно прав"})),
                    )
                }),
            )
        })
        .await;
        let store = store(&api);

        let payload = NewProject {
            name: "Depot".to_string(),
            stage: None,
            description: None,
            start_date: None,
            end_date: None,
        };
        store.create(&payload).await.unwrap_err();
        assert!(store.items().is_empty());
        assert_eq!(store.error().as_deref(), Some("Недостаточно прав"));
    }
}
