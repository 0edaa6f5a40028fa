// Defect cache
//
// Holds the last fetched defect list, the defect currently open in detail
// and its comment thread. `items` and `current` are independent copies:
// loading a detail never touches the list, and list refreshes never touch
// the detail.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Method;
use serde_json::json;
use tokio::sync::watch;

use super::{DefectSummary, Revision};
use crate::error::ApiError;
use crate::messages::{Locale, Message};
use crate::models::{
    AttachmentRef, CommentRecord, DefectRecord, DefectStatus, ListFilter, ListResponse, NewComment,
    NewDefect,
};
use crate::transport::{RequestOptions, Transport, UploadFile};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefectState {
    pub items: Vec<DefectRecord>,
    pub current: Option<DefectRecord>,
    pub comments: Vec<CommentRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

impl DefectState {
    pub fn summary(&self) -> DefectSummary {
        DefectSummary::from_items(&self.items)
    }
}

pub struct DefectStore {
    transport: Arc<Transport>,
    locale: Locale,
    state: Mutex<DefectState>,
    revision: Revision,
}

impl DefectStore {
    pub fn new(transport: Arc<Transport>, locale: Locale) -> Self {
        Self {
            transport,
            locale,
            state: Mutex::new(DefectState::default()),
            revision: Revision::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DefectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read-only views
    // ─────────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> DefectState {
        self.lock().clone()
    }

    pub fn items(&self) -> Vec<DefectRecord> {
        self.lock().items.clone()
    }

    pub fn current(&self) -> Option<DefectRecord> {
        self.lock().current.clone()
    }

    pub fn comments(&self) -> Vec<CommentRecord> {
        self.lock().comments.clone()
    }

    pub fn loading(&self) -> bool {
        self.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn total(&self) -> usize {
        super::total(&self.lock().items)
    }

    pub fn critical(&self) -> usize {
        super::critical(&self.lock().items)
    }

    pub fn in_progress(&self) -> usize {
        super::in_progress(&self.lock().items)
    }

    pub fn summary(&self) -> DefectSummary {
        self.lock().summary()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the list with the server's view for `filter`
    ///
    /// On failure the list is emptied rather than left stale.
    pub async fn fetch(&self, filter: &ListFilter) -> Result<(), ApiError> {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self
            .transport
            .get_json::<ListResponse<DefectRecord>>("/defects", filter.to_query())
            .await;

        match result {
            Ok(response) => {
                let count = response.items.len();
                self.update(|state| {
                    state.loading = false;
                    state.items = response.items;
                });
                tracing::debug!("Loaded {} defects", count);
                Ok(())
            }
            Err(e) => {
                let message = e.user_message(Message::DefectsLoadFailed.text(self.locale));
                self.update(|state| {
                    state.loading = false;
                    state.items.clear();
                    state.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Create a defect; it goes to the front of the list
    pub async fn create(&self, payload: &NewDefect) -> Result<DefectRecord, ApiError> {
        self.begin();
        let result: Result<DefectRecord, ApiError> =
            self.transport.post_json("/defects", payload).await;
        self.settle(result, Message::DefectCreateFailed, |state, defect| {
            state.items.insert(0, defect.clone());
        })
    }

    /// Load one defect into `current`, seeding the comment thread from it
    pub async fn fetch_one(&self, id: &str) -> Result<DefectRecord, ApiError> {
        self.begin();
        let result: Result<DefectRecord, ApiError> = self
            .transport
            .get_json(&self.transport.path(&["defects", id]), Vec::new())
            .await;
        self.settle(result, Message::DefectLoadFailed, |state, defect| {
            state.comments = defect.comments.clone();
            state.current = Some(defect.clone());
        })
    }

    pub async fn fetch_comments(&self, id: &str) -> Result<Vec<CommentRecord>, ApiError> {
        self.begin();
        let result = self
            .transport
            .get_json::<ListResponse<CommentRecord>>(
                &self.transport.path(&["defects", id, "comments"]),
                Vec::new(),
            )
            .await
            .map(|response| response.items);
        self.settle(result, Message::CommentsLoadFailed, |state, comments| {
            state.comments = comments.clone();
        })
    }

    pub async fn add_comment(
        &self,
        id: &str,
        payload: &NewComment,
    ) -> Result<CommentRecord, ApiError> {
        self.begin();
        let result: Result<CommentRecord, ApiError> = self
            .transport
            .post_json(&self.transport.path(&["defects", id, "comments"]), payload)
            .await;
        self.settle(result, Message::CommentAddFailed, |state, comment| {
            state.comments.push(comment.clone());
        })
    }

    /// Upload a file and attach it to defect `id`
    ///
    /// The new reference is prepended to `current` only when `current` is
    /// that same defect.
    pub async fn add_attachment(
        &self,
        id: &str,
        file: UploadFile,
    ) -> Result<AttachmentRef, ApiError> {
        self.begin();
        let filename = file.filename.clone();
        let result: Result<AttachmentRef, ApiError> = self
            .transport
            .upload(&self.transport.path(&["defects", id, "attachments"]), file)
            .await;
        let result = self.settle(result, Message::AttachmentUploadFailed, |state, attachment| {
            if let Some(current) = state.current.as_mut().filter(|c| c.id == id) {
                current.attachments.insert(0, attachment.clone());
            }
        });
        if result.is_ok() {
            tracing::info!("Attached {} to defect {}", filename, id);
        }
        result
    }

    /// Move defect `id` to `status`
    pub async fn update_status(
        &self,
        id: &str,
        status: DefectStatus,
    ) -> Result<DefectRecord, ApiError> {
        self.begin();
        let body = json!({ "status": status });
        let result: Result<DefectRecord, ApiError> = self
            .transport
            .patch_json(&self.transport.path(&["defects", id, "status"]), &body)
            .await;
        self.settle(result, Message::DefectStatusFailed, |state, defect| {
            if let Some(current) = state.current.as_mut().filter(|c| c.id == defect.id) {
                *current = defect.clone();
            }
            if let Some(item) = state.items.iter_mut().find(|d| d.id == defect.id) {
                *item = defect.clone();
            }
        })
    }

    /// Raw bytes of an attachment; store state is not touched
    pub async fn download_attachment(
        &self,
        defect_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let path = self
            .transport
            .path(&["defects", defect_id, "attachments", attachment_id]);
        let response = self
            .transport
            .send(Method::GET, &path, RequestOptions::default())
            .await?;
        Ok(response.into_bytes())
    }

    /// Drop everything cached
    pub fn reset(&self) {
        self.update(|state| *state = DefectState::default());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn update(&self, f: impl FnOnce(&mut DefectState)) {
        {
            let mut state = self.lock();
            f(&mut *state);
        }
        self.revision.bump();
    }

    fn begin(&self) {
        self.update(|state| state.error = None);
    }

    fn settle<T>(
        &self,
        result: Result<T, ApiError>,
        message: Message,
        apply: impl FnOnce(&mut DefectState, &T),
    ) -> Result<T, ApiError> {
        let locale = self.locale;
        self.update(|state| match &result {
            Ok(value) => apply(state, value),
            Err(e) => state.error = Some(e.user_message(message.text(locale))),
        });
        result
    }
}
