//! Wire models for the defect-tracker API
//!
//! Records keep any fields this client doesn't know about in `extra`, so a
//! newer server never loses data on a round trip through the caches.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

type Extra = serde_json::Map<String, serde_json::Value>;

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations with an open tail
// ─────────────────────────────────────────────────────────────────────────────

/// Defect workflow status
///
/// The server owns the workflow, so unknown values are carried as `Other`
/// instead of failing the whole list decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DefectStatus {
    New,
    Open,
    InProgress,
    InReview,
    Resolved,
    Closed,
    Canceled,
    Other(String),
}

impl DefectStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "NEW",
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::InReview => "IN_REVIEW",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
            Self::Canceled => "CANCELED",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for DefectStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NEW" => Self::New,
            "OPEN" => Self::Open,
            "IN_PROGRESS" => Self::InProgress,
            "IN_REVIEW" => Self::InReview,
            "RESOLVED" => Self::Resolved,
            "CLOSED" => Self::Closed,
            "CANCELED" => Self::Canceled,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for DefectStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<DefectStatus> for String {
    fn from(status: DefectStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for DefectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defect priority
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        match s.as_str() {
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            "CRITICAL" => Self::Critical,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Priority {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticated user as described by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub id: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A comment in a defect's thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A defect, either as a list entry or as a full detail record
///
/// List entries come without `attachments`/`comments`; both default to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectRecord {
    pub id: String,
    pub title: String,
    pub status: DefectStatus,
    pub priority: Priority,
    #[serde(default)]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl DefectRecord {
    pub fn is_critical(&self) -> bool {
        self.priority == Priority::Critical
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == DefectStatus::InProgress
    }
}

/// A project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: Extra,
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelopes and payloads
// ─────────────────────────────────────────────────────────────────────────────

/// `{ items: [...] }` wrapper used by every list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Result of login/register/refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

/// Body for `POST /auth/register`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Body for `POST /defects`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDefect {
    pub project_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Body for `POST /projects`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Body for `POST /defects/{id}/comments`
#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub body: String,
}

impl NewComment {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// List filters
// ─────────────────────────────────────────────────────────────────────────────

/// Query parameters for list endpoints
///
/// Keys are server-defined; the helpers cover the ones the defect list
/// understands today. Ordered so requests are reproducible in logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    params: BTreeMap<String, String>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary parameter; empty values are dropped
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            return self;
        }
        self.params.insert(key.into(), value);
        self
    }

    pub fn status(self, status: impl Into<DefectStatus>) -> Self {
        self.with("status", String::from(status.into()))
    }

    pub fn priority(self, priority: impl Into<Priority>) -> Self {
        self.with("priority", String::from(priority.into()))
    }

    pub fn project(self, project_id: impl Into<String>) -> Self {
        self.with("projectId", project_id)
    }

    pub fn limit(self, limit: u32) -> Self {
        self.with("limit", limit.to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defect_list_entry_decodes_without_detail_fields() {
        let json = r#"{
            "id": "d1",
            "projectId": "p1",
            "project": "Tower A",
            "title": "Crack in slab",
            "priority": "CRITICAL",
            "status": "IN_PROGRESS",
            "assigneeId": "u7",
            "dueDate": "2025-03-01",
            "updatedAt": "2025-02-01T10:00:00Z"
        }"#;

        let defect: DefectRecord = serde_json::from_str(json).unwrap();
        assert!(defect.is_critical());
        assert!(defect.is_in_progress());
        assert!(defect.attachments.is_empty());
        assert!(defect.comments.is_empty());
        assert_eq!(defect.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        // Unknown fields survive
        assert_eq!(defect.extra["assigneeId"], "u7");
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status: DefectStatus = serde_json::from_str(r#""ON_HOLD""#).unwrap();
        assert_eq!(status, DefectStatus::Other("ON_HOLD".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""ON_HOLD""#);
        assert_eq!(DefectStatus::from("IN_REVIEW"), DefectStatus::InReview);
    }

    #[test]
    fn test_session_payload_with_server_extras() {
        let json = r#"{
            "accessToken": "a1",
            "refreshToken": "r1",
            "refreshExpiresAt": "2025-04-01T00:00:00Z",
            "user": {"id": "u1", "email": "pm@example.com", "fullName": "Pat", "role": "manager"}
        }"#;
        let payload: SessionPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.access_token, "a1");
        let user = payload.user.unwrap();
        assert_eq!(user.role, "manager");
        assert!(user.extra.is_empty());
    }

    #[test]
    fn test_new_defect_serializes_camel_case() {
        let payload = NewDefect {
            project_id: "p1".to_string(),
            title: "T".to_string(),
            description: None,
            priority: Priority::Critical,
            severity: None,
            assignee_id: Some("u2".to_string()),
            due_date: NaiveDate::from_ymd_opt(2025, 1, 31),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "projectId": "p1",
                "title": "T",
                "priority": "CRITICAL",
                "assigneeId": "u2",
                "dueDate": "2025-01-31"
            })
        );
    }

    #[test]
    fn test_list_filter_drops_empty_values() {
        let filter = ListFilter::new()
            .status(DefectStatus::Open)
            .priority("")
            .project("p9")
            .limit(20);

        assert_eq!(filter.get("status"), Some("OPEN"));
        assert_eq!(filter.get("priority"), None);
        assert_eq!(
            filter.to_query(),
            vec![
                ("limit".to_string(), "20".to_string()),
                ("projectId".to_string(), "p9".to_string()),
                ("status".to_string(), "OPEN".to_string()),
            ]
        );
    }

    #[test]
    fn test_list_response_tolerates_missing_items() {
        let empty: ListResponse<ProjectRecord> = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
    }
}
