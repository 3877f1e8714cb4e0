// Data models for TodoStore

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single task in the todo list
///
/// Field names are serialized in camelCase so the persisted payload reads
/// `{"id", "title", "completed", "createdAt"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    pub completed: bool,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

impl TodoItem {
    /// Build a fresh, incomplete item with a newly generated id.
    ///
    /// The title is stored as given; callers trim and reject blank titles.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            completed: false,
            created_at: now_ms(),
        }
    }

    /// First 8 characters of the id, used for display
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// Generate a random 128-bit item id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
