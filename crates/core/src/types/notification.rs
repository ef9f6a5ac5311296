//! Notification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A notification as returned by the bulk history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A notification as held by the client, whatever its source.
///
/// `id` is a local identity used to evict toast copies; it has no meaning to
/// the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEntry {
    #[serde(skip, default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

impl NotificationEntry {
    /// An entry received now.
    #[must_use]
    pub fn received(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::received_at(title, message, Utc::now())
    }

    /// An entry received at the given instant.
    #[must_use]
    pub fn received_at(
        title: impl Into<String>,
        message: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            message: message.into(),
            received_at,
        }
    }
}

impl From<NotificationItem> for NotificationEntry {
    fn from(item: NotificationItem) -> Self {
        let received_at = item.created_at.unwrap_or_else(Utc::now);
        Self::received_at(item.title, item.message, received_at)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_history_item_maps_to_entry() {
        let item: NotificationItem = serde_json::from_str(
            r##"{"id":3,"title":"Order shipped","message":"#1042 is on its way","createdAt":"2026-03-01T08:30:00Z"}"##,
        )
        .unwrap();
        let entry = NotificationEntry::from(item);
        assert_eq!(entry.title, "Order shipped");
        assert_eq!(entry.received_at.to_rfc3339(), "2026-03-01T08:30:00+00:00");
    }

    #[test]
    fn test_entries_get_distinct_local_ids() {
        let a = NotificationEntry::received("t", "m");
        let b = NotificationEntry::received("t", "m");
        assert_ne!(a.id, b.id);
    }
}
