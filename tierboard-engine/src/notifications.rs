//! User-facing notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub action: Option<NotificationAction>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            level,
            message: message.into(),
            action: None,
            created_at,
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Append `notification`, dropping the oldest entries beyond `cap`.
pub fn push_bounded(list: &mut Vec<Notification>, notification: Notification, cap: usize) {
    list.push(notification);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_bounded_drops_oldest() {
        let now = Utc::now();
        let mut list = Vec::new();
        for i in 0..5 {
            push_bounded(
                &mut list,
                Notification::new(NotificationLevel::Warning, format!("n{}", i), now),
                3,
            );
        }
        let messages: Vec<_> = list.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["n2", "n3", "n4"]);
    }
}
