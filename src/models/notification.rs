// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push subscriptions and scheduled notifications.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::time_utils::format_bson_rfc3339;

/// Minutes before the due date when no reminder time is given (one day).
pub const DEFAULT_REMINDER_MINUTES: i32 = 1440;

/// Browser Web Push subscription, as produced by `PushManager.subscribe()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushKeys {
    /// Receiver public key (base64url, uncompressed P-256 point)
    pub p256dh: String,
    /// Receiver auth secret (base64url, 16 bytes)
    pub auth: String,
}

impl PushSubscription {
    /// All three fields present and the endpoint is an https URL.
    pub fn is_complete(&self) -> bool {
        self.endpoint.starts_with("https://")
            && !self.keys.p256dh.is_empty()
            && !self.keys.auth.is_empty()
    }
}

/// Per-assignment reminder preference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentReminder {
    pub assignment_id: ObjectId,
    pub reminder_time: i32,
}

/// A user's notification preferences, stored one per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSubscription {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(default)]
    pub team_number: Option<i32>,
    /// `None` once the push service reports the subscription expired
    #[serde(default)]
    pub subscription_json: Option<PushSubscription>,
    #[serde(default = "default_reminder")]
    pub default_reminder_time: i32,
    #[serde(default)]
    pub enable_all_notifications: bool,
    #[serde(default)]
    pub assignment_subscriptions: Vec<AssignmentReminder>,
    pub created_at: bson::DateTime,
    #[serde(default)]
    pub updated_at: Option<bson::DateTime>,
}

fn default_reminder() -> i32 {
    DEFAULT_REMINDER_MINUTES
}

impl NotificationSubscription {
    pub fn new(user_id: ObjectId, team_number: Option<i32>, now: bson::DateTime) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            team_number,
            subscription_json: None,
            default_reminder_time: DEFAULT_REMINDER_MINUTES,
            enable_all_notifications: false,
            assignment_subscriptions: Vec::new(),
            created_at: now,
            updated_at: None,
        }
    }

    pub fn has_live_subscription(&self) -> bool {
        self.subscription_json.is_some()
    }

    /// Reminder lead time for an assignment, in minutes.
    ///
    /// An explicit per-assignment reminder wins; otherwise the default
    /// applies only when "enable all" is on. `None` means the user does
    /// not want a reminder for this assignment.
    pub fn reminder_minutes(&self, assignment_id: &ObjectId) -> Option<i32> {
        if let Some(sub) = self
            .assignment_subscriptions
            .iter()
            .find(|s| s.assignment_id == *assignment_id)
        {
            return Some(sub.reminder_time);
        }
        self.enable_all_notifications
            .then_some(self.default_reminder_time)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

/// Error recorded on notifications whose subscription went away.
pub const SUBSCRIPTION_EXPIRED: &str = "subscription expired";

/// A push message waiting in the `scheduled_notifications` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledNotification {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(default)]
    pub team_number: Option<i32>,
    #[serde(default)]
    pub assignment_id: Option<ObjectId>,
    pub title: String,
    pub body: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub data: bson::Document,
    pub scheduled_time: bson::DateTime,
    pub created_at: bson::DateTime,
    #[serde(default)]
    pub sent: bool,
    #[serde(default)]
    pub sent_at: Option<bson::DateTime>,
    #[serde(default)]
    pub status: NotificationStatus,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_url() -> String {
    "/".to_string()
}

/// JSON payload delivered to the service worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_number: Option<i32>,
    /// Milliseconds since the epoch
    pub timestamp: i64,
}

impl PushPayload {
    pub fn for_notification(notification: &ScheduledNotification, now: bson::DateTime) -> Self {
        Self {
            title: notification.title.clone(),
            body: notification.body.clone(),
            url: notification.url.clone(),
            assignment_id: notification.assignment_id.map(|id| id.to_hex()),
            team_number: notification.team_number,
            timestamp: now.timestamp_millis(),
        }
    }
}

// ─── Request / response bodies ───────────────────────────────────

/// Body of `/notifications/subscribe` and `/notifications/resubscribe`.
///
/// The subscription is filed under the caller's own team; any team number
/// in the body is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub subscription: PushSubscription,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NotificationSettingsForm {
    #[validate(range(min = 1, max = 43200, message = "Reminder time must be 1-43200 minutes"))]
    pub default_reminder_time: i32,
    #[serde(default)]
    pub enable_all_notifications: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReminderForm {
    #[serde(default = "default_reminder")]
    #[validate(range(min = 1, max = 43200, message = "Reminder time must be 1-43200 minutes"))]
    pub reminder_time: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationSettingsResponse {
    pub team_number: i32,
    pub default_reminder_time: i32,
    pub enable_all_notifications: bool,
    pub has_subscription: bool,
    pub assignment_subscriptions: Vec<AssignmentReminderResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentReminderResponse {
    pub assignment_id: String,
    pub reminder_time: i32,
}

impl From<&AssignmentReminder> for AssignmentReminderResponse {
    fn from(r: &AssignmentReminder) -> Self {
        Self {
            assignment_id: r.assignment_id.to_hex(),
            reminder_time: r.reminder_time,
        }
    }
}

/// Notification as shown in the debug listing.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledNotificationResponse {
    pub id: String,
    pub assignment_id: Option<String>,
    pub title: String,
    pub body: String,
    pub url: String,
    pub scheduled_time: String,
    pub sent: bool,
    pub sent_at: Option<String>,
    pub status: NotificationStatus,
    pub error: Option<String>,
}

impl From<&ScheduledNotification> for ScheduledNotificationResponse {
    fn from(n: &ScheduledNotification) -> Self {
        Self {
            id: n.id.to_hex(),
            assignment_id: n.assignment_id.map(|id| id.to_hex()),
            title: n.title.clone(),
            body: n.body.clone(),
            url: n.url.clone(),
            scheduled_time: format_bson_rfc3339(n.scheduled_time),
            sent: n.sent,
            sent_at: n.sent_at.map(format_bson_rfc3339),
            status: n.status,
            error: n.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> NotificationSubscription {
        NotificationSubscription::new(ObjectId::new(), Some(334), bson::DateTime::now())
    }

    #[test]
    fn test_per_assignment_reminder_wins_over_default() {
        let assignment = ObjectId::new();
        let mut sub = subscription();
        sub.enable_all_notifications = true;
        sub.default_reminder_time = 60;
        sub.assignment_subscriptions.push(AssignmentReminder {
            assignment_id: assignment,
            reminder_time: 15,
        });

        assert_eq!(sub.reminder_minutes(&assignment), Some(15));
        assert_eq!(sub.reminder_minutes(&ObjectId::new()), Some(60));
    }

    #[test]
    fn test_no_reminder_without_opt_in() {
        let sub = subscription();
        assert_eq!(sub.reminder_minutes(&ObjectId::new()), None);
    }

    #[test]
    fn test_push_subscription_completeness() {
        let mut push: PushSubscription = serde_json::from_value(serde_json::json!({
            "endpoint": "https://fcm.googleapis.com/fcm/send/abc",
            "keys": {"p256dh": "BPk", "auth": "xyz"}
        }))
        .unwrap();
        assert!(push.is_complete());

        push.keys.auth.clear();
        assert!(!push.is_complete());

        push.keys.auth = "xyz".to_string();
        push.endpoint = "http://insecure.example".to_string();
        assert!(!push.is_complete());
    }

    #[test]
    fn test_payload_uses_camel_case() {
        let now = bson::DateTime::from_millis(1_700_000_000_000);
        let notification = ScheduledNotification {
            id: ObjectId::new(),
            user_id: ObjectId::new(),
            team_number: Some(334),
            assignment_id: None,
            title: "Test".to_string(),
            body: "Body".to_string(),
            url: "/".to_string(),
            data: bson::Document::new(),
            scheduled_time: now,
            created_at: now,
            sent: false,
            sent_at: None,
            status: NotificationStatus::Pending,
            error: None,
        };

        let json = serde_json::to_value(PushPayload::for_notification(&notification, now)).unwrap();
        assert_eq!(json["teamNumber"], 334);
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert!(json.get("assignmentId").is_none());
    }
}
