// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background notification poller.
//!
//! Each tick delivers notifications that are due, then queues reminders for
//! assignments due in the future. A failed tick is logged and the next one
//! starts over; nothing is kept in memory between ticks.

use std::collections::HashMap;
use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::db::MongoDb;
use crate::error::AppError;
use crate::models::notification::PushPayload;
use crate::models::{NotificationSubscription, ScheduledNotification};
use crate::services::notifications::schedule_reminder;
use crate::services::push::{PushError, PushService};
use crate::AppState;

/// Outcome of one delivery pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub sent: usize,
    pub expired: usize,
    pub failed: usize,
    pub skipped: usize,
}

fn by_user(subs: Vec<NotificationSubscription>) -> HashMap<ObjectId, NotificationSubscription> {
    subs.into_iter().map(|s| (s.user_id, s)).collect()
}

/// Send every due notification once.
///
/// Notifications for users without a live subscription are left for later.
/// Transient failures are left unsent and retried on the next tick.
pub async fn deliver_due(
    db: &MongoDb,
    push: &PushService,
    now: DateTime<Utc>,
) -> Result<DeliveryStats, AppError> {
    let due = db.due_notifications(bson::DateTime::from_chrono(now)).await?;
    let mut stats = DeliveryStats::default();
    if due.is_empty() {
        return Ok(stats);
    }

    let mut users: Vec<ObjectId> = due.iter().map(|n| n.user_id).collect();
    users.sort();
    users.dedup();
    let mut subs = by_user(db.get_subscriptions(&users).await?);

    for notification in &due {
        let Some(subscription) = subs
            .get(&notification.user_id)
            .and_then(|s| s.subscription_json.clone())
        else {
            stats.skipped += 1;
            continue;
        };

        let payload = PushPayload::for_notification(notification, bson::DateTime::from_chrono(now));
        let outcome = push.send(&subscription, &payload).await;
        if record_outcome(db, notification, outcome, &mut stats).await {
            if let Some(sub) = subs.get_mut(&notification.user_id) {
                sub.subscription_json = None;
            }
        }
    }
    Ok(stats)
}

/// Store the result of one push attempt and count it.
///
/// Bookkeeping errors are logged and counted as failures so the rest of
/// the batch still goes out. Returns whether the subscription has expired.
async fn record_outcome(
    db: &MongoDb,
    notification: &ScheduledNotification,
    outcome: Result<(), PushError>,
    stats: &mut DeliveryStats,
) -> bool {
    match outcome {
        Ok(()) => {
            match db
                .mark_notification_sent(&notification.id, bson::DateTime::now())
                .await
            {
                Ok(()) => stats.sent += 1,
                Err(e) => {
                    tracing::error!(
                        notification_id = %notification.id,
                        error = %e,
                        "Delivered notification could not be marked sent"
                    );
                    stats.failed += 1;
                }
            }
            false
        }
        Err(PushError::Expired) => {
            tracing::info!(
                user_id = %notification.user_id,
                notification_id = %notification.id,
                "Push subscription expired"
            );
            let cleared = async {
                db.clear_push_subscription(&notification.user_id).await?;
                db.mark_notification_expired(&notification.id, bson::DateTime::now())
                    .await
            };
            match cleared.await {
                Ok(()) => stats.expired += 1,
                Err(e) => {
                    tracing::error!(
                        user_id = %notification.user_id,
                        notification_id = %notification.id,
                        error = %e,
                        "Failed to record expired subscription"
                    );
                    stats.failed += 1;
                }
            }
            true
        }
        Err(e) => {
            tracing::warn!(
                user_id = %notification.user_id,
                notification_id = %notification.id,
                error = %e,
                "Push delivery failed"
            );
            stats.failed += 1;
            false
        }
    }
}

/// Queue reminders for all assignees of upcoming assignments.
pub async fn schedule_upcoming(db: &MongoDb, now: DateTime<Utc>) -> Result<usize, AppError> {
    let assignments = db
        .assignments_due_after(bson::DateTime::from_chrono(now))
        .await?;
    if assignments.is_empty() {
        return Ok(0);
    }

    let mut users: Vec<ObjectId> = assignments
        .iter()
        .flat_map(|a| a.assigned_to.iter().copied())
        .collect();
    users.sort();
    users.dedup();
    let subs = by_user(db.get_subscriptions(&users).await?);

    let mut scheduled = 0;
    for assignment in &assignments {
        for user in &assignment.assigned_to {
            let Some(sub) = subs.get(user) else { continue };
            if schedule_reminder(db, sub, assignment, now).await? {
                scheduled += 1;
            }
        }
    }
    Ok(scheduled)
}

async fn tick(state: &AppState) {
    let now = Utc::now();

    match state.push.as_ref() {
        Some(push) => match deliver_due(&state.db, push, now).await {
            Ok(stats) if stats != DeliveryStats::default() => {
                tracing::info!(
                    sent = stats.sent,
                    expired = stats.expired,
                    failed = stats.failed,
                    skipped = stats.skipped,
                    "Delivered notifications"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Notification delivery failed"),
        },
        None => tracing::debug!("Push not configured, skipping delivery"),
    }

    match schedule_upcoming(&state.db, now).await {
        Ok(0) => {}
        Ok(scheduled) => tracing::info!(scheduled, "Scheduled reminders"),
        Err(e) => tracing::error!(error = %e, "Reminder scheduling failed"),
    }
}

/// Poll until `shutdown` flips to true.
pub async fn run(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let interval = state.config.notification_poll_interval;
    tracing::info!(interval_secs = interval.as_secs(), "Notification scheduler started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tick(&state).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                // A dropped sender also means shutdown
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!("Notification scheduler stopped");
}
