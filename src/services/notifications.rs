// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push subscriptions, reminder settings and reminder scheduling.

use bson::doc;
use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use validator::Validate;

use crate::db::MongoDb;
use crate::error::AppError;
use crate::models::notification::{
    AssignmentReminder, NotificationSettingsForm, NotificationSettingsResponse, PushPayload,
    ScheduledNotificationResponse, SubscribeRequest, DEFAULT_REMINDER_MINUTES,
};
use crate::models::{
    Assignment, AssignmentStatus, NotificationStatus, NotificationSubscription,
    ScheduledNotification, User,
};
use crate::services::push::{PushError, PushService};
use crate::services::teams::{require_assignment, require_member};

/// Window in which notifications lost to an expired subscription are
/// requeued on resubscribe.
const RESCHEDULE_WINDOW_HOURS: i64 = 24;
/// Requeued notifications go out this long after resubscribing.
const RESCHEDULE_DELAY_MINUTES: i64 = 1;
/// Sent notifications shown by the debug view.
const DEBUG_RECENT_LIMIT: i64 = 10;

/// When to send a reminder `reminder_minutes` before `due`, or `None` if
/// that moment has already passed.
pub fn plan_reminder(
    due: DateTime<Utc>,
    reminder_minutes: i32,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let send_at = due - Duration::minutes(i64::from(reminder_minutes));
    (send_at > now).then_some(send_at)
}

/// The reminder message for one assignee.
pub fn reminder_notification(
    assignment: &Assignment,
    user_id: ObjectId,
    due: DateTime<Utc>,
    send_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ScheduledNotification {
    ScheduledNotification {
        id: ObjectId::new(),
        user_id,
        team_number: Some(assignment.team_number),
        assignment_id: Some(assignment.id),
        title: format!("Assignment Reminder: {}", assignment.title),
        body: format!("Due {}", due.format("%Y-%m-%d %I:%M %p")),
        url: format!("/team/{}/manage", assignment.team_number),
        data: doc! {
            "assignmentId": assignment.id.to_hex(),
            "teamNumber": assignment.team_number,
        },
        scheduled_time: bson::DateTime::from_chrono(send_at),
        created_at: bson::DateTime::from_chrono(now),
        sent: false,
        sent_at: None,
        status: NotificationStatus::Pending,
        error: None,
    }
}

/// Queue a reminder for `subscription`'s user about `assignment` if one is
/// wanted and not already queued. Returns whether one was created.
pub async fn schedule_reminder(
    db: &MongoDb,
    subscription: &NotificationSubscription,
    assignment: &Assignment,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let user = subscription.user_id;
    if assignment.status == AssignmentStatus::Completed || !assignment.is_assigned(&user) {
        return Ok(false);
    }
    let Some(due) = assignment.due_date.map(bson::DateTime::to_chrono) else {
        return Ok(false);
    };
    let Some(minutes) = subscription.reminder_minutes(&assignment.id) else {
        return Ok(false);
    };
    let Some(send_at) = plan_reminder(due, minutes, now) else {
        return Ok(false);
    };
    if db.pending_notification_exists(&user, &assignment.id).await? {
        return Ok(false);
    }

    db.insert_notification(&reminder_notification(assignment, user, due, send_at, now))
        .await?;
    tracing::debug!(
        user_id = %user,
        assignment_id = %assignment.id,
        send_at = %send_at,
        "Scheduled assignment reminder"
    );
    Ok(true)
}

/// Schedule reminders for every upcoming assignment of `user` in `team`.
async fn schedule_for_user(
    db: &MongoDb,
    subscription: &NotificationSubscription,
    team_number: i32,
) -> Result<usize, AppError> {
    let now = Utc::now();
    let assignments = db
        .upcoming_assignments_for_user(
            team_number,
            &subscription.user_id,
            bson::DateTime::from_chrono(now),
        )
        .await?;
    let mut scheduled = 0;
    for assignment in &assignments {
        if schedule_reminder(db, subscription, assignment, now).await? {
            scheduled += 1;
        }
    }
    Ok(scheduled)
}

/// Drop queued reminders that no longer have a reason to exist after the
/// user turned "enable all" off.
async fn prune_unsubscribed(
    db: &MongoDb,
    subscription: &NotificationSubscription,
    team_number: i32,
) -> Result<(), AppError> {
    let now = bson::DateTime::now();
    let assignments = db
        .upcoming_assignments_for_user(team_number, &subscription.user_id, now)
        .await?;
    for assignment in assignments
        .iter()
        .filter(|a| subscription.reminder_minutes(&a.id).is_none())
    {
        db.delete_pending_notifications_for_assignment(&assignment.id, Some(&subscription.user_id))
            .await?;
    }
    Ok(())
}

fn settings_response(
    team_number: i32,
    subscription: Option<&NotificationSubscription>,
) -> NotificationSettingsResponse {
    match subscription {
        Some(sub) => NotificationSettingsResponse {
            team_number,
            default_reminder_time: sub.default_reminder_time,
            enable_all_notifications: sub.enable_all_notifications,
            has_subscription: sub.has_live_subscription(),
            assignment_subscriptions: sub.assignment_subscriptions.iter().map(Into::into).collect(),
        },
        None => NotificationSettingsResponse {
            team_number,
            default_reminder_time: DEFAULT_REMINDER_MINUTES,
            enable_all_notifications: false,
            has_subscription: false,
            assignment_subscriptions: Vec::new(),
        },
    }
}

// ─── Subscriptions ───────────────────────────────────────────────

fn check_subscription(req: &SubscribeRequest) -> Result<(), AppError> {
    if !req.subscription.is_complete() {
        return Err(AppError::BadRequest(
            "Invalid subscription: endpoint and keys are required".to_string(),
        ));
    }
    Ok(())
}

pub async fn subscribe(
    db: &MongoDb,
    user: &User,
    req: &SubscribeRequest,
) -> Result<NotificationSubscription, AppError> {
    check_subscription(req)?;
    let sub = db
        .save_push_subscription(
            &user.id,
            user.team_number,
            &req.subscription,
            bson::DateTime::now(),
        )
        .await?;
    tracing::info!(user_id = %user.id, "Saved push subscription");
    Ok(sub)
}

/// Store a refreshed subscription and requeue recent notifications that
/// were dropped because the old one had expired.
pub async fn resubscribe(
    db: &MongoDb,
    user: &User,
    req: &SubscribeRequest,
) -> Result<u64, AppError> {
    subscribe(db, user, req).await?;

    let now = Utc::now();
    let since = bson::DateTime::from_chrono(now - Duration::hours(RESCHEDULE_WINDOW_HOURS));
    let send_at = bson::DateTime::from_chrono(now + Duration::minutes(RESCHEDULE_DELAY_MINUTES));
    let rescheduled = db
        .reschedule_expired_notifications(&user.id, since, send_at)
        .await?;

    tracing::info!(user_id = %user.id, rescheduled, "Resubscribed to push");
    Ok(rescheduled)
}

#[derive(Debug, Serialize)]
pub struct NotificationStatusResponse {
    pub push_configured: bool,
    pub subscribed: bool,
    pub team_number: Option<i32>,
    pub pending: usize,
}

pub async fn status(
    db: &MongoDb,
    user: &User,
    push_configured: bool,
) -> Result<NotificationStatusResponse, AppError> {
    let sub = db.get_subscription(&user.id).await?;
    let pending = db.pending_notifications_for_user(&user.id).await?.len();
    Ok(NotificationStatusResponse {
        push_configured,
        subscribed: sub.as_ref().is_some_and(NotificationSubscription::has_live_subscription),
        team_number: sub.and_then(|s| s.team_number).or(user.team_number),
        pending,
    })
}

// ─── Settings ────────────────────────────────────────────────────

pub async fn get_settings(
    db: &MongoDb,
    user: &User,
    team_number: i32,
) -> Result<NotificationSettingsResponse, AppError> {
    require_member(db, team_number, &user.id).await?;
    let sub = db.get_subscription(&user.id).await?;
    Ok(settings_response(team_number, sub.as_ref()))
}

pub async fn update_settings(
    db: &MongoDb,
    user: &User,
    team_number: i32,
    form: &NotificationSettingsForm,
) -> Result<NotificationSettingsResponse, AppError> {
    form.validate()?;
    require_member(db, team_number, &user.id).await?;

    let sub = db
        .update_notification_settings(
            &user.id,
            team_number,
            form.default_reminder_time,
            form.enable_all_notifications,
            bson::DateTime::now(),
        )
        .await?;
    if sub.enable_all_notifications {
        schedule_for_user(db, &sub, team_number).await?;
    } else {
        prune_unsubscribed(db, &sub, team_number).await?;
    }

    Ok(settings_response(team_number, Some(&sub)))
}

/// Turn on reminders for every assignment and schedule the caller's.
pub async fn subscribe_all(
    db: &MongoDb,
    user: &User,
    team_number: i32,
    reminder_time: i32,
) -> Result<(NotificationSettingsResponse, usize), AppError> {
    let form = NotificationSettingsForm {
        default_reminder_time: reminder_time,
        enable_all_notifications: true,
    };
    form.validate()?;
    require_member(db, team_number, &user.id).await?;

    let sub = db
        .update_notification_settings(
            &user.id,
            team_number,
            reminder_time,
            true,
            bson::DateTime::now(),
        )
        .await?;
    let scheduled = schedule_for_user(db, &sub, team_number).await?;

    tracing::info!(user_id = %user.id, team_number, scheduled, "Subscribed to all assignments");
    Ok((settings_response(team_number, Some(&sub)), scheduled))
}

pub async fn subscribe_assignment(
    db: &MongoDb,
    user: &User,
    assignment_id: &ObjectId,
    reminder_time: i32,
) -> Result<bool, AppError> {
    let form = crate::models::notification::ReminderForm { reminder_time };
    form.validate()?;

    let assignment = require_assignment(db, assignment_id).await?;
    if !assignment.is_assigned(&user.id) {
        return Err(AppError::Forbidden(
            "You are not assigned to this task".to_string(),
        ));
    }

    let mut reminders = db
        .get_subscription(&user.id)
        .await?
        .map(|s| s.assignment_subscriptions)
        .unwrap_or_default();
    reminders.retain(|r| r.assignment_id != *assignment_id);
    reminders.push(AssignmentReminder {
        assignment_id: *assignment_id,
        reminder_time,
    });
    let sub = db
        .set_assignment_reminders(&user.id, &reminders, bson::DateTime::now())
        .await?;

    // A changed reminder time replaces whatever was queued
    db.delete_pending_notifications_for_assignment(assignment_id, Some(&user.id))
        .await?;
    let scheduled = schedule_reminder(db, &sub, &assignment, Utc::now()).await?;

    tracing::info!(
        user_id = %user.id,
        assignment_id = %assignment_id,
        reminder_time,
        "Subscribed to assignment"
    );
    Ok(scheduled)
}

pub async fn unsubscribe_assignment(
    db: &MongoDb,
    user: &User,
    assignment_id: &ObjectId,
) -> Result<(), AppError> {
    let Some(sub) = db.get_subscription(&user.id).await? else {
        return Ok(());
    };
    let reminders: Vec<AssignmentReminder> = sub
        .assignment_subscriptions
        .into_iter()
        .filter(|r| r.assignment_id != *assignment_id)
        .collect();
    db.set_assignment_reminders(&user.id, &reminders, bson::DateTime::now())
        .await?;
    db.delete_pending_notifications_for_assignment(assignment_id, Some(&user.id))
        .await?;

    tracing::info!(
        user_id = %user.id,
        assignment_id = %assignment_id,
        "Unsubscribed from assignment"
    );
    Ok(())
}

// ─── Test / debug ────────────────────────────────────────────────

/// Push a test message to the caller's browser.
pub async fn send_test(
    db: &MongoDb,
    push: Option<&PushService>,
    user: &User,
) -> Result<(), AppError> {
    let push = push
        .ok_or_else(|| AppError::Push("Push notifications are not configured".to_string()))?;
    let subscription = db
        .get_subscription(&user.id)
        .await?
        .and_then(|s| s.subscription_json)
        .ok_or_else(|| AppError::BadRequest("No push subscription found".to_string()))?;

    let payload = PushPayload {
        title: "Test Notification".to_string(),
        body: "Push notifications are working".to_string(),
        url: "/".to_string(),
        assignment_id: None,
        team_number: user.team_number,
        timestamp: Utc::now().timestamp_millis(),
    };
    match push.send(&subscription, &payload).await {
        Ok(()) => Ok(()),
        Err(PushError::Expired) => {
            db.clear_push_subscription(&user.id).await?;
            Err(AppError::BadRequest(
                "Push subscription has expired; please resubscribe".to_string(),
            ))
        }
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Test push failed");
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NotificationDebug {
    pub pending: Vec<ScheduledNotificationResponse>,
    pub recent: Vec<ScheduledNotificationResponse>,
}

pub async fn debug(db: &MongoDb, user: &User) -> Result<NotificationDebug, AppError> {
    let pending = db.pending_notifications_for_user(&user.id).await?;
    let recent = db
        .recent_sent_notifications_for_user(&user.id, DEBUG_RECENT_LIMIT)
        .await?;
    Ok(NotificationDebug {
        pending: pending.iter().map(Into::into).collect(),
        recent: recent.iter().map(Into::into).collect(),
    })
}
