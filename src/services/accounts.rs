// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account lifecycle: registration, login, settings, password changes and
//! deletion.

use bson::oid::ObjectId;
use bson::{doc, Bson};
use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::db::MongoDb;
use crate::error::AppError;
use crate::models::User;
use crate::services::password::{
    access_code_matches, check_password_strength, hash_password, verify_password,
};

/// Failed password changes allowed before the lockout kicks in.
pub const MAX_PASSWORD_ATTEMPTS: i32 = 5;
/// How long a password change stays locked.
pub const PASSWORD_LOCKOUT_MINUTES: i64 = 15;

/// A registration request after transport-level validation.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
    pub team_passcode: &'a str,
}

fn require_access_code(config: &Config, submitted: &str) -> Result<(), AppError> {
    if submitted.trim().is_empty()
        || !access_code_matches(submitted, &config.team_access_code_hash)
    {
        return Err(AppError::Forbidden("Invalid team access code".to_string()));
    }
    Ok(())
}

pub async fn register(
    db: &MongoDb,
    config: &Config,
    account: NewAccount<'_>,
) -> Result<User, AppError> {
    require_access_code(config, account.team_passcode)?;

    let email = account.email.trim().to_lowercase();
    let username = account.username.trim();
    if email.is_empty() || username.is_empty() || account.password.is_empty() {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }
    if account.password != account.confirm_password {
        return Err(AppError::BadRequest("Passwords do not match".to_string()));
    }
    check_password_strength(account.password)?;

    if db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    if db.username_taken(username, None).await? {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let user = User {
        id: ObjectId::new(),
        username: username.to_string(),
        email,
        team_number: None,
        password_hash: hash_password(account.password).await?,
        created_at: bson::DateTime::now(),
        last_login: None,
        description: String::new(),
        failed_password_change_attempts: 0,
        last_failed_password_change: None,
        password_changed_at: None,
    };
    db.insert_user(&user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "Registered user");
    Ok(user)
}

/// Verify credentials and record the login time.
///
/// Unknown users and wrong passwords fail the same way.
pub async fn login(
    db: &MongoDb,
    config: &Config,
    login: &str,
    password: &str,
    team_passcode: &str,
) -> Result<User, AppError> {
    let login = login.trim();
    if login.is_empty() || password.is_empty() || team_passcode.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Please provide login, password, and team access code".to_string(),
        ));
    }
    require_access_code(config, team_passcode)?;

    let Some(mut user) = db.get_user_by_login(login).await? else {
        tracing::info!(login, "Failed login");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash).await? {
        tracing::info!(login, "Failed login");
        return Err(AppError::InvalidCredentials);
    }

    let now = bson::DateTime::now();
    db.update_user(&user.id, doc! { "last_login": now }).await?;
    user.last_login = Some(now);

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(user)
}

/// Load the user behind a session, treating a deleted account as logged out.
pub async fn current_user(db: &MongoDb, user_id: &ObjectId) -> Result<User, AppError> {
    db.get_user(user_id).await?.ok_or(AppError::Unauthorized)
}

/// Update username and description; empty values are ignored.
pub async fn update_settings(
    db: &MongoDb,
    user_id: &ObjectId,
    username: Option<&str>,
    description: Option<&str>,
) -> Result<User, AppError> {
    let mut set = bson::Document::new();

    if let Some(username) = username.map(str::trim).filter(|u| !u.is_empty()) {
        if db.username_taken(username, Some(user_id)).await? {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        set.insert("username", username);
    }
    if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
        set.insert("description", description);
    }

    if !set.is_empty() {
        db.update_user(user_id, set).await?;
    }
    current_user(db, user_id).await
}

/// Whether `username` is free for `user` (their own name counts as free).
pub async fn username_available(
    db: &MongoDb,
    user: Option<&ObjectId>,
    username: &str,
) -> Result<bool, AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Ok(false);
    }
    Ok(!db.username_taken(username, user).await?)
}

/// Time left on a password-change lockout, if one is active.
pub fn lockout_remaining(user: &User, now: DateTime<Utc>) -> Option<Duration> {
    if user.failed_password_change_attempts < MAX_PASSWORD_ATTEMPTS {
        return None;
    }
    let last_failed = user.last_failed_password_change?.to_chrono();
    let remaining = last_failed + Duration::minutes(PASSWORD_LOCKOUT_MINUTES) - now;
    (remaining > Duration::zero()).then_some(remaining)
}

pub async fn change_password(
    db: &MongoDb,
    user_id: &ObjectId,
    current_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    let user = current_user(db, user_id).await?;
    let now = Utc::now();

    if let Some(remaining) = lockout_remaining(&user, now) {
        let minutes = remaining.num_minutes() + 1;
        return Err(AppError::Locked(format!(
            "Too many failed attempts. Try again in {} minutes",
            minutes
        )));
    }

    if !verify_password(current_password, &user.password_hash).await? {
        db.update_user(
            user_id,
            doc! {
                "last_failed_password_change": bson::DateTime::from_chrono(now),
                "failed_password_change_attempts": user.failed_password_change_attempts + 1,
            },
        )
        .await?;
        tracing::warn!(
            user_id = %user_id,
            attempts = user.failed_password_change_attempts + 1,
            "Failed password change"
        );
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }

    check_password_strength(new_password)?;

    db.update_user(
        user_id,
        doc! {
            "password_hash": hash_password(new_password).await?,
            "password_changed_at": bson::DateTime::from_chrono(now),
            "failed_password_change_attempts": 0,
            "last_failed_password_change": Bson::Null,
        },
    )
    .await?;

    tracing::info!(user_id = %user_id, "Password changed");
    Ok(())
}

/// Delete an account and everything hanging off it.
///
/// Team owners must delete (or hand off) their team first.
pub async fn delete_account(db: &MongoDb, user_id: &ObjectId) -> Result<(), AppError> {
    let user = current_user(db, user_id).await?;

    if let Some(team_number) = user.team_number {
        match db.get_team(team_number).await? {
            Some(team) if team.is_owner(user_id) => {
                return Err(AppError::Conflict(
                    "Team owners must delete their team before deleting their account".to_string(),
                ));
            }
            Some(_) => {
                db.remove_team_member(team_number, user_id).await?;
            }
            None => {}
        }
    }

    db.delete_pending_notifications_for_user(user_id).await?;
    db.delete_subscription(user_id).await?;
    db.delete_user(user_id).await?;

    tracing::info!(user_id = %user_id, username = %user.username, "Deleted account");
    Ok(())
}

/// Whether `target` is a safe post-login redirect: a same-origin absolute
/// path with no scheme, host, backslash, or parent references.
pub fn is_safe_redirect(target: &str) -> bool {
    !target.is_empty()
        && target.starts_with('/')
        && !target.contains("//")
        && !target.contains('\\')
        && !target.contains("..")
        && !target.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_failures(attempts: i32, last_failed: Option<DateTime<Utc>>) -> User {
        User {
            id: ObjectId::new(),
            username: "scout".to_string(),
            email: "scout@example.com".to_string(),
            team_number: None,
            password_hash: String::new(),
            created_at: bson::DateTime::now(),
            last_login: None,
            description: String::new(),
            failed_password_change_attempts: attempts,
            last_failed_password_change: last_failed.map(bson::DateTime::from_chrono),
            password_changed_at: None,
        }
    }

    #[test]
    fn test_lockout_after_five_failures() {
        let now = Utc::now();
        let user = user_with_failures(5, Some(now - Duration::minutes(3)));

        let remaining = lockout_remaining(&user, now).unwrap();
        assert!(remaining <= Duration::minutes(12));
        assert!(remaining > Duration::minutes(11));
    }

    #[test]
    fn test_lockout_expires_after_fifteen_minutes() {
        let now = Utc::now();
        let user = user_with_failures(7, Some(now - Duration::minutes(16)));
        assert!(lockout_remaining(&user, now).is_none());
    }

    #[test]
    fn test_no_lockout_below_threshold() {
        let now = Utc::now();
        let user = user_with_failures(4, Some(now));
        assert!(lockout_remaining(&user, now).is_none());

        let user = user_with_failures(5, None);
        assert!(lockout_remaining(&user, now).is_none());
    }

    #[test]
    fn test_safe_redirect() {
        assert!(is_safe_redirect("/team/manage"));
        assert!(is_safe_redirect("/scouting?event=2026cave"));
        assert!(!is_safe_redirect(""));
        assert!(!is_safe_redirect("https://evil.example"));
        assert!(!is_safe_redirect("//evil.example"));
        assert!(!is_safe_redirect("/\\evil.example"));
        assert!(!is_safe_redirect("/scouting/../admin"));
        assert!(!is_safe_redirect("team/manage"));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_access_code_before_db() {
        let config = Config::test_default();
        let db = MongoDb::new_mock();
        let result = register(
            &db,
            &config,
            NewAccount {
                email: "a@example.com",
                username: "alice",
                password: "password123",
                confirm_password: "password123",
                team_passcode: "wrong",
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_mismatched_passwords() {
        let config = Config::test_default();
        let db = MongoDb::new_mock();
        let result = register(
            &db,
            &config,
            NewAccount {
                email: "a@example.com",
                username: "alice",
                password: "password123",
                confirm_password: "password124",
                team_passcode: "test-access-code",
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(AppError::BadRequest(msg)) if msg == "Passwords do not match"
        ));
    }
}
