// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password hashing and the shared team access code check.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use subtle::ConstantTimeEq;

use crate::config::hash_access_code;
use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password into an argon2 PHC string.
///
/// Argon2 is CPU-bound and runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing task failed: {}", e)))?
}

/// Check a password against a stored hash. A malformed hash never matches.
pub async fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let stored_hash = stored_hash.to_owned();
    tokio::task::spawn_blocking(move || verify_blocking(&password, &stored_hash))
        .await
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Password verification task failed: {}", e))
        })
}

fn hash_blocking(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
}

fn verify_blocking(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

pub fn check_password_strength(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Compare a submitted access code with the configured SHA-256 hash.
pub fn access_code_matches(submitted: &str, expected_hash: &str) -> bool {
    let submitted = hash_access_code(submitted.trim());
    submitted.as_bytes().ct_eq(expected_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash).await.unwrap());
        assert!(!verify_password("incorrect horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string").await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_does_not_block_runtime() {
        // On a single-threaded runtime a ticker only makes progress while
        // hashing is off the runtime thread.
        let ticks = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = ticks.clone();
        let ticker = tokio::spawn(async move {
            loop {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        });

        hash_password("correct horse battery").await.unwrap();
        ticker.abort();

        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("longenough").is_ok());
    }

    #[test]
    fn test_access_code() {
        let expected = hash_access_code("castle");
        assert!(access_code_matches("castle", &expected));
        assert!(access_code_matches("  castle ", &expected));
        assert!(!access_code_matches("Castle", &expected));
        assert!(!access_code_matches("", &expected));
    }
}
