// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Retry helper for transient MongoDB failures.
//!
//! Only connection-class errors are retried (server selection timeouts,
//! socket errors, a cleared pool). Anything else, such as a duplicate key
//! or a decode failure, is returned immediately.

use std::future::Future;
use std::time::Duration;

use mongodb::error::{Error, ErrorKind};

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Whether an error is worth another attempt.
pub fn is_retryable(err: &Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. }
    )
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && is_retryable(&err) => {
                tracing::warn!(
                    op = op_name,
                    attempt,
                    max_attempts = attempts,
                    error = %err,
                    "MongoDB operation failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => {
                if is_retryable(&err) {
                    tracing::error!(
                        op = op_name,
                        attempts,
                        error = %err,
                        "MongoDB operation failed after retries"
                    );
                }
                return Err(err);
            }
        }
    }
}
