// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod accounts;
pub mod notifications;
pub mod password;
pub mod pit;
pub mod push;
pub mod scheduler;
pub mod scouting;
pub mod teams;

pub use push::{PushError, PushService, VapidKey};
