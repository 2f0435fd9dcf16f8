// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod event;
pub mod profile_update;
pub mod token;
pub mod user;

pub use event::{CalendarEvent, CollectionPage};
pub use profile_update::{PhoneUpdate, PrimaryUpdate, ProfileUpdate};
pub use token::{TokenCache, TokenCacheBlob};
pub use user::{CachedUser, DirectoryUserSummary, MailboxSettings, UserProfile};
