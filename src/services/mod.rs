// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod consent;
pub mod directory;
pub mod identity;
pub mod photo;
pub mod user;

pub use consent::{ConsentCallback, ConsentNegotiator, ConsentState};
pub use directory::{AuthenticatedClient, DirectoryClient, DirectoryRequest, DirectoryService};
pub use identity::{IdentityClient, IdentityService, TokenAcquisition};
