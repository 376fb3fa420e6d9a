// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! ## Auth Flow
//!
//! 1. Client posts email + password to `/v1/auth/sign-in`
//! 2. [`AuthGate`] trims and validates, then asks the [`IdentityProvider`]
//! 3. On success the [`SessionStore`] registers a session and returns an
//!    HS256 session token
//! 4. Client sends `Authorization: Bearer <token>`; extractors resolve it
//!    back to the live session
//! 5. Admin-only routes additionally ask the [`RoleResolver`]
//!
//! ## Security
//!
//! - Tokens stop resolving as soon as their session is signed out or refreshed
//! - Admin is an exact `(identity, "admin")` row; lookup failures deny
//! - The session store and role store never write to each other

pub mod error;
pub mod extractor;
pub mod gate;
pub mod gotrue;
pub mod provider;
pub mod roles;
pub mod session;

pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use gate::{AuthGate, Credentials, SignUpOutcome};
pub use gotrue::GoTrueIdentityProvider;
pub use provider::{IdentityProvider, LocalIdentityProvider, ProviderSignUp};
pub use roles::{FileRoleStore, RoleResolver, RoleStore, ADMIN_ROLE};
pub use session::{Identity, ProviderGrant, Session, SessionEvent, SessionEventKind, SessionStore};
