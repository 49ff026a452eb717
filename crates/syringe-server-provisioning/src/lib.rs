// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant stores: where they live, how they are created and how a session
//! reaches exactly one of them.
//!
//! Every identity owns one isolated tenant store, addressed by a
//! [`TenantId`] derived from its registration key. A session never holds a
//! platform-wide credential; it gets a [`ScopedCredential`] for its own tenant
//! that expires within seconds.

pub mod connector;
pub mod credential;
pub mod error;
pub mod platform;
pub mod provisioner;
pub mod tenant;
pub mod token;

pub use connector::{SqliteConnector, TenantConnection, TenantConnector};
pub use credential::ScopedCredential;
pub use error::{ConnectionError, PlatformError, ProvisioningError, Result};
pub use platform::{DatabaseInfo, DatabasePlatform, HttpPlatform, LocalPlatform};
pub use provisioner::{ProvisionOutcome, TenantProvisioner};
pub use tenant::{TenantAddress, TenantAddressing, TenantId, TENANT_ID_LEN};
pub use token::{TokenClaims, TokenSigner};
