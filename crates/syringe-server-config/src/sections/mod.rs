// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod database;
mod logging;
mod platform;
mod shutdown;
mod ssh;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use platform::{PlatformConfig, PlatformConfigLayer, PlatformKind};
pub use shutdown::{ShutdownConfig, ShutdownConfigLayer};
pub use ssh::{SshConfig, SshConfigLayer};
