// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core types, error definitions, and configuration shared across the
// discovery, run-loop, side-channel, and supplies-walker subsystems of the
// print backend suite.

pub mod config;
pub mod deviceid;
pub mod error;
pub mod types;

pub use config::{RuntimeConfig, SnmpConfig};
pub use error::{BackendError, ExitCode, Result};
pub use types::*;
