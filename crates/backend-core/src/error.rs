// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the backend suite.

use thiserror::Error;

/// Top-level error type for all backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("SNMP error: {0}")]
    Snmp(String),

    #[error("side-channel error: {0}")]
    SideChannel(String),

    #[error("run loop error: {0}")]
    RunLoop(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid device URI: {0}")]
    DeviceUri(String),

    #[error("character set decode error: {0}")]
    Charset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Spooler-facing exit codes, per the backend command-line convention.
///
/// A backend signals the outcome of a print attempt to its caller purely
/// through its process exit status; these are the fixed values the spooler
/// interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Ok = 0,
    Failed = 1,
    AuthRequired = 2,
    HoldJob = 3,
    StopQueue = 4,
    CancelJob = 5,
    RetryJobNow = 6,
    RetryJobCurrentTime = 7,
}

impl From<&BackendError> for ExitCode {
    fn from(err: &BackendError) -> Self {
        match err {
            BackendError::Io(_) | BackendError::RunLoop(_) => ExitCode::Failed,
            BackendError::Snmp(_) | BackendError::SideChannel(_) => ExitCode::Failed,
            BackendError::Discovery(_) | BackendError::DeviceUri(_) => ExitCode::Failed,
            BackendError::Config(_) => ExitCode::StopQueue,
            BackendError::Charset(_) => ExitCode::Failed,
            BackendError::Serialization(_) => ExitCode::Failed,
        }
    }
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}
