// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `powerseq` library.
//!
//! The orchestration surface itself never fails: device write failures are
//! absorbed and logged where they happen. These types cover the parts that
//! can legitimately reject input: value parsing, configuration loading and
//! the [`Backend`](crate::backend::Backend) write contract.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred while loading configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred while writing to a device.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Errors related to parsing literal values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// An invalid power action string was provided.
    #[error("invalid power action: {0}")]
    InvalidPowerAction(String),

    /// An invalid outlet state string was provided.
    #[error("invalid outlet state: {0}")]
    InvalidOutletState(String),

    /// A schedule time was not in `HH:MM` form.
    #[error("invalid schedule time: {0}")]
    InvalidTime(String),

    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u32,
        /// Maximum allowed value.
        max: u32,
        /// The actual value that was provided.
        actual: u32,
    },
}

/// Errors related to loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document is not valid.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by a device backend when a write does not go through.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device did not accept the write.
    #[error("write to {target} failed: {message}")]
    WriteFailed {
        /// Human readable target, e.g. `10.0.0.5 outlet 3`.
        target: String,
        /// Description of the failure.
        message: String,
    },

    /// The device could not be reached.
    #[error("device {0} is unreachable")]
    Unreachable(String),

    /// The write did not complete in time.
    #[error("write to {target} timed out after {millis} ms")]
    Timeout {
        /// Human readable target.
        target: String,
        /// Elapsed time before giving up.
        millis: u64,
    },

    /// A shell hook could not be started or exited unsuccessfully.
    #[error("command `{command}` failed: {message}")]
    CommandFailed {
        /// The command line.
        command: String,
        /// Spawn error or exit status.
        message: String,
    },
}

impl DeviceError {
    /// Creates a [`DeviceError::WriteFailed`].
    #[must_use]
    pub fn write_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
