// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device write collaborators.
//!
//! The engine never talks to hardware directly. Every physical write goes
//! through a [`Backend`]: an SNMP client for PDU outlets, a GPIO daemon
//! client for relay pins, and a shell for hooks. The engine owns the state
//! bookkeeping and broadcasting around each write; a backend only reports
//! whether the write went through.
//!
//! # Examples
//!
//! ```
//! use powerseq::backend::Backend;
//! use powerseq::error::DeviceError;
//! use powerseq::state::GpioOutput;
//! use powerseq::types::PowerAction;
//!
//! struct DryRun;
//!
//! impl Backend for DryRun {
//!     async fn write_outlet(
//!         &self,
//!         host: &str,
//!         index: &str,
//!         action: PowerAction,
//!     ) -> Result<(), DeviceError> {
//!         println!("{host} outlet {index} -> {action}");
//!         Ok(())
//!     }
//!
//!     async fn write_gpio(&self, output: &GpioOutput, action: PowerAction) -> Result<(), DeviceError> {
//!         println!("{} -> {action}", output.key());
//!         Ok(())
//!     }
//! }
//! ```

mod hook;

use std::future::Future;

use crate::error::DeviceError;
use crate::state::GpioOutput;
use crate::types::PowerAction;

pub use hook::run_shell;

/// Writes power actions to physical devices.
///
/// Implementations are shared by every engine task, so they must be
/// `Send + Sync`, and the futures they return must be `Send` so that
/// auto-off timers and schedules can run them on spawned tasks.
pub trait Backend: Send + Sync + 'static {
    /// Switches one PDU outlet.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the PDU rejects the write or cannot be reached.
    fn write_outlet(
        &self,
        host: &str,
        index: &str,
        action: PowerAction,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Switches one GPIO output.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the GPIO daemon rejects the write.
    fn write_gpio(
        &self,
        output: &GpioOutput,
        action: PowerAction,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Runs a configured shell hook to completion.
    ///
    /// The default implementation runs the command with `sh -c` when the
    /// `shell` feature is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::CommandFailed` if the command cannot be started
    /// or exits unsuccessfully.
    fn run_command(&self, command: &str) -> impl Future<Output = Result<(), DeviceError>> + Send {
        run_shell(command.to_string())
    }
}
