// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shell hook runner.

use crate::error::DeviceError;

/// Runs `command` through `sh -c` and waits for it to exit.
///
/// Output is logged, never returned: stdout at debug level, stderr as a
/// warning.
///
/// # Errors
///
/// Returns `DeviceError::CommandFailed` if the shell cannot be spawned or
/// the command exits with a non-zero status.
#[cfg(feature = "shell")]
pub async fn run_shell(command: String) -> Result<(), DeviceError> {
    tracing::debug!(%command, "Running hook");

    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DeviceError::CommandFailed {
            command: command.clone(),
            message: e.to_string(),
        })?;

    if !output.stdout.is_empty() {
        tracing::debug!(
            %command,
            stdout = %String::from_utf8_lossy(&output.stdout).trim_end(),
            "Hook stdout"
        );
    }
    if !output.stderr.is_empty() {
        tracing::warn!(
            %command,
            stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
            "Hook stderr"
        );
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(DeviceError::CommandFailed {
            command,
            message: output.status.to_string(),
        })
    }
}

/// Without the `shell` feature hooks are logged and skipped.
///
/// # Errors
///
/// Never fails.
#[cfg(not(feature = "shell"))]
pub async fn run_shell(command: String) -> Result<(), DeviceError> {
    tracing::warn!(%command, "Shell hooks are disabled, skipping");
    Ok(())
}
