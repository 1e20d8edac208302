// src/utils/powershell.rs

use std::{os::windows::process::CommandExt, process::Command};

use anyhow::{Context, Result};
use tracing::{error, trace};
use windows::Win32::System::Threading::CREATE_NO_WINDOW;

/// Executes a PowerShell script in a hidden window and captures its output.
///
/// # Arguments
///
/// * `script` - The PowerShell script to execute.
///
/// # Returns
///
/// * `Ok(stdout)` trimmed, if the script exited successfully with no error output.
/// * `Err(anyhow::Error)` carrying stderr otherwise.
pub fn execute_powershell_script(script: &str) -> Result<String> {
    trace!("Running PowerShell: {}", script);
    let output = Command::new("powershell")
        .args([
            "-NoProfile",
            "-NonInteractive",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            script,
        ])
        .creation_flags(CREATE_NO_WINDOW.0)
        .output()
        .context("Failed to start PowerShell")?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() || !stderr.is_empty() {
        error!("PowerShell script error output: {}", stderr);
        anyhow::bail!("PowerShell script error: {}", stderr);
    }
    Ok(stdout)
}

/// Quotes `value` as a single-quoted PowerShell string literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_doubles_single_quotes() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), "'it''s'");
        assert_eq!(quote("\\Microsoft\\"), "'\\Microsoft\\'");
    }
}
