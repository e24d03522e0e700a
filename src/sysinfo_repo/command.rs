// Platform inventory tools (systemctl, nvidia-smi, powershell, ...) run to completion.

use crate::error::{MonitorError, ProbeKind, Result};

/// Stdout of `program`, or `ProbeUnavailable` when it is missing or exits non-zero.
pub(super) fn run(kind: ProbeKind, program: &str, args: &[&str]) -> Result<String> {
    let output = std::process::Command::new(program)
        .args(args)
        .output()
        .map_err(|e| MonitorError::unavailable(kind, format!("{}: {}", program, e)))?;
    if !output.status.success() {
        return Err(MonitorError::unavailable(
            kind,
            format!("{} exited with {}", program, output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
