//! Asynchronous subprocess execution.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{FleetError, Result};

/// Run `program args..` and return its trimmed stdout.
///
/// Fails when the process cannot be spawned or exits non-zero; stderr is
/// carried in the error message.
pub async fn run(program: &str, args: &[String], cwd: Option<&Path>) -> Result<String> {
    let rendered = render(program, args);
    debug!(command = %rendered, "spawning");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|e| FleetError::Command {
        command: rendered.clone(),
        message: format!("failed to spawn: {e}"),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FleetError::Command {
            command: rendered,
            message: format!("{} {}", output.status, stderr.trim()),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn render(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
