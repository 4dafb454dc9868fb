use anyhow::{Context, Result, bail};
use std::process::{Command, Stdio};

/// Run a program, streaming its stdout and stderr to ours.
pub fn run(cmd: &mut Command) -> Result<()> {
    run_output(cmd.stdout(Stdio::inherit()))?;
    Ok(())
}

/// Run a program and capture its stdout. Stderr is passed through.
pub fn run_output(cmd: &mut Command) -> Result<String> {
    tracing::debug!("running: {}", describe(cmd));

    let output = cmd
        .stderr(Stdio::inherit())
        .output()
        .with_context(|| format!("failed to run {}", describe(cmd)))?;

    if !output.status.success() {
        bail!(
            "failed to execute {}\nstatus: {}",
            describe(cmd),
            output.status
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn describe(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}
