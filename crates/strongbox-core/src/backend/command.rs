//! Cancellable execution of external tools (gpg, age, git)

use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

/// Run `cmd`, feeding `input` on stdin, and return its raw output
///
/// The child is killed if the context is cancelled before it exits.
pub(crate) async fn output(
    ctx: &OpContext,
    mut cmd: Command,
    input: Option<&[u8]>,
) -> StoreResult<Output> {
    ctx.cancellation().check()?;

    let program = program_name(&cmd);
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    debug!(program = %program, "spawning external command");
    let mut child = cmd.spawn().map_err(|e| StoreError::Command {
        program: program.clone(),
        status: "not started".to_string(),
        stderr: e.to_string(),
    })?;

    let stdin = child.stdin.take();
    let feed = async move {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            // a child that exits early closes the pipe; its exit status tells the story
            let _ = stdin.write_all(input).await;
            let _ = stdin.shutdown().await;
        }
    };
    let run = async move {
        let (_, output) = tokio::join!(feed, child.wait_with_output());
        output
    };

    tokio::select! {
        output = run => Ok(output?),
        _ = ctx.cancellation().cancelled() => {
            debug!(program = %program, "cancelled, killing external command");
            Err(StoreError::Cancelled)
        }
    }
}

/// Run `cmd` and return stdout, failing on a non-zero exit status
pub(crate) async fn run(ctx: &OpContext, cmd: Command, input: Option<&[u8]>) -> StoreResult<Vec<u8>> {
    let program = program_name(&cmd);
    let output = output(ctx, cmd, input).await?;
    check(&program, output)
}

/// Turn a finished process into its stdout or a `Command` error
pub(crate) fn check(program: &str, output: Output) -> StoreResult<Vec<u8>> {
    if output.status.success() {
        return Ok(output.stdout);
    }
    Err(StoreError::Command {
        program: program.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

fn program_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}
