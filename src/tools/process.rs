use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PssError, Result};
use super::{ToolCommand, ToolInvoker, ToolOutput};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Runs tools as child processes. Blocks the calling task until the child
/// exits; there is no timeout.
#[derive(Debug, Default, Clone)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }

    fn command(&self, command: &ToolCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }
}

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput> {
        info!("Running {}: {}", command.description, command.display_line());

        let mut child = self.command(command).spawn().map_err(|e| PssError::ToolInvocation {
            tool: command.tool.name().to_string(),
            reason: format!("failed to start {}: {}", command.program.display(), e),
            output: String::new(),
        })?;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        // Both streams land in one buffer in arrival order
        let mut output = String::new();
        while let Some(line) = rx.recv().await {
            debug!("[{}] {}", command.tool.name(), line.trim_end());
            output.push_str(&line);
        }

        let status = child.wait().await.map_err(|e| PssError::ToolInvocation {
            tool: command.tool.name().to_string(),
            reason: format!("failed to wait for process: {}", e),
            output: output.clone(),
        })?;

        debug!("{} exited with {}", command.tool.name(), status);
        Ok(ToolOutput {
            success: status.success(),
            status: status.code(),
            output,
        })
    }
}

async fn forward_lines<R>(reader: R, tx: tokio::sync::mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Stopped reading tool output: {}", e);
                break;
            }
        }
    }
}
