// External tool layer
//
// - commands: argument builders for ffmpeg, ps2str and vgmstream
// - process: ToolInvoker backed by real child processes
//
// The pipelines only see the ToolInvoker trait, so tests can substitute
// a scripted invoker for the real binaries.

pub mod commands;
pub mod process;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use commands::*;
pub use process::*;

use crate::config::ToolPaths;
use crate::error::Result;

/// Exit status and combined stdout/stderr of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit code, absent when the process was killed by a signal
    pub status: Option<i32>,
    pub output: String,
}

impl ToolOutput {
    pub fn describe_status(&self) -> String {
        match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs one external program to completion.
///
/// A program that starts but exits non-zero is an `Ok` with `success == false`;
/// `Err` is reserved for programs that could not be run at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Factory for tool invoker instances
pub struct ToolInvokerFactory;

impl ToolInvokerFactory {
    /// Child-process invoker used outside of tests
    pub fn create_default() -> Arc<dyn ToolInvoker> {
        Arc::new(ProcessInvoker::new())
    }
}

/// Presence of each required executable. Existence only, nothing is run.
pub fn check_dependencies(paths: &ToolPaths) -> BTreeMap<&'static str, bool> {
    BTreeMap::from([
        ("ffmpeg", paths.ffmpeg.is_file()),
        ("ps2str", paths.ps2str.is_file()),
        ("vgmstream", paths.vgmstream.is_file()),
    ])
}
