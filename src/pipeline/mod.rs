//! Conversion pipelines.
//!
//! Both directions are a [`Plan`]: an ordered list of declarative [`Step`]s
//! plus the intermediate files to remove afterwards. [`Converter::run`]
//! executes a plan, publishing one [`ProgressEvent`] per step outcome.
//! The first failing step ends the job and leaves every intermediate file in
//! place for inspection.
//!
//! Jobs cannot be cancelled. A tool that never exits stalls its job forever.

pub mod decode;
pub mod encode;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ToolPaths;
use crate::error::{PssError, Result};
use crate::job::{ConversionJob, Direction};
use crate::progress::{ProgressEvent, ProgressSender};
use crate::project::write_project;
use crate::stream::{append_sequence_end_code, inject_metadata};
use crate::tools::{ToolCommand, ToolCommands, ToolInvoker};

pub const COMPLETED_MESSAGE: &str = "Conversion completed successfully!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Tool(ToolCommand),
    InjectMetadata(PathBuf),
    TerminateSequence(PathBuf),
    WriteProject { path: PathBuf, contents: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// What is being attempted, e.g. "Injecting metadata into M2V file"
    pub description: String,
    /// Reported once the step succeeds
    pub completed: String,
    pub action: StepAction,
}

impl Step {
    pub fn new(
        description: impl Into<String>,
        completed: impl Into<String>,
        action: StepAction,
    ) -> Self {
        Self {
            description: description.into(),
            completed: completed.into(),
            action,
        }
    }

    /// Artifacts this step writes.
    pub fn produces(&self) -> Vec<PathBuf> {
        match &self.action {
            StepAction::Tool(command) => command.produces.clone(),
            StepAction::WriteProject { path, .. } => vec![path.clone()],
            StepAction::InjectMetadata(_) | StepAction::TerminateSequence(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub job_id: Uuid,
    pub steps: Vec<Step>,
    /// Removed after success unless retention was requested
    pub intermediates: Vec<PathBuf>,
    pub retain_intermediates: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed { step: i32, error: String },
}

/// Result of one successful step.
#[derive(Debug, Default)]
struct StepReport {
    /// Captured tool output, empty for in-process steps
    output: String,
    /// Replaces the step's stock completion message
    message: Option<String>,
}

/// Runs conversion jobs against a set of tools.
#[derive(Clone)]
pub struct Converter {
    invoker: Arc<dyn ToolInvoker>,
    commands: ToolCommands,
}

impl Converter {
    pub fn new(paths: ToolPaths, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            invoker,
            commands: ToolCommands::new(paths),
        }
    }

    pub fn plan(&self, job: &ConversionJob) -> Plan {
        match job.direction() {
            Direction::EncodeToContainer(settings) => {
                encode::plan(&self.commands, job, &settings)
            }
            Direction::DecodeFromContainer => decode::plan(&self.commands, job),
        }
    }

    /// Start `job` in the background and return immediately. Results arrive
    /// through `progress`; the handle may be dropped.
    pub fn submit(&self, job: ConversionJob, progress: ProgressSender) -> JoinHandle<JobOutcome> {
        let converter = self.clone();
        tokio::spawn(async move { converter.run(&job, &progress).await })
    }

    pub async fn run(&self, job: &ConversionJob, progress: &ProgressSender) -> JobOutcome {
        info!(
            "Starting job {}: {} -> {}",
            job.id(),
            job.input().display(),
            job.output().display()
        );
        self.execute(self.plan(job), progress).await
    }

    pub async fn execute(&self, plan: Plan, progress: &ProgressSender) -> JobOutcome {
        let total = plan.steps.len();

        for (index, step) in plan.steps.iter().enumerate() {
            let number = index as i32 + 1;
            info!("Step {}/{}: {}...", number, total, step.description);

            match self.execute_step(step).await {
                Ok(report) => {
                    let message = report.message.unwrap_or_else(|| step.completed.clone());
                    info!("Step {}/{}: {}", number, total, message);
                    for path in step.produces() {
                        debug!("Step {} wrote {}", number, path.display());
                    }
                    progress.send(ProgressEvent::completed(
                        plan.job_id,
                        number,
                        message,
                        report.output,
                    ));
                }
                Err(e) => {
                    let detail = e.to_string();
                    error!("Step {}/{} failed: {}", number, total, detail);
                    progress.send(ProgressEvent::failed(
                        plan.job_id,
                        number,
                        step.description.as_str(),
                        e.captured_output().to_string(),
                        detail.clone(),
                    ));
                    progress.send(ProgressEvent::aborted(plan.job_id, detail.clone()));
                    return JobOutcome::Failed {
                        step: number,
                        error: detail,
                    };
                }
            }
        }

        if plan.retain_intermediates {
            info!("Keeping {} intermediate files", plan.intermediates.len());
        } else {
            remove_intermediates(&plan.intermediates).await;
        }

        info!("Job {} completed", plan.job_id);
        progress.send(ProgressEvent::completed(
            plan.job_id,
            total as i32 + 1,
            COMPLETED_MESSAGE,
            String::new(),
        ));
        JobOutcome::Completed
    }

    async fn execute_step(&self, step: &Step) -> Result<StepReport> {
        match &step.action {
            StepAction::Tool(command) => Ok(StepReport {
                output: self.run_tool(command).await?,
                message: None,
            }),
            StepAction::InjectMetadata(path) => {
                let added = inject_metadata(path).await?;
                Ok(StepReport {
                    output: String::new(),
                    message: Some(format!("{} ({} bytes)", step.completed, added)),
                })
            }
            StepAction::TerminateSequence(path) => {
                let outcome = append_sequence_end_code(path).await?;
                Ok(StepReport {
                    output: String::new(),
                    message: Some(outcome.describe().to_string()),
                })
            }
            StepAction::WriteProject { path, contents } => {
                write_project(path, contents).await?;
                Ok(StepReport::default())
            }
        }
    }

    async fn run_tool(&self, command: &ToolCommand) -> Result<String> {
        let result = self.invoker.invoke(command).await?;

        if !result.success {
            return Err(PssError::ToolInvocation {
                tool: command.tool.name().to_string(),
                reason: result.describe_status(),
                output: result.output,
            });
        }

        for path in &command.produces {
            if !fs::try_exists(path).await.unwrap_or(false) {
                return Err(PssError::MissingOutput {
                    tool: command.tool.name().to_string(),
                    path: path.clone(),
                });
            }
        }

        Ok(result.output)
    }
}

/// Best effort; failures are logged and never fail the job.
async fn remove_intermediates(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::stream::GOP_START_CODE;
    use crate::tools::ToolOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Stands in for the real tools: records every command and writes the
    /// files it is declared to produce.
    #[derive(Default)]
    pub struct ScriptedInvoker {
        pub calls: Mutex<Vec<ToolCommand>>,
        /// Fail the n-th call (1-based) with a non-zero exit
        pub fail_call: Option<usize>,
        /// Leave the video stream without a GOP header
        pub corrupt_video: bool,
    }

    #[async_trait]
    impl ToolInvoker for ScriptedInvoker {
        async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(command.clone());
                calls.len()
            };

            if self.fail_call == Some(call) {
                return Ok(ToolOutput {
                    success: false,
                    status: Some(1),
                    output: format!("{} exploded", command.description),
                });
            }

            for path in &command.produces {
                let is_video = path.extension().is_some_and(|e| e == "m2v");
                let contents = if is_video && !self.corrupt_video {
                    let mut data = vec![0x00, 0x00, 0x01, 0xb3, 0x14, 0x00, 0xf0, 0x13];
                    data.extend_from_slice(&GOP_START_CODE);
                    data.extend_from_slice(&[0x00, 0x08, 0x00, 0x00]);
                    data
                } else {
                    b"data".to_vec()
                };
                std::fs::write(path, contents).unwrap();
            }

            Ok(ToolOutput {
                success: true,
                status: Some(0),
                output: format!("{} ok\n", command.description),
            })
        }
    }
}
