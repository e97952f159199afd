//! One-way progress channel from running jobs to whoever is watching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Step number of the terminal failure event.
pub const FAILURE_STEP: i32 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: Uuid,
    pub step: i32,
    pub message: String,
    /// Combined stdout/stderr of the tool run at this step
    pub output: String,
    /// Empty unless the step failed
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn completed(job_id: Uuid, step: i32, message: impl Into<String>, output: String) -> Self {
        Self {
            job_id,
            step,
            message: message.into(),
            output,
            error: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        job_id: Uuid,
        step: i32,
        message: impl Into<String>,
        output: String,
        error: String,
    ) -> Self {
        Self {
            job_id,
            step,
            message: message.into(),
            output,
            error,
            timestamp: Utc::now(),
        }
    }

    /// Terminal event following a failed step.
    pub fn aborted(job_id: Uuid, error: String) -> Self {
        Self::failed(job_id, FAILURE_STEP, "Conversion failed", String::new(), error)
    }

    pub fn is_failure(&self) -> bool {
        self.step == FAILURE_STEP
    }

    /// Single-line JSON rendering, one event per line.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Cloneable writer half; every job gets its own clone.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    inner: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    pub fn send(&self, event: ProgressEvent) {
        if self.inner.send(event).is_err() {
            debug!("Progress receiver dropped, event discarded");
        }
    }
}

#[derive(Debug)]
pub struct ProgressReceiver {
    inner: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Next event, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.inner.recv().await
    }

    /// Drain the channel until all senders have been dropped.
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }
}

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { inner: tx }, ProgressReceiver { inner: rx })
}
