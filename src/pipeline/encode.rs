//! Video container to PSS.

use super::{Plan, Step, StepAction};
use crate::job::{ConversionJob, EncodeArtifacts, EncodeSettings};
use crate::project::{absolute_or_given, render_project};
use crate::tools::ToolCommands;

pub fn plan(commands: &ToolCommands, job: &ConversionJob, settings: &EncodeSettings) -> Plan {
    let artifacts = EncodeArtifacts::for_output(job.output());
    let project = render_project(
        &absolute_or_given(&artifacts.video),
        &absolute_or_given(&artifacts.audio_ads),
    );

    let steps = vec![
        Step::new(
            "Generating M2V and WAV files with FFMPEG",
            "FFMPEG conversion completed",
            StepAction::Tool(commands.encode_elementary_streams(
                job.input(),
                &artifacts.video,
                &artifacts.audio_pcm,
                settings,
            )),
        ),
        Step::new(
            "Injecting metadata into M2V file",
            "Metadata injected successfully",
            StepAction::InjectMetadata(artifacts.video.clone()),
        ),
        Step::new(
            "Appending sequence end code",
            "Sequence end code appended",
            StepAction::TerminateSequence(artifacts.video.clone()),
        ),
        Step::new(
            "Generating ADS audio with PS2STR",
            "ADS audio generated",
            StepAction::Tool(commands.encode_ads(
                &artifacts.output_dir,
                &artifacts.audio_pcm,
                &artifacts.audio_ads,
            )),
        ),
        Step::new(
            "Creating project file",
            "Project file created",
            StepAction::WriteProject {
                path: artifacts.project.clone(),
                contents: project,
            },
        ),
        Step::new(
            "Multiplexing PSS file with PS2STR",
            "PSS file created successfully!",
            StepAction::Tool(commands.multiplex_pss(
                &artifacts.output_dir,
                &artifacts.project,
                &artifacts.muxed,
            )),
        ),
    ];

    Plan {
        job_id: job.id(),
        steps,
        intermediates: artifacts.intermediates(),
        retain_intermediates: job.retain_intermediates(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolPaths;
    use crate::error::PssError;
    use crate::job::ENCODE_STEPS;
    use crate::pipeline::testing::ScriptedInvoker;
    use crate::pipeline::{COMPLETED_MESSAGE, Converter, JobOutcome};
    use crate::progress::{FAILURE_STEP, progress_channel};
    use crate::stream::{ATTRIBUTION, SEQUENCE_END_CODE};
    use crate::tools::{MockToolInvoker, Tool, ToolOutput};
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    const SETTINGS: EncodeSettings = EncodeSettings {
        width: 320,
        height: 240,
        bitrate: 1150,
    };

    fn tools(dir: &Path) -> ToolPaths {
        ToolPaths {
            ffmpeg: dir.join("ffmpeg"),
            ps2str: dir.join("bin/ps2str"),
            vgmstream: dir.join("bin/vgmstream-cli"),
        }
    }

    fn names_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn encode_job(temp: &TempDir, retain: bool) -> (ConversionJob, PathBuf) {
        let input = temp.child("clip.mov");
        input.touch().unwrap();
        let out_dir = temp.child("out");
        out_dir.create_dir_all().unwrap();
        let output = out_dir.path().join("out.pss");
        let job = ConversionJob::encode(input.path(), &output, SETTINGS, retain).unwrap();
        (job, out_dir.path().to_path_buf())
    }

    #[test]
    fn test_plan_orders_steps() {
        let job = ConversionJob::encode("clip.mov", "/o/out.pss", SETTINGS, false).unwrap();
        let commands = ToolCommands::new(tools(Path::new("/t")));
        let plan = plan(&commands, &job, &SETTINGS);

        assert_eq!(plan.steps.len(), ENCODE_STEPS);
        assert!(matches!(&plan.steps[0].action, StepAction::Tool(c) if c.tool == Tool::Ffmpeg));
        assert_eq!(
            plan.steps[1].action,
            StepAction::InjectMetadata(PathBuf::from("/o/out.m2v"))
        );
        assert_eq!(
            plan.steps[2].action,
            StepAction::TerminateSequence(PathBuf::from("/o/out.m2v"))
        );
        assert_eq!(plan.steps[4].produces(), vec![PathBuf::from("/o/out.mux")]);
        assert!(matches!(&plan.steps[5].action, StepAction::Tool(c) if c.args[0] == "m"));
        assert_eq!(plan.intermediates.len(), 4);
    }

    #[test]
    fn test_project_references_streams_with_forward_slashes() {
        let job = ConversionJob::encode("clip.mov", "/o/out.pss", SETTINGS, false).unwrap();
        let plan = plan(&ToolCommands::new(tools(Path::new("/t"))), &job, &SETTINGS);

        let StepAction::WriteProject { contents, .. } = &plan.steps[4].action else {
            panic!("step 5 should write the project file");
        };
        assert!(contents.starts_with("pss\n\n\tstream video:0\n"));
        assert!(contents.contains("input \"/o/out.m2v\""));
        assert!(contents.contains("input \"/o/out.ads\""));
        assert!(!contents.contains('\\'));
    }

    #[tokio::test]
    async fn test_successful_run_leaves_only_pss() {
        let temp = TempDir::new().unwrap();
        let (job, out_dir) = encode_job(&temp, false);
        let invoker = Arc::new(ScriptedInvoker::default());
        let converter = Converter::new(tools(temp.path()), invoker.clone());
        let (tx, rx) = progress_channel();

        let outcome = converter.submit(job, tx).await.unwrap();
        let events = rx.collect().await;

        assert_eq!(outcome, JobOutcome::Completed);
        let steps: Vec<i32> = events.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(events.iter().all(|e| e.error.is_empty()));
        assert_eq!(events[0].output, "Generate M2V and WAV ok\n");
        assert!(events[1].output.is_empty());
        assert_eq!(events[6].message, COMPLETED_MESSAGE);

        assert_eq!(names_in(&out_dir), vec!["out.pss"]);
        assert_eq!(invoker.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retained_run_keeps_intermediates() {
        let temp = TempDir::new().unwrap();
        let (job, out_dir) = encode_job(&temp, true);
        let converter = Converter::new(tools(temp.path()), Arc::new(ScriptedInvoker::default()));
        let (tx, rx) = progress_channel();

        converter.submit(job, tx).await.unwrap();
        let events = rx.collect().await;

        assert_eq!(events.last().unwrap().step, 7);
        assert_eq!(
            events[1].message,
            format!("Metadata injected successfully ({} bytes)", 4 + ATTRIBUTION.len())
        );
        assert_eq!(events[2].message, "Sequence end code appended");
        assert_eq!(
            names_in(&out_dir),
            vec!["out.ads", "out.m2v", "out.mux", "out.pss", "out.wav"]
        );

        let video = std::fs::read(out_dir.join("out.m2v")).unwrap();
        assert!(video.ends_with(&SEQUENCE_END_CODE));
        let needle = ATTRIBUTION.as_bytes();
        assert!(video.windows(needle.len()).any(|w| w == needle));
    }

    #[tokio::test]
    async fn test_first_tool_failure_emits_two_events() {
        let temp = TempDir::new().unwrap();
        let (job, out_dir) = encode_job(&temp, false);
        let stale = out_dir.join("out.wav");
        std::fs::write(&stale, b"from an earlier run").unwrap();

        let mut mock = MockToolInvoker::new();
        mock.expect_invoke()
            .withf(|cmd| cmd.tool == Tool::Ffmpeg)
            .times(1)
            .returning(|_| {
                Ok(ToolOutput {
                    success: false,
                    status: Some(1),
                    output: "Invalid data found when processing input".to_string(),
                })
            });
        let converter = Converter::new(tools(temp.path()), Arc::new(mock));
        let (tx, rx) = progress_channel();

        let outcome = converter.submit(job, tx).await.unwrap();
        let events = rx.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].step, 1);
        assert_eq!(events[0].output, "Invalid data found when processing input");
        assert_eq!(events[0].error, "FFMPEG failed: exit status 1");
        assert_eq!(events[1].step, FAILURE_STEP);
        assert!(!events[1].error.is_empty());
        assert!(matches!(outcome, JobOutcome::Failed { step: 1, .. }));
        assert!(stale.exists());
    }

    #[tokio::test]
    async fn test_missing_gop_fails_at_injection_and_keeps_files() {
        let temp = TempDir::new().unwrap();
        let (job, out_dir) = encode_job(&temp, false);
        let invoker = Arc::new(ScriptedInvoker {
            corrupt_video: true,
            ..Default::default()
        });
        let converter = Converter::new(tools(temp.path()), invoker.clone());
        let (tx, rx) = progress_channel();

        let outcome = converter.submit(job, tx).await.unwrap();
        let events = rx.collect().await;

        let steps: Vec<i32> = events.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 2, FAILURE_STEP]);
        assert!(events[1].error.contains("GOP start code"));
        assert!(matches!(outcome, JobOutcome::Failed { step: 2, .. }));
        assert_eq!(invoker.calls.lock().unwrap().len(), 1);
        assert_eq!(names_in(&out_dir), vec!["out.m2v", "out.wav"]);
    }

    #[tokio::test]
    async fn test_multiplex_failure_stops_before_cleanup() {
        let temp = TempDir::new().unwrap();
        let (job, out_dir) = encode_job(&temp, false);
        let invoker = Arc::new(ScriptedInvoker {
            fail_call: Some(3),
            ..Default::default()
        });
        let converter = Converter::new(tools(temp.path()), invoker);
        let (tx, rx) = progress_channel();

        converter.submit(job, tx).await.unwrap();
        let events = rx.collect().await;

        let steps: Vec<i32> = events.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5, 6, FAILURE_STEP]);
        assert_eq!(events[5].message, "Multiplexing PSS file with PS2STR");
        assert_eq!(events[5].output, "Multiplex PSS exploded");
        assert_eq!(
            names_in(&out_dir),
            vec!["out.ads", "out.m2v", "out.mux", "out.wav"]
        );
    }

    #[tokio::test]
    async fn test_tool_that_writes_nothing_is_reported() {
        let temp = TempDir::new().unwrap();
        let (job, _) = encode_job(&temp, false);

        let mut mock = MockToolInvoker::new();
        mock.expect_invoke().times(1).returning(|_| {
            Ok(ToolOutput {
                success: true,
                status: Some(0),
                output: String::new(),
            })
        });
        let converter = Converter::new(tools(temp.path()), Arc::new(mock));
        let (tx, rx) = progress_channel();

        let outcome = converter.run(&job, &tx).await;
        drop(tx);
        let events = rx.collect().await;

        assert!(matches!(outcome, JobOutcome::Failed { step: 1, .. }));
        assert!(events[0].error.contains("did not produce"));
    }

    #[tokio::test]
    async fn test_unstartable_tool_fails_step() {
        let temp = TempDir::new().unwrap();
        let (job, _) = encode_job(&temp, false);

        let mut mock = MockToolInvoker::new();
        mock.expect_invoke().times(1).returning(|cmd| {
            Err(PssError::ToolInvocation {
                tool: cmd.tool.name().to_string(),
                reason: "failed to start".to_string(),
                output: String::new(),
            })
        });
        let converter = Converter::new(tools(temp.path()), Arc::new(mock));
        let (tx, rx) = progress_channel();

        converter.submit(job, tx).await.unwrap();
        let events = rx.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].error, "FFMPEG failed: failed to start");
    }

    #[tokio::test]
    async fn test_concurrent_jobs_keep_their_own_order() {
        let temp = TempDir::new().unwrap();
        let converter = Converter::new(tools(temp.path()), Arc::new(ScriptedInvoker::default()));
        let (tx, rx) = progress_channel();

        let mut ids = Vec::new();
        let mut handles = Vec::new();
        for name in ["a", "b"] {
            let dir = temp.child(name);
            dir.create_dir_all().unwrap();
            let job = ConversionJob::encode(
                temp.path().join("clip.mov"),
                dir.path().join("out.pss"),
                SETTINGS,
                false,
            )
            .unwrap();
            ids.push(job.id());
            handles.push(converter.submit(job, tx.clone()));
        }
        drop(tx);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), JobOutcome::Completed);
        }
        let events = rx.collect().await;
        for id in ids {
            let steps: Vec<i32> = events
                .iter()
                .filter(|e| e.job_id == id)
                .map(|e| e.step)
                .collect();
            assert_eq!(steps, vec![1, 2, 3, 4, 5, 6, 7]);
        }
    }
}
