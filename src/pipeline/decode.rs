//! PSS to video container.

use super::{Plan, Step, StepAction};
use crate::job::{ConversionJob, DecodeArtifacts};
use crate::tools::ToolCommands;

pub fn plan(commands: &ToolCommands, job: &ConversionJob) -> Plan {
    let artifacts = DecodeArtifacts::for_input(job.input());

    let steps = vec![
        Step::new(
            "Demultiplexing PSS file with PS2STR",
            "PSS demultiplexed successfully",
            StepAction::Tool(commands.demultiplex_pss(
                job.input(),
                &artifacts.input_dir,
                &artifacts.video,
                &artifacts.audio_ads,
            )),
        ),
        Step::new(
            "Converting audio with vgmstream-cli",
            "Audio converted successfully",
            StepAction::Tool(commands.decode_ads(&artifacts.audio_ads, &artifacts.audio_pcm)),
        ),
        Step::new(
            "Multiplexing MP4 file with FFMPEG",
            "MP4 file created successfully!",
            StepAction::Tool(commands.mux_container(
                &artifacts.video,
                &artifacts.audio_pcm,
                job.output(),
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
