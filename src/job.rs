//! Conversion job description and the intermediate files each job derives.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{PssError, Result};

/// Number of pipeline steps per direction. The completion event uses the next number.
pub const ENCODE_STEPS: usize = 6;
pub const DECODE_STEPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    /// Video bitrate in kbps
    pub bitrate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Container video to PSS
    EncodeToContainer(EncodeSettings),
    /// PSS to container video
    DecodeFromContainer,
}

impl Direction {
    pub fn step_count(&self) -> usize {
        match self {
            Self::EncodeToContainer(_) => ENCODE_STEPS,
            Self::DecodeFromContainer => DECODE_STEPS,
        }
    }
}

/// One requested conversion. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    id: Uuid,
    direction: Direction,
    input: PathBuf,
    output: PathBuf,
    retain_intermediates: bool,
}

impl ConversionJob {
    pub fn encode(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        settings: EncodeSettings,
        retain_intermediates: bool,
    ) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 || settings.bitrate == 0 {
            return Err(PssError::InvalidJob(
                "Resolution and bitrate must be greater than 0".to_string(),
            ));
        }
        Self::build(
            Direction::EncodeToContainer(settings),
            input.into(),
            output.into(),
            retain_intermediates,
        )
    }

    pub fn decode(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        retain_intermediates: bool,
    ) -> Result<Self> {
        Self::build(
            Direction::DecodeFromContainer,
            input.into(),
            output.into(),
            retain_intermediates,
        )
    }

    fn build(
        direction: Direction,
        input: PathBuf,
        output: PathBuf,
        retain_intermediates: bool,
    ) -> Result<Self> {
        if input.as_os_str().is_empty() || output.as_os_str().is_empty() {
            return Err(PssError::InvalidJob(
                "Both input and output paths must be specified".to_string(),
            ));
        }
        if input.file_stem().is_none() {
            return Err(PssError::InvalidJob(format!(
                "Input path has no file name: {}",
                input.display()
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            direction,
            input,
            output,
            retain_intermediates,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn retain_intermediates(&self) -> bool {
        self.retain_intermediates
    }

    pub fn step_count(&self) -> usize {
        self.direction.step_count()
    }
}

/// Files written next to the output while encoding to PSS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeArtifacts {
    pub output_dir: PathBuf,
    pub video: PathBuf,
    pub audio_pcm: PathBuf,
    pub audio_ads: PathBuf,
    pub project: PathBuf,
    /// Name ps2str gives the multiplexed stream
    pub muxed: PathBuf,
}

impl EncodeArtifacts {
    pub fn for_output(output: &Path) -> Self {
        Self {
            output_dir: parent_dir(output),
            video: output.with_extension("m2v"),
            audio_pcm: output.with_extension("wav"),
            audio_ads: output.with_extension("ads"),
            project: output.with_extension("mux"),
            muxed: output.with_extension("pss"),
        }
    }

    /// Everything removed after a successful run.
    pub fn intermediates(&self) -> Vec<PathBuf> {
        vec![
            self.video.clone(),
            self.audio_pcm.clone(),
            self.audio_ads.clone(),
            self.project.clone(),
        ]
    }
}

/// Files ps2str and vgmstream leave next to the input while decoding a PSS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeArtifacts {
    pub input_dir: PathBuf,
    pub video: PathBuf,
    pub audio_ads: PathBuf,
    pub audio_pcm: PathBuf,
}

impl DecodeArtifacts {
    pub fn for_input(input: &Path) -> Self {
        let input_dir = parent_dir(input);
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            video: input_dir.join(format!("{}_video_0.m2v", stem)),
            audio_ads: input_dir.join(format!("{}_pcm_0.ads", stem)),
            audio_pcm: input_dir.join(format!("{}_temp.wav", stem)),
            input_dir,
        }
    }

    pub fn intermediates(&self) -> Vec<PathBuf> {
        vec![
            self.video.clone(),
            self.audio_ads.clone(),
            self.audio_pcm.clone(),
        ]
    }
}

/// Directory containing `path`, `.` for bare file names.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Output path a GUI would suggest for `input`: same location, new extension.
pub fn default_output(input: &Path, direction: &Direction) -> PathBuf {
    match direction {
        Direction::EncodeToContainer(_) => input.with_extension("pss"),
        Direction::DecodeFromContainer => input.with_extension("mp4"),
    }
}
