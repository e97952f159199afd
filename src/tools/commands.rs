use std::path::{Path, PathBuf};

use crate::config::ToolPaths;
use crate::job::EncodeSettings;

/// Which bundled program a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ps2str,
    Vgmstream,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ffmpeg => "FFMPEG",
            Self::Ps2str => "PS2STR",
            Self::Vgmstream => "vgmstream-cli",
        }
    }
}

/// A fully specified external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub tool: Tool,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub description: String,
    /// Files the program must leave behind when it exits successfully
    pub produces: Vec<PathBuf>,
}

impl ToolCommand {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(tool: Tool, program: P, description: S) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
            description: description.into(),
            produces: Vec::new(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn path<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().into_owned())
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").path(path)
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Record an artifact the program is expected to write
    pub fn producing<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.produces.push(path.into());
        self
    }

    /// Shell-like rendering for logs
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Builders for every external invocation the pipelines make. Argument
/// shapes are fixed; ps2str and the PS2 runtime depend on them.
#[derive(Debug, Clone)]
pub struct ToolCommands {
    paths: ToolPaths,
}

impl ToolCommands {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    /// MPEG-2 video elementary stream plus 48 kHz stereo PCM in one ffmpeg pass.
    pub fn encode_elementary_streams(
        &self,
        input: &Path,
        video: &Path,
        audio: &Path,
        settings: &EncodeSettings,
    ) -> ToolCommand {
        let bitrate = format!("{}k", settings.bitrate);

        ToolCommand::new(Tool::Ffmpeg, &self.paths.ffmpeg, "Generate M2V and WAV")
            .input(input)
            .video_codec("mpeg2video")
            .args(["-profile:v", "4", "-level:v", "8"])
            .arg("-b:v")
            .arg(bitrate.as_str())
            .args(["-bufsize", "1835k"])
            .arg("-maxrate")
            .arg(bitrate.as_str())
            .arg("-minrate")
            .arg(bitrate.as_str())
            .args(["-color_range", "tv"])
            .args(["-colorspace", "smpte170m"])
            .args(["-color_trc", "smpte170m"])
            .args(["-color_primaries", "smpte170m"])
            .args(["-field_order", "progressive"])
            .arg("-s")
            .arg(format!("{}x{}", settings.width, settings.height))
            .arg("-an")
            .overwrite()
            .path(video)
            .arg("-vn")
            .args(["-acodec", "pcm_s16le", "-ar", "48000", "-ac", "2"])
            .overwrite()
            .path(audio)
            .producing(video)
            .producing(audio)
    }

    /// PCM to ADS. ps2str names the result after the WAV inside `output_dir`.
    pub fn encode_ads(&self, output_dir: &Path, wav: &Path, ads: &Path) -> ToolCommand {
        ToolCommand::new(Tool::Ps2str, &self.paths.ps2str, "Encode ADS audio")
            .args(["e", "-o", "-v", "-d"])
            .path(output_dir)
            .path(wav)
            .producing(ads)
    }

    pub fn multiplex_pss(&self, output_dir: &Path, project: &Path, pss: &Path) -> ToolCommand {
        ToolCommand::new(Tool::Ps2str, &self.paths.ps2str, "Multiplex PSS")
            .args(["m", "-o", "-v", "-d"])
            .path(output_dir)
            .path(project)
            .producing(pss)
    }

    pub fn demultiplex_pss(
        &self,
        input: &Path,
        input_dir: &Path,
        video: &Path,
        ads: &Path,
    ) -> ToolCommand {
        ToolCommand::new(Tool::Ps2str, &self.paths.ps2str, "Demultiplex PSS")
            .args(["d", "-o", "-v", "-d"])
            .path(input_dir)
            .path(input)
            .producing(video)
            .producing(ads)
    }

    pub fn decode_ads(&self, ads: &Path, wav: &Path) -> ToolCommand {
        ToolCommand::new(Tool::Vgmstream, &self.paths.vgmstream, "Decode ADS audio")
            .arg("-o")
            .path(wav)
            .path(ads)
            .producing(wav)
    }

    /// Copy the video stream, re-encode the audio to AAC.
    pub fn mux_container(&self, video: &Path, wav: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(Tool::Ffmpeg, &self.paths.ffmpeg, "Multiplex MP4")
            .input(video)
            .input(wav)
            .video_codec("copy")
            .audio_codec("aac")
            .args(["-b:a", "192k"])
            .overwrite()
            .path(output)
            .producing(output)
    }
}
