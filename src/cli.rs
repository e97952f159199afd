use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory containing ffmpeg and bin/ps2str, bin/vgmstream-cli
    #[arg(long, global = true)]
    pub tool_dir: Option<PathBuf>,

    /// Print progress events as JSON lines instead of a progress bar
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a video file to PSS
    Encode {
        /// Input video file (MP4, MKV, AVI, MOV, ...)
        #[arg(short, long)]
        input: PathBuf,

        /// Output PSS file (defaults to the input name with .pss)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Output height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Video bitrate in kbps
        #[arg(short, long)]
        bitrate: Option<u32>,

        /// Keep the .m2v, .wav, .ads and .mux files
        #[arg(short, long)]
        keep: bool,
    },

    /// Convert a PSS file to MP4
    Decode {
        /// Input PSS file
        #[arg(short, long)]
        input: PathBuf,

        /// Output video file (defaults to the input name with .mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the demultiplexed .m2v, .ads and .wav files
        #[arg(short, long)]
        keep: bool,
    },

    /// Check that ffmpeg, ps2str and vgmstream-cli are in place
    Check,

    /// Write the default configuration file
    InitConfig {
        /// Destination path
        #[arg(default_value = "pssmux.toml")]
        path: PathBuf,
    },
}
