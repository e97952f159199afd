//! pssmux - PS2 PSS Conversion Pipelines
//!
//! Converts between ordinary video containers and the PSS streams PS2 games
//! play back, by chaining ffmpeg, ps2str and vgmstream and patching the
//! MPEG-2 video elementary stream in between.

pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod project;
pub mod stream;
pub mod tools;
