//! ps2str project (`.mux`) files describing which streams go into a PSS.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::error::{PssError, Result};

/// Render a project muxing one video and one ADS audio stream.
pub fn render_project(video: &Path, audio: &Path) -> String {
    format!(
        "pss\n\n\tstream video:0\n\t\tinput \"{}\"\n\tend\n\n\tstream pcm:0\n\t\tinput \"{}\"\n\tend\nend\n",
        to_slash(video),
        to_slash(audio)
    )
}

/// Absolute form of `path` when it can be resolved, otherwise the path as given.
pub fn absolute_or_given(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Path text with forward slashes regardless of host convention.
pub fn to_slash(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

pub async fn write_project(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)
        .await
        .map_err(|e| PssError::filesystem(path, e))?;

    info!("Wrote project file {}", path.display());
    Ok(())
}
