//! In-place fixes for MPEG-2 video elementary streams before ps2str muxes them.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::{PssError, Result};

pub const GOP_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xb8];
pub const USER_DATA_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xb2];
pub const SEQUENCE_END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xb7];

pub const ATTRIBUTION: &str =
    "==== Created with pssmux. Powered by FFMPEG, PS2STR, and VGMSTREAM. ====";

/// What the sequence end check did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCodeOutcome {
    AlreadyPresent,
    Appended,
    /// File was under four bytes long, appended without comparing
    ForceAppended,
}

impl EndCodeOutcome {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::AlreadyPresent => "Sequence end code already present",
            Self::Appended => "Sequence end code appended",
            Self::ForceAppended => "File too small, sequence end code force-appended",
        }
    }
}

/// Offset of the first occurrence of `pattern` in `data`.
pub fn find_start_code(data: &[u8], pattern: &[u8; 4]) -> Option<usize> {
    data.windows(pattern.len()).position(|window| window == pattern)
}

/// Build a copy of `data` with a user data block carrying `comment` spliced in
/// right before the first GOP header.
pub fn splice_user_data(data: &[u8], comment: &str) -> Option<Vec<u8>> {
    let insertion_point = find_start_code(data, &GOP_START_CODE)?;

    let mut spliced = Vec::with_capacity(data.len() + USER_DATA_START_CODE.len() + comment.len());
    spliced.extend_from_slice(&data[..insertion_point]);
    spliced.extend_from_slice(&USER_DATA_START_CODE);
    spliced.extend_from_slice(comment.as_bytes());
    spliced.extend_from_slice(&data[insertion_point..]);
    Some(spliced)
}

/// Insert the attribution user data block. Returns the number of bytes added.
pub async fn inject_metadata(path: &Path) -> Result<usize> {
    inject_user_data(path, ATTRIBUTION).await
}

pub async fn inject_user_data(path: &Path, comment: &str) -> Result<usize> {
    let content = fs::read(path)
        .await
        .map_err(|e| PssError::filesystem(path, e))?;

    let spliced = splice_user_data(&content, comment).ok_or_else(|| PssError::MarkerNotFound {
        marker: "GOP start code (000001B8)",
        path: path.to_path_buf(),
    })?;
    let added = spliced.len() - content.len();

    // The stream itself is only ever replaced by rename
    let staged = staging_path(path);
    if let Err(e) = fs::write(&staged, &spliced).await {
        let _ = fs::remove_file(&staged).await;
        return Err(PssError::filesystem(&staged, e));
    }
    fs::rename(&staged, path)
        .await
        .map_err(|e| PssError::filesystem(path, e))?;

    info!("Injected {} byte user data block into {}", added, path.display());
    Ok(added)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Make sure the stream ends with a sequence end code.
pub async fn append_sequence_end_code(path: &Path) -> Result<EndCodeOutcome> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| PssError::filesystem(path, e))?;

    let len = file
        .metadata()
        .await
        .map_err(|e| PssError::filesystem(path, e))?
        .len();

    let outcome = if len < SEQUENCE_END_CODE.len() as u64 {
        EndCodeOutcome::ForceAppended
    } else {
        let mut tail = [0u8; 4];
        file.seek(SeekFrom::End(-(tail.len() as i64)))
            .await
            .map_err(|e| PssError::filesystem(path, e))?;
        file.read_exact(&mut tail)
            .await
            .map_err(|e| PssError::filesystem(path, e))?;

        if tail == SEQUENCE_END_CODE {
            debug!("{} already ends with a sequence end code", path.display());
            return Ok(EndCodeOutcome::AlreadyPresent);
        }
        EndCodeOutcome::Appended
    };

    file.write_all(&SEQUENCE_END_CODE)
        .await
        .map_err(|e| PssError::filesystem(path, e))?;
    file.flush()
        .await
        .map_err(|e| PssError::filesystem(path, e))?;

    info!("{}: {}", path.display(), outcome.describe());
    Ok(outcome)
}
