//! Wire format for the single-instance endpoint.
//!
//! One frame per connection: a 4-byte big-endian length prefix followed by
//! exactly that many payload bytes.
//!
//! ```text
//! [u32 BE: len][payload of len bytes]
//!
//! payload := ""                                  ; Empty (idle handshake / goodbye)
//!          | "OPEN_FILES" "\n" path *("\n" path)  ; OpenFiles
//! ```

use crate::config::IpcConfig;
use crate::error::{CloudviewError, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;

/// A request from a starting process to the running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Zero-length payload: nothing to do, just say goodbye.
    Empty,
    /// Open these absolute paths, in order.
    OpenFiles(Vec<PathBuf>),
}

impl Command {
    /// Build the command a starting process forwards for its startup files.
    ///
    /// No files means `Empty`; otherwise every path is made absolute against
    /// `cwd`, keeping the order given on the command line.
    pub fn from_startup_files(files: &[PathBuf], cwd: &Path) -> Self {
        if files.is_empty() {
            Command::Empty
        } else {
            Command::OpenFiles(files.iter().map(|f| cwd.join(f)).collect())
        }
    }

    /// Encode into a frame payload.
    ///
    /// Never fails: a path that is not valid UTF-8 is sent with replacement
    /// characters, and a path containing a newline cannot be framed and is
    /// left out. Both cases are logged.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Empty => Vec::new(),
            Command::OpenFiles(paths) => {
                let mut payload = IpcConfig::OPEN_FILES_MARKER.as_bytes().to_vec();
                for path in paths {
                    let text = path.to_string_lossy();
                    if let Cow::Owned(_) = text {
                        warn!("Path is not valid UTF-8, sending as {:?}", text);
                    }
                    if text.contains('\n') {
                        warn!("Skipping path containing a newline: {:?}", text);
                        continue;
                    }
                    payload.push(b'\n');
                    payload.extend_from_slice(text.as_bytes());
                }
                payload
            }
        }
    }

    /// Decode a frame payload.
    ///
    /// Anything that is neither empty nor led by the `OPEN_FILES` marker is
    /// an `UnrecognizedCommand`.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Ok(Command::Empty);
        }

        let marker = IpcConfig::OPEN_FILES_MARKER.as_bytes();
        let rest = match payload.strip_prefix(marker) {
            Some([]) => return Ok(Command::OpenFiles(Vec::new())),
            Some([b'\n', rest @ ..]) => rest,
            _ => return Err(CloudviewError::unrecognized(payload)),
        };

        let text = std::str::from_utf8(rest).map_err(|_| CloudviewError::Validation {
            field: "ipc_payload".to_string(),
            message: "Invalid UTF-8 in OPEN_FILES payload".to_string(),
        })?;

        Ok(Command::OpenFiles(text.split('\n').map(PathBuf::from).collect()))
    }
}

/// Read a length-prefixed frame from an async reader.
///
/// Blocks until the full payload has arrived, however the bytes are chunked.
/// Returns `None` on clean EOF before a length field (peer closed without
/// sending anything). EOF anywhere inside a frame, including partway through
/// the length field, is an error.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    if reader.read(&mut len_buf[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[1..]).await?;

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > IpcConfig::MAX_FRAME_SIZE {
        return Err(CloudviewError::Validation {
            field: "ipc_frame".to_string(),
            message: format!(
                "IPC message size {} exceeds maximum {}",
                len,
                IpcConfig::MAX_FRAME_SIZE
            ),
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(payload))
}

/// Write a length-prefixed frame to an async writer.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| CloudviewError::Validation {
        field: "ipc_frame".to_string(),
        message: format!("IPC message size {} does not fit a u32", payload.len()),
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
