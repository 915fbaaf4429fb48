//! Length-prefixed framing codec for agent connections.
//!
//! Wire format: `[u32 BE length][JSON body]`. The length is the byte count
//! of the JSON body only (not including the 4-byte header).

use serde::{Serialize, de::DeserializeOwned};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Maximum frame size: 16 MiB.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Errors that can occur during frame read/write.
#[derive(Debug)]
pub enum FrameError {
    /// Underlying I/O error.
    Io(io::Error),
    /// Frame exceeds the maximum allowed size.
    TooLarge { size: u32 },
    /// Fewer bytes than the header or the declared length.
    Truncated { expected: usize, actual: usize },
    /// JSON serialization/deserialization error.
    Json(serde_json::Error),
    /// The connection was closed before a frame started.
    ConnectionClosed,
}

impl FrameError {
    /// True for malformed frames, false for transport failures.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::TooLarge { .. } | Self::Truncated { .. } | Self::Json(_)
        )
    }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::TooLarge { size } => {
                write!(f, "frame too large: {size} bytes (max {MAX_FRAME_SIZE})")
            }
            Self::Truncated { expected, actual } => {
                write!(f, "truncated frame: expected {expected} bytes, got {actual}")
            }
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Encode a typed message into a complete frame (header and body).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, FrameError> {
    let body = serde_json::to_vec(msg)?;
    let len = frame_len(body.len())?;
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode one frame from the start of `bytes`.
///
/// Bytes beyond the declared length are ignored.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FrameError> {
    let Some((header, rest)) = bytes.split_first_chunk::<HEADER_LEN>() else {
        return Err(FrameError::Truncated {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    };
    let len = check_len(u32::from_be_bytes(*header))?;
    let Some(body) = rest.get(..len) else {
        return Err(FrameError::Truncated {
            expected: len,
            actual: rest.len(),
        });
    };
    Ok(serde_json::from_slice(body)?)
}

/// Write a typed message as a length-prefixed JSON frame.
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = serde_json::to_vec(msg)?;
    let len = frame_len(data.len())?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a length-prefixed JSON frame and deserialize into a typed message.
///
/// Blocks until the whole frame is available or the stream ends.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; HEADER_LEN];
    match read_full(reader, &mut len_buf).await? {
        0 => return Err(FrameError::ConnectionClosed),
        HEADER_LEN => {}
        actual => {
            return Err(FrameError::Truncated {
                expected: HEADER_LEN,
                actual,
            });
        }
    }

    let len = check_len(u32::from_be_bytes(len_buf))?;
    let mut buf = vec![0u8; len];
    let actual = read_full(reader, &mut buf).await?;
    if actual < len {
        return Err(FrameError::Truncated {
            expected: len,
            actual,
        });
    }
    let msg = serde_json::from_slice(&buf)?;
    Ok(msg)
}

/// Fill `buf` unless the stream ends first; returns the bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn frame_len(body_len: usize) -> Result<u32, FrameError> {
    match u32::try_from(body_len) {
        Ok(len) if len <= MAX_FRAME_SIZE => Ok(len),
        _ => Err(FrameError::TooLarge {
            size: u32::try_from(body_len).unwrap_or(u32::MAX),
        }),
    }
}

fn check_len(len: u32) -> Result<usize, FrameError> {
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { size: len });
    }
    Ok(len as usize)
}
