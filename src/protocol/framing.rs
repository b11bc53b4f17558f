//! Length-prefixed framing over byte streams
//!
//! Wire format:  [4-byte big-endian length][payload]

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Hard ceiling on a single frame, whatever the configuration says
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Read one length-prefixed frame from a stream
///
/// Not cancel-safe: dropping the future mid-frame leaves the stream
/// desynchronized, so callers must own the stream for the whole read.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, max_len: u32) -> Result<Vec<u8>> {
    let len = reader.read_u32().await?;
    if len > max_len {
        return Err(Error::FrameTooLarge { len, max: max_len });
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;

    Ok(buf)
}

/// Write one length-prefixed frame to a stream and flush it
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
        len: u32::MAX,
        max: MAX_FRAME_SIZE,
    })?;
    if len > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            len,
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;

    Ok(())
}
