//! Length-prefixed wire framing.
//!
//! Every transmitted unit is a fixed-width big-endian `u32` length header
//! followed by that many payload bytes. Receiving fewer bytes than the
//! declared length is "not yet a message": [`read_frame`] keeps awaiting
//! until the frame completes, and several frames arriving in one read are
//! simply consumed one after another by repeated calls.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::NetError;

/// Width of the length header, in bytes.
pub const LEN_PREFIX_BYTES: usize = 4;

/// Hard limit on a single frame's payload.
///
/// Well above the block size limit, so every legitimate message fits; a
/// declared length beyond this is a protocol violation.
pub const MAX_FRAME_BYTES: usize = 2 * 1024 * 1024;

/// Encodes a payload as a single frame (header + bytes).
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(LEN_PREFIX_BYTES + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Reads exactly one frame, reassembling across partial reads.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LEN_PREFIX_BYTES];
    reader.read_exact(&mut header).await?;

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(NetError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Writes one payload as a frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_BYTES {
        return Err(NetError::FrameTooLarge(payload.len()));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
