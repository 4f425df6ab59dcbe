//! Message framing.
//!
//! `magic(4 LE) || cmd(1) || size(4 LE) || payload(size)`. No checksum.
//! A wrong magic or an oversize declaration drops the connection; there
//! is nothing to resynchronize on.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::NetError;

/// Bytes before the payload.
pub const FRAME_HEADER_SIZE: usize = 9;

/// Encode a complete frame into a buffer.
pub fn encode_frame(magic: u32, cmd: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    out.extend_from_slice(&magic.to_le_bytes());
    out.push(cmd);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Write one frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    magic: u32,
    cmd: u8,
    payload: &[u8],
) -> Result<(), NetError> {
    writer.write_all(&encode_frame(magic, cmd, payload)).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame, returning `(cmd, payload)`.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    magic: u32,
    max_size: u32,
) -> Result<(u8, Vec<u8>), NetError> {
    let mut head = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut head).await?;

    let got_magic = u32::from_le_bytes(head[0..4].try_into().expect("4 bytes"));
    if got_magic != magic {
        return Err(NetError::Protocol {
            reason: format!("magic 0x{:08x} != 0x{:08x}", got_magic, magic),
        });
    }

    let cmd = head[4];
    let size = u32::from_le_bytes(head[5..9].try_into().expect("4 bytes"));
    if size > max_size {
        return Err(NetError::Format {
            reason: format!("frame size {} exceeds cap {}", size, max_size),
        });
    }

    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload).await?;
    Ok((cmd, payload))
}
