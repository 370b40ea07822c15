//! Length-prefixed frame codec.
//!
//! Every wire message is one frame: a 4-byte little-endian length followed
//! by that many payload bytes. Frames are capped at 16 MiB; anything larger
//! indicates a corrupt stream or a hostile peer.

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{RemoteError, Result};

/// Hard cap on a single frame's payload.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Write one frame to the stream.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(RemoteError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    writer.write_u32::<LittleEndian>(payload.len() as u32)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reassembles frames from an arbitrarily-chunked byte stream.
#[derive(Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the socket.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next complete frame, if one has fully arrived.
    ///
    /// An oversized length prefix is unrecoverable for this stream; the
    /// caller should drop the connection.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buf.len() < LEN_PREFIX {
            return Ok(None);
        }
        let len = LittleEndian::read_u32(&self.buf[..LEN_PREFIX]) as usize;
        if len > MAX_FRAME_BYTES {
            return Err(RemoteError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_BYTES,
            });
        }
        if self.buf.len() < LEN_PREFIX + len {
            return Ok(None);
        }
        let frame = self.buf[LEN_PREFIX..LEN_PREFIX + len].to_vec();
        self.buf.drain(..LEN_PREFIX + len);
        Ok(Some(frame))
    }

    /// Bytes buffered but not yet framed.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_survives_chunked_arrival() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"hello").unwrap();
        write_frame(&mut wire, b"world!").unwrap();

        let mut buf = FrameBuffer::new();
        // Feed one byte at a time.
        let mut frames = Vec::new();
        for byte in wire {
            buf.extend(&[byte]);
            while let Some(frame) = buf.next_frame().unwrap() {
                frames.push(frame);
            }
        }
        assert_eq!(frames, vec![b"hello".to_vec(), b"world!".to_vec()]);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn empty_frame_roundtrip() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"").unwrap();
        let mut buf = FrameBuffer::new();
        buf.extend(&wire);
        assert_eq!(buf.next_frame().unwrap(), Some(Vec::new()));
        assert_eq!(buf.next_frame().unwrap(), None);
    }

    #[test]
    fn oversized_length_prefix_is_an_error() {
        let mut buf = FrameBuffer::new();
        buf.extend(&u32::MAX.to_le_bytes());
        assert!(matches!(
            buf.next_frame(),
            Err(RemoteError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn oversized_write_is_rejected() {
        let huge = vec![0u8; MAX_FRAME_BYTES + 1];
        let mut sink = Vec::new();
        assert!(matches!(
            write_frame(&mut sink, &huge),
            Err(RemoteError::FrameTooLarge { .. })
        ));
    }
}
