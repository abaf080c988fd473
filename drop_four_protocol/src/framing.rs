// Length-delimited framing over a byte stream.
//
// Each frame is a 4-byte big-endian length followed by that many bytes of
// JSON. `write_message`/`read_message` move raw payloads; `send`/`recv` add
// the JSON step for any serde type. Frames above `MAX_MESSAGE_SIZE` are
// refused in both directions: the largest legitimate message is a full game
// snapshot, well under a kilobyte.

use std::io::{Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ProtocolError, Result};

/// Maximum allowed frame payload (64 KiB).
pub const MAX_MESSAGE_SIZE: u32 = 64 * 1024;

/// Write one frame and flush.
pub fn write_message<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_MESSAGE_SIZE)
        .ok_or(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_MESSAGE_SIZE,
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame.
///
/// A stream that closes before or inside a frame yields
/// `ProtocolError::Io` with `UnexpectedEof`.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            len: len as usize,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Serialize `msg` to JSON and write it as one frame.
pub fn send<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg)?;
    write_message(writer, &json)
}

/// Read one frame and decode it as `T`. Framing failures surface as
/// `Io`/`FrameTooLarge`; a frame that is not a valid `T` surfaces as
/// `MalformedPayload`, and the stream is still positioned at the next frame.
pub fn recv<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let bytes = read_message(reader)?;
    Ok(serde_json::from_slice(&bytes)?)
}
