//! WLED realtime "DNRGB" UDP protocol.
//!
//! Each datagram carries a slice of the strip:
//!
//! ```text
//! +----------+-----------+-------------------+-----------------------+
//! | protocol | wait time | start index (BE)  | R G B, R G B, ...     |
//! |  1 byte  |  1 byte   |      2 bytes      | 3 bytes per pixel     |
//! +----------+-----------+-------------------+-----------------------+
//! ```
//!
//! At most [`MAX_PIXELS_PER_PACKET`] pixels fit in one datagram, so longer
//! strips are split into several datagrams with increasing start indices.

use crate::effect::Colour;
use thiserror::Error;

/// Protocol byte identifying DNRGB.
pub const DNRGB_PROTOCOL: u8 = 4;

/// Largest number of pixels in one datagram.
pub const MAX_PIXELS_PER_PACKET: usize = 489;

/// Seconds WLED waits after the last packet before leaving realtime mode.
pub const DEFAULT_WAIT_TIME: u32 = 5;

/// Header and pixel values that cannot be expressed on the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DnrgbError {
    #[error("wait time must be within 0-255, got {0}")]
    WaitTime(u32),

    #[error("start index must be a 16-bit number, got {0}")]
    StartIndex(usize),
}

pub fn header(wait_time: u32, start_index: usize) -> Result<[u8; 4], DnrgbError> {
    let wait_time = u8::try_from(wait_time).map_err(|_| DnrgbError::WaitTime(wait_time))?;
    let start = u16::try_from(start_index).map_err(|_| DnrgbError::StartIndex(start_index))?;
    let [hi, lo] = start.to_be_bytes();
    Ok([DNRGB_PROTOCOL, wait_time, hi, lo])
}

/// One datagram for `colours`, placed at `start_index` on the strip.
pub fn packet(colours: &[Colour], wait_time: u32, start_index: usize) -> Result<Vec<u8>, DnrgbError> {
    let mut datagram = Vec::with_capacity(4 + colours.len() * 3);
    datagram.extend_from_slice(&header(wait_time, start_index)?);
    for colour in colours {
        datagram.extend_from_slice(&colour.to_bytes());
    }
    Ok(datagram)
}

/// Split a full strip into datagrams.
pub fn packets(colours: &[Colour], wait_time: u32) -> Result<Vec<Vec<u8>>, DnrgbError> {
    colours
        .chunks(MAX_PIXELS_PER_PACKET)
        .enumerate()
        .map(|(i, chunk)| packet(chunk, wait_time, i * MAX_PIXELS_PER_PACKET))
        .collect()
}
