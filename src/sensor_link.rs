//! UDP intake for gear sensor reports.
//!
//! Every sensor sends fixed 6-byte datagrams: a big-endian `i32` sensor id
//! followed by a big-endian `i16` turn count since its previous report.

use crate::error::{HubError, Result};
use log::{debug, error, info, trace, warn};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Size of one sensor report on the wire.
pub const FRAME_LEN: usize = 6;

/// One decoded sensor report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorEvent {
    pub sensor_id: i32,
    pub delta: i16,
}

/// A datagram that is not a sensor report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("expected 6 bytes, got {0}")]
    WrongLength(usize),
}

/// Decode one datagram.
pub fn decode(datagram: &[u8]) -> std::result::Result<SensorEvent, FrameError> {
    let frame: &[u8; FRAME_LEN] = datagram
        .try_into()
        .map_err(|_| FrameError::WrongLength(datagram.len()))?;

    Ok(SensorEvent {
        sensor_id: i32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]),
        delta: i16::from_be_bytes([frame[4], frame[5]]),
    })
}

/// Encode a report the way a sensor does. Used by tools and tests.
pub fn encode(event: SensorEvent) -> [u8; FRAME_LEN] {
    let mut frame = [0; FRAME_LEN];
    frame[..4].copy_from_slice(&event.sensor_id.to_be_bytes());
    frame[4..].copy_from_slice(&event.delta.to_be_bytes());
    frame
}

/// Owns the sensor socket for its whole lifetime.
pub struct SensorLink {
    socket: UdpSocket,
}

impl SensorLink {
    /// Bind the intake socket. Failing to bind is fatal at startup.
    pub async fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| HubError::SensorBind {
                addr: addr.to_string(),
                source,
            })?;
        info!("[Sensor] Listening on {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive reports forever and forward them to `tx`.
    ///
    /// Malformed datagrams and receive errors are logged and skipped. Returns
    /// when the receiving side of the channel is gone.
    pub async fn run(self, tx: mpsc::Sender<SensorEvent>) {
        // Larger than a frame so oversized datagrams are detected, not truncated.
        let mut buffer = [0u8; 64];

        loop {
            let (len, from) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    error!("[Sensor] Error receiving packet: {}", e);
                    continue;
                }
            };
            trace!("[Sensor] {} bytes from {}: {:02x?}", len, from, &buffer[..len]);

            let event = match decode(&buffer[..len]) {
                Ok(event) => event,
                Err(e) => {
                    warn!("[Sensor] Dropping datagram from {}: {}", from, e);
                    continue;
                }
            };
            debug!("[Sensor] id {} count {}", event.sensor_id, event.delta);

            if tx.send(event).await.is_err() {
                info!("[Sensor] Event channel closed, stopping intake");
                break;
            }
        }
    }
}
