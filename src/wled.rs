//! WLED lighting controller.
//!
//! Presets are selected over WLED's JSON HTTP API. Live effects are streamed
//! over UDP with the DNRGB realtime protocol.

use crate::config::WledConfig;
use crate::dnrgb;
use crate::effect::Colour;
use crate::error::Result;
use async_trait::async_trait;
use log::{debug, info};
use serde_json::json;
use std::time::Duration;
use tokio::net::UdpSocket;

/// Port WLED listens on for realtime UDP data.
pub const REALTIME_PORT: u16 = 21324;

/// Anything that can show presets and live frames.
#[async_trait]
pub trait LightingController: Send + Sync {
    /// Show a stored preset and leave realtime mode.
    async fn set_preset(&self, preset: u8) -> Result<()>;

    /// Make the controller accept realtime frames again.
    async fn set_live(&self) -> Result<()>;

    /// Open a realtime channel. The sink is owned by the streaming task.
    async fn open_realtime(&self) -> Result<Box<dyn RealtimeSink>>;
}

/// Destination for full-strip frames.
#[async_trait]
pub trait RealtimeSink: Send {
    async fn send_frame(&mut self, colours: &[Colour]) -> Result<()>;
}

pub struct Wled {
    address: String,
    realtime_port: u16,
    wait_time: u32,
    http: reqwest::Client,
}

impl Wled {
    pub fn new(config: &WledConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            address: config.address.clone(),
            realtime_port: config.realtime_port,
            wait_time: config.wait_time,
            http,
        })
    }

    fn state_url(&self) -> String {
        format!("http://{}/json/state", self.address)
    }

    async fn post_state(&self, body: serde_json::Value) -> Result<()> {
        debug!("[WLED] POST {} {}", self.state_url(), body);
        self.http
            .post(self.state_url())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl LightingController for Wled {
    async fn set_preset(&self, preset: u8) -> Result<()> {
        info!("[WLED] Preset {}", preset);
        self.post_state(json!({ "ps": preset, "lor": 1 })).await
    }

    async fn set_live(&self) -> Result<()> {
        info!("[WLED] Live mode");
        self.post_state(json!({ "lor": 0 })).await
    }

    async fn open_realtime(&self) -> Result<Box<dyn RealtimeSink>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket
            .connect((self.address.as_str(), self.realtime_port))
            .await?;
        info!(
            "[WLED] Streaming to {}:{}",
            self.address, self.realtime_port
        );
        Ok(Box::new(UdpRealtime {
            socket,
            wait_time: self.wait_time,
        }))
    }
}

/// DNRGB over a connected UDP socket.
pub struct UdpRealtime {
    socket: UdpSocket,
    wait_time: u32,
}

impl UdpRealtime {
    pub fn new(socket: UdpSocket, wait_time: u32) -> Self {
        Self { socket, wait_time }
    }
}

#[async_trait]
impl RealtimeSink for UdpRealtime {
    async fn send_frame(&mut self, colours: &[Colour]) -> Result<()> {
        for datagram in dnrgb::packets(colours, self.wait_time)? {
            self.socket.send(&datagram).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_realtime_sends_chunks() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(receiver.local_addr().unwrap()).await.unwrap();

        let mut sink = UdpRealtime::new(socket, dnrgb::DEFAULT_WAIT_TIME);
        let colours = vec![Colour::new(1, 2, 3); dnrgb::MAX_PIXELS_PER_PACKET + 2];
        sink.send_frame(&colours).await.unwrap();

        let mut buffer = [0u8; 2048];
        let len = receiver.recv(&mut buffer).await.unwrap();
        assert_eq!(len, 4 + dnrgb::MAX_PIXELS_PER_PACKET * 3);
        assert_eq!(&buffer[..4], &[4, 5, 0, 0]);

        let len = receiver.recv(&mut buffer).await.unwrap();
        assert_eq!(len, 4 + 2 * 3);
        assert_eq!(&buffer[..7], &[4, 5, 0x01, 0xe9, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_bad_wait_time_fails_at_encode() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect("127.0.0.1:9").await.unwrap();
        let mut sink = UdpRealtime::new(socket, 300);
        let err = sink.send_frame(&[Colour::BLACK]).await.unwrap_err();
        assert!(matches!(err, crate::error::HubError::Dnrgb(_)));
    }
}
