//! Transport abstraction over the physical station link.
//!
//! The supervisor only ever sees a [`Transport`] that can open a byte-stream
//! link to a [`DeviceDescriptor`]. The standard implementation speaks TCP for
//! real hardware bridges and hands out an in-process simulator link for
//! development without hardware.

use core::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::simulator;

/// Identifies a station endpoint a transport can open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DeviceDescriptor {
    /// A network-bridged station at the given socket address.
    Tcp {
        /// Address of the serial-to-TCP bridge.
        addr: SocketAddr,
    },
    /// The built-in in-process simulator.
    Simulator,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceDescriptor::Tcp { addr } => write!(f, "tcp://{addr}"),
            DeviceDescriptor::Simulator => write!(f, "simulator"),
        }
    }
}

/// A bidirectional byte stream to a station.
pub trait TransportLink: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug> TransportLink for T {}

/// Owned, type-erased station link.
pub type BoxedLink = Box<dyn TransportLink>;

/// Opens links to station devices.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a fresh link to the device.
    async fn open(&self, device: &DeviceDescriptor) -> Result<BoxedLink>;
}

/// The production transport: TCP for bridged hardware, plus the simulator.
#[derive(Debug, Default)]
pub struct StandardTransport;

impl StandardTransport {
    /// Create the standard transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for StandardTransport {
    async fn open(&self, device: &DeviceDescriptor) -> Result<BoxedLink> {
        match device {
            DeviceDescriptor::Tcp { addr } => {
                debug!(%addr, "opening tcp link");
                let stream = TcpStream::connect(addr).await.map_err(|err| {
                    Error::connection_failed(device.clone(), err.to_string())
                })?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
            DeviceDescriptor::Simulator => {
                debug!("opening simulator link");
                Ok(simulator::spawn_link())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_display() {
        let tcp = DeviceDescriptor::Tcp {
            addr: "127.0.0.1:9000".parse().unwrap(),
        };
        assert_eq!(tcp.to_string(), "tcp://127.0.0.1:9000");
        assert_eq!(DeviceDescriptor::Simulator.to_string(), "simulator");
    }

    #[test]
    fn descriptor_serde_round_trip() {
        let tcp = DeviceDescriptor::Tcp {
            addr: "10.0.0.5:2000".parse().unwrap(),
        };
        let json = serde_json::to_string(&tcp).unwrap();
        assert!(json.contains(r#""kind":"tcp""#));
        let back: DeviceDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tcp);
    }

    #[tokio::test]
    async fn tcp_connect_failure_is_connection_failed() {
        let transport = StandardTransport::new();
        // Port 1 on localhost is essentially never listening.
        let device = DeviceDescriptor::Tcp {
            addr: "127.0.0.1:1".parse().unwrap(),
        };
        let err = transport.open(&device).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed { .. }));
    }
}
