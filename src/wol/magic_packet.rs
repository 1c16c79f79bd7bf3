//! Wake-on-LAN magic packets.
//!
//! A magic packet is six `0xFF` bytes followed by the target MAC address
//! repeated sixteen times, 102 bytes in total, sent as one UDP datagram.
use std::{
    fmt, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::net::UdpSocket;

/// Total size of a magic packet in bytes
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// Default destination: limited broadcast, discard port.
pub const DEFAULT_WAKE_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), 9);

#[derive(Debug, thiserror::Error)]
pub enum WakeError {
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("failed to send magic packet: {0}")]
    Io(#[from] io::Error),

    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },
}

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = WakeError;

    /// Accepts `00:11:22:33:44:55`, `00-11-22-33-44-55` and `0011.2233.4455`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WakeError::InvalidMac(s.to_string());

        let groups: Vec<&str> = if s.contains(':') {
            s.split(':').collect()
        } else if s.contains('-') {
            s.split('-').collect()
        } else if s.contains('.') {
            let dotted: Vec<&str> = s.split('.').collect();
            if dotted.len() != 3 || dotted.iter().any(|g| g.len() != 4 || !g.is_ascii()) {
                return Err(invalid());
            }
            dotted
                .into_iter()
                .flat_map(|g| [&g[..2], &g[2..]])
                .collect()
        } else {
            return Err(invalid());
        };

        if groups.len() != 6 {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (octet, group) in octets.iter_mut().zip(&groups) {
            if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// The payload that wakes one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicPacket(Bytes);

impl MagicPacket {
    pub fn new(mac: MacAddress) -> Self {
        let mut buf = BytesMut::with_capacity(MAGIC_PACKET_LEN);
        buf.put_bytes(0xFF, 6);
        for _ in 0..16 {
            buf.put_slice(&mac.0);
        }
        Self(buf.freeze())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Somewhere a magic packet can be delivered.
#[async_trait]
pub trait WakeTransport: Send + Sync {
    async fn send(&self, packet: &MagicPacket) -> Result<(), WakeError>;
}

/// Sends magic packets as UDP broadcasts.
#[derive(Debug, Clone)]
pub struct UdpBroadcast {
    target: SocketAddr,
}

impl UdpBroadcast {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Default for UdpBroadcast {
    fn default() -> Self {
        Self::new(DEFAULT_WAKE_ADDR)
    }
}

#[async_trait]
impl WakeTransport for UdpBroadcast {
    async fn send(&self, packet: &MagicPacket) -> Result<(), WakeError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;

        let sent = socket.send_to(packet.as_bytes(), self.target).await?;
        if sent != packet.as_bytes().len() {
            return Err(WakeError::ShortWrite {
                sent,
                expected: packet.as_bytes().len(),
            });
        }
        Ok(())
    }
}

/// Parse `mac` and send its magic packet through `transport`.
pub async fn wake(transport: &dyn WakeTransport, mac: &str) -> Result<MacAddress, WakeError> {
    let mac: MacAddress = mac.trim().parse()?;
    transport.send(&MagicPacket::new(mac)).await?;
    tracing::info!(%mac, "Magic packet sent");
    Ok(mac)
}
