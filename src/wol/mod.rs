//! Wake-on-LAN companion service: magic packets, liveness probes and the
//! HTTP API that exposes them.
pub mod api;
pub mod liveness;
pub mod magic_packet;

pub use api::{WolState, router};
pub use liveness::{Liveness, LivenessChecker, ProbeMethod};
pub use magic_packet::{MacAddress, MagicPacket, UdpBroadcast, WakeError, WakeTransport, wake};
