//! Host liveness probing: one ICMP ping, then TCP connects to common ports.
use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    process::Stdio,
    time::Duration,
};

use serde::{Serialize, Serializer};
use tokio::{net::TcpStream, process::Command, time::timeout};

/// Echo, SSH, HTTP, HTTPS, RDP, SMB, NetBIOS
pub const DEFAULT_PROBE_PORTS: [u16; 7] = [7, 22, 80, 443, 3389, 445, 139];

/// How a host was found to be online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Ping,
    Port(u16),
    None,
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMethod::Ping => f.write_str("ping"),
            ProbeMethod::Port(port) => write!(f, "port {port}"),
            ProbeMethod::None => f.write_str("none"),
        }
    }
}

impl Serialize for ProbeMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Liveness {
    pub online: bool,
    pub method: ProbeMethod,
}

#[derive(Debug, Clone)]
pub struct LivenessChecker {
    ports: Vec<u16>,
    connect_timeout: Duration,
    ping: bool,
}

impl Default for LivenessChecker {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PROBE_PORTS.to_vec(),
            connect_timeout: Duration::from_secs(2),
            ping: true,
        }
    }
}

impl LivenessChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.ports = ports.into();
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Skip the ICMP probe, e.g. where `ping` is unavailable.
    pub fn without_ping(mut self) -> Self {
        self.ping = false;
        self
    }

    /// Probe `host` (a name or an address), stopping at the first success.
    pub async fn check(&self, host: &str) -> Liveness {
        let target = resolve(host).await;

        if self.ping && ping(&target).await {
            return Liveness {
                online: true,
                method: ProbeMethod::Ping,
            };
        }

        let Ok(ip) = target.parse::<IpAddr>() else {
            tracing::debug!(%target, "Not an address, skipping port probes");
            return Liveness {
                online: false,
                method: ProbeMethod::None,
            };
        };

        for &port in &self.ports {
            let addr = SocketAddr::new(ip, port);
            if let Ok(Ok(_stream)) = timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                tracing::debug!(%addr, "Port probe succeeded");
                return Liveness {
                    online: true,
                    method: ProbeMethod::Port(port),
                };
            }
        }

        Liveness {
            online: false,
            method: ProbeMethod::None,
        }
    }
}

/// First address `host` resolves to, or `host` itself when lookup fails.
pub async fn resolve(host: &str) -> String {
    if host.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(mut addrs) => addrs
            .next()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| host.to_string()),
        Err(e) => {
            tracing::debug!(%host, error = %e, "Lookup failed, using literal");
            host.to_string()
        }
    }
}

async fn ping(target: &str) -> bool {
    let mut command = Command::new("ping");
    if cfg!(windows) {
        command.args(["-n", "1", "-w", "1000", target]);
    } else {
        command.args(["-c", "1", "-W", "1", target]);
    }
    command
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match command.output().await {
        Ok(output) if output.status.success() => {
            ping_succeeded(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(_) => false,
        Err(e) => {
            tracing::debug!(error = %e, "Could not run ping");
            false
        }
    }
}

fn ping_succeeded(output: &str) -> bool {
    output.contains("1 received")
        || output.contains("1 packets received")
        || output.contains("bytes from")
}
