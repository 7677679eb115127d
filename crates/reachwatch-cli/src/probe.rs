// Startup reachability probes available from the command line
use reachwatch_core::ReachabilityProbe;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Answers from a flag instead of looking at the network
pub struct FixedProbe(pub bool);

impl ReachabilityProbe for FixedProbe {
    fn probe(&self) -> anyhow::Result<bool> {
        Ok(self.0)
    }
}

/// Online means a TCP connection to `address` succeeds within `timeout`
///
/// Blocks the caller, but only runs once at startup.
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

impl ReachabilityProbe for TcpProbe {
    fn probe(&self) -> anyhow::Result<bool> {
        // Failing to resolve is a broken probe, not an offline network
        let addr = self
            .address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow::anyhow!("{} did not resolve to any address", self.address))?;

        match TcpStream::connect_timeout(&addr, self.timeout) {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!("probe connect to {} failed: {}", addr, e);
                Ok(false)
            }
        }
    }
}
