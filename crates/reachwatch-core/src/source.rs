// Host-side plumbing: the startup probe and the event channel
use crate::models::HostEvent;
use tokio::sync::mpsc;

/// One-shot reachability check run while the tracker is being built
pub trait ReachabilityProbe {
    fn probe(&self) -> anyhow::Result<bool>;
}

impl<F> ReachabilityProbe for F
where
    F: Fn() -> anyhow::Result<bool>,
{
    fn probe(&self) -> anyhow::Result<bool> {
        self()
    }
}

/// For hosts that cannot tell whether the network is up at startup
pub struct NoProbe;

impl ReachabilityProbe for NoProbe {
    fn probe(&self) -> anyhow::Result<bool> {
        anyhow::bail!("no reachability probe available")
    }
}

/// Sending half of the host event channel
#[derive(Clone)]
pub struct SignalSender {
    tx: mpsc::Sender<HostEvent>,
}

impl SignalSender {
    pub fn new(tx: mpsc::Sender<HostEvent>) -> Self {
        Self { tx }
    }

    /// Fails only once the tracker has stopped listening
    pub async fn send(&self, event: HostEvent) -> crate::Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|e| crate::Error::TrackerStopped(e.0.to_string()))
    }

    pub async fn ready(&self) -> crate::Result<()> {
        self.send(HostEvent::Ready).await
    }

    pub async fn online(&self) -> crate::Result<()> {
        self.send(HostEvent::NetworkAvailable).await
    }

    pub async fn offline(&self) -> crate::Result<()> {
        self.send(HostEvent::NetworkUnavailable).await
    }

    pub async fn resume(&self) -> crate::Result<()> {
        self.send(HostEvent::EnteredForeground).await
    }

    pub async fn pause(&self) -> crate::Result<()> {
        self.send(HostEvent::EnteredBackground).await
    }
}
