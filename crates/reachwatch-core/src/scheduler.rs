// Delayed, fire-and-forget refresh scheduling
use crate::models::{RefreshRequest, Trigger};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// The downstream "go fetch fresh data" action
///
/// The scheduler never looks at the outcome beyond logging it, so an error
/// here goes nowhere. Keep that in mind when plugging in real work.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RefreshAction: Send + Sync {
    async fn refresh(&self) -> anyhow::Result<()>;
}

/// Delivers a `RefreshRequest` to whoever holds the receiver
#[async_trait::async_trait]
impl RefreshAction for mpsc::UnboundedSender<RefreshRequest> {
    async fn refresh(&self) -> anyhow::Result<()> {
        self.send(RefreshRequest)
            .map_err(|_| anyhow::anyhow!("refresh receiver was dropped"))
    }
}

/// Adapts a plain closure into a `RefreshAction`
pub struct FnAction<F>(pub F);

#[async_trait::async_trait]
impl<F> RefreshAction for FnAction<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    async fn refresh(&self) -> anyhow::Result<()> {
        (self.0)()
    }
}

/// What happens when a request arrives while another is still waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshPolicy {
    /// Every request runs on its own timer. Two triggers close together
    /// mean two refreshes.
    #[default]
    Independent,
    /// One outstanding timer per trigger type; a newer request for the
    /// same trigger cancels the older one if it is still waiting and starts
    /// over. A refresh already running is left alone.
    PerTrigger,
}

impl FromStr for RefreshPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(RefreshPolicy::Independent),
            "per-trigger" | "per_trigger" => Ok(RefreshPolicy::PerTrigger),
            other => Err(crate::Error::ConfigError(format!(
                "Unknown refresh policy '{}' (expected independent or per-trigger)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshPolicy::Independent => write!(f, "independent"),
            RefreshPolicy::PerTrigger => write!(f, "per-trigger"),
        }
    }
}

struct Inner {
    action: Arc<dyn RefreshAction>,
    delay: Duration,
    policy: RefreshPolicy,
    runtime: Handle,
    scheduled: AtomicU64,
    pending: AtomicUsize,
    idle: Notify,
    /// Per-trigger timers that are still sleeping, keyed with their request seq
    outstanding: Mutex<HashMap<Trigger, (u64, AbortHandle)>>,
}

impl Inner {
    fn outstanding(&self) -> std::sync::MutexGuard<'_, HashMap<Trigger, (u64, AbortHandle)>> {
        self.outstanding
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Called when a timer wakes. Under `PerTrigger` the timer takes itself out
    /// of the replaceable set, so a later request can no longer abort it.
    /// Returns false when a newer request for the same trigger got there first.
    fn claim(&self, trigger: Trigger, seq: u64) -> bool {
        if self.policy != RefreshPolicy::PerTrigger {
            return true;
        }

        let mut outstanding = self.outstanding();
        match outstanding.get(&trigger) {
            Some((current, _)) if *current == seq => {
                outstanding.remove(&trigger);
                true
            }
            _ => false,
        }
    }
}

/// Decrements the pending count however the task ends: done, aborted or panicked
struct PendingGuard {
    inner: Arc<Inner>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Runs the refresh action once per request, `delay` after the request
///
/// Cheap to clone; clones share the same bookkeeping.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    /// Must be called from inside a tokio runtime; timers are spawned on it.
    pub fn new(
        delay: Duration,
        policy: RefreshPolicy,
        action: Arc<dyn RefreshAction>,
    ) -> crate::Result<Self> {
        let runtime = Handle::try_current().map_err(|_| crate::Error::NoRuntime)?;

        Ok(Self {
            inner: Arc::new(Inner {
                action,
                delay,
                policy,
                runtime,
                scheduled: AtomicU64::new(0),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                outstanding: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.inner.policy
    }

    /// Schedule one run of the refresh action `delay` from now.
    ///
    /// There is no handle to cancel it. Under `Independent` the run always
    /// happens; under `PerTrigger` a later request for the same trigger
    /// replaces it while it is still waiting. A refresh that has started
    /// always finishes.
    pub fn request_refresh(&self, trigger: Trigger) {
        let seq = self.inner.scheduled.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.pending.fetch_add(1, Ordering::SeqCst);

        let guard = PendingGuard {
            inner: Arc::clone(&self.inner),
        };
        let delay = self.inner.delay;
        debug!(%trigger, seq, "refresh scheduled in {:?}", delay);

        let task = async move {
            tokio::time::sleep(delay).await;

            if !guard.inner.claim(trigger, seq) {
                debug!(%trigger, seq, "refresh superseded by a newer request");
                return;
            }

            match guard.inner.action.refresh().await {
                Ok(()) => info!(%trigger, seq, "refresh ran"),
                Err(e) => warn!(%trigger, seq, "refresh failed: {:#}", e),
            }
        };

        match self.inner.policy {
            RefreshPolicy::Independent => {
                self.inner.runtime.spawn(task);
            }
            RefreshPolicy::PerTrigger => {
                // Held across the spawn so the new timer is registered before it can wake
                let mut outstanding = self.inner.outstanding();
                let handle = self.inner.runtime.spawn(task);
                if let Some((_, previous)) =
                    outstanding.insert(trigger, (seq, handle.abort_handle()))
                {
                    // Only timers that have not woken yet are in the map
                    debug!(%trigger, "replacing pending refresh");
                    previous.abort();
                }
            }
        }
    }

    /// Total number of requests accepted so far
    pub fn scheduled(&self) -> u64 {
        self.inner.scheduled.load(Ordering::SeqCst)
    }

    /// Timers that have not finished yet
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Wait until every scheduled refresh has run (or been replaced)
    pub async fn settle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[derive(Default)]
    struct CountingAction {
        fired_at: Mutex<Vec<Instant>>,
        fail: bool,
    }

    impl CountingAction {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.fired_at.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl RefreshAction for CountingAction {
        async fn refresh(&self) -> anyhow::Result<()> {
            self.fired_at.lock().unwrap().push(Instant::now());
            if self.fail {
                anyhow::bail!("backend unreachable");
            }
            Ok(())
        }
    }

    fn scheduler(policy: RefreshPolicy, action: Arc<CountingAction>) -> RefreshScheduler {
        RefreshScheduler::new(Duration::from_millis(500), policy, action).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_after_delay() {
        let action = Arc::new(CountingAction::default());
        let scheduler = scheduler(RefreshPolicy::Independent, Arc::clone(&action));
        let start = Instant::now();

        scheduler.request_refresh(Trigger::Connectivity);
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(action.calls(), 0);

        scheduler.settle().await;
        let fired = action.fired_at.lock().unwrap().clone();
        assert_eq!(fired.len(), 1);
        assert!(fired[0] - start >= Duration::from_millis(500));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.scheduled(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_requests_are_not_coalesced() {
        let action = Arc::new(CountingAction::default());
        let scheduler = scheduler(RefreshPolicy::Independent, Arc::clone(&action));

        scheduler.request_refresh(Trigger::Lifecycle);
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.request_refresh(Trigger::Lifecycle);
        scheduler.request_refresh(Trigger::Connectivity);

        scheduler.settle().await;
        assert_eq!(action.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_trigger_reschedules_same_trigger() {
        let action = Arc::new(CountingAction::default());
        let scheduler = scheduler(RefreshPolicy::PerTrigger, Arc::clone(&action));
        let start = Instant::now();

        scheduler.request_refresh(Trigger::Lifecycle);
        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.request_refresh(Trigger::Lifecycle);
        scheduler.request_refresh(Trigger::Connectivity);

        scheduler.settle().await;
        let fired = action.fired_at.lock().unwrap().clone();
        // One per trigger type, both counted from the latest request
        assert_eq!(fired.len(), 2);
        assert!(fired.iter().all(|t| *t - start >= Duration::from_millis(700)));
        assert_eq!(scheduler.scheduled(), 3);
    }

    /// Takes a second per refresh and records when work started and ended
    #[derive(Default)]
    struct SlowAction {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RefreshAction for SlowAction {
        async fn refresh(&self) -> anyhow::Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_trigger_never_cancels_running_refresh() {
        let action = Arc::new(SlowAction::default());
        let scheduler = RefreshScheduler::new(
            Duration::from_millis(500),
            RefreshPolicy::PerTrigger,
            Arc::clone(&action) as Arc<dyn RefreshAction>,
        )
        .unwrap();

        scheduler.request_refresh(Trigger::Lifecycle);
        // First timer has fired and its refresh is mid-flight
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(action.started.load(Ordering::SeqCst), 1);

        scheduler.request_refresh(Trigger::Lifecycle);
        scheduler.settle().await;

        assert_eq!(action.started.load(Ordering::SeqCst), 2);
        assert_eq!(action.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_swallowed() {
        let action = Arc::new(CountingAction::failing());
        let scheduler = scheduler(RefreshPolicy::Independent, Arc::clone(&action));

        scheduler.request_refresh(Trigger::Connectivity);
        scheduler.settle().await;

        // Still usable after a failed run
        scheduler.request_refresh(Trigger::Lifecycle);
        scheduler.settle().await;
        assert_eq!(action.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_action_is_contained() {
        let action = Arc::new(FnAction(|| -> anyhow::Result<()> { panic!("boom") }));
        let scheduler =
            RefreshScheduler::new(Duration::from_millis(500), RefreshPolicy::Independent, action)
                .unwrap();

        scheduler.request_refresh(Trigger::Lifecycle);
        scheduler.settle().await;
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_action_called_per_request() {
        let mut mock = MockRefreshAction::new();
        mock.expect_refresh().times(2).returning(|| Ok(()));

        let scheduler = RefreshScheduler::new(
            Duration::from_millis(500),
            RefreshPolicy::Independent,
            Arc::new(mock),
        )
        .unwrap();

        scheduler.request_refresh(Trigger::Connectivity);
        scheduler.request_refresh(Trigger::Lifecycle);
        scheduler.settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_action() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler =
            RefreshScheduler::new(Duration::from_millis(500), RefreshPolicy::Independent, Arc::new(tx))
                .unwrap();

        scheduler.request_refresh(Trigger::Connectivity);
        assert_eq!(rx.recv().await, Some(RefreshRequest));
    }

    #[tokio::test]
    async fn test_channel_action_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<RefreshRequest>();
        drop(rx);
        assert!(tx.refresh().await.is_err());
    }

    #[test]
    fn test_requires_runtime() {
        let result = RefreshScheduler::new(
            Duration::from_millis(500),
            RefreshPolicy::Independent,
            Arc::new(CountingAction::default()),
        );
        assert!(matches!(result, Err(crate::Error::NoRuntime)));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("independent".parse::<RefreshPolicy>().unwrap(), RefreshPolicy::Independent);
        assert_eq!("Per-Trigger".parse::<RefreshPolicy>().unwrap(), RefreshPolicy::PerTrigger);
        assert!("coalesce".parse::<RefreshPolicy>().is_err());
    }
}
