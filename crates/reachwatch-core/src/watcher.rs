// Turns favorable transitions into refresh requests
use crate::models::Trigger;
use crate::scheduler::RefreshScheduler;
use crate::status::StatusHolder;
use tracing::info;

/// Subscribes to both status fields and asks for a refresh whenever
/// either one becomes `true`
pub struct TransitionWatcher;

impl TransitionWatcher {
    /// Register the two subscriptions. Only changes made after this call
    /// can trigger a refresh.
    pub fn attach(status: &mut StatusHolder, scheduler: RefreshScheduler) {
        let on_online = scheduler.clone();
        status.on_online_change(move |online| {
            if *online == Some(true) {
                info!("back online, requesting refresh");
                on_online.request_refresh(Trigger::Connectivity);
            }
        });

        status.on_foreground_change(move |foreground| {
            if *foreground {
                info!("back in foreground, requesting refresh");
                scheduler.request_refresh(Trigger::Lifecycle);
            }
        });
    }
}
