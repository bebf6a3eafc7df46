//! Fixed-period driver of the desktop polling timeline.
//!
//! Runs one [`SyncTickUseCase`] per period. A tick is awaited to completion
//! before the next period is considered, so ticks never overlap; a tick that
//! overruns delays the following one instead of bunching up.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};

use crate::{
    domain::{DesktopEndpoint, TimerLink, Timestamp},
    usecase::{StateReconciler, SyncTickUseCase, TickOutcome},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Handle for changing the scheduler's target from outside its task
#[derive(Clone)]
pub struct SchedulerControl {
    endpoint: Arc<watch::Sender<DesktopEndpoint>>,
}

impl SchedulerControl {
    /// Point the scheduler at another desktop timer.
    ///
    /// The current link is torn down on the next tick and the new endpoint
    /// is used for reconnecting.
    pub fn retarget(&self, endpoint: DesktopEndpoint) {
        tracing::info!("Desktop target changed to {}", endpoint);
        self.endpoint.send_replace(endpoint);
    }

    /// Tear the link down on the next tick and reconnect to the same endpoint.
    pub fn force_reset(&self) {
        self.endpoint.send_modify(|_| {});
    }

    pub fn endpoint(&self) -> DesktopEndpoint {
        self.endpoint.borrow().clone()
    }
}

pub struct SyncScheduler {
    link: Box<dyn TimerLink>,
    reconciler: Arc<StateReconciler>,
    tick: SyncTickUseCase,
    endpoint: watch::Receiver<DesktopEndpoint>,
    period: Duration,
}

impl SyncScheduler {
    pub fn new(
        link: Box<dyn TimerLink>,
        reconciler: Arc<StateReconciler>,
        endpoint: DesktopEndpoint,
        period: Duration,
    ) -> (Self, SchedulerControl) {
        let (sender, receiver) = watch::channel(endpoint);
        let scheduler = Self {
            link,
            tick: SyncTickUseCase::new(reconciler.clone()),
            reconciler,
            endpoint: receiver,
            period,
        };
        let control = SchedulerControl {
            endpoint: Arc::new(sender),
        };
        (scheduler, control)
    }

    /// Run exactly one tick.
    pub async fn tick_once(&mut self) -> TickOutcome {
        let force_reset = self.endpoint.has_changed().unwrap_or(false);
        let endpoint = self.endpoint.borrow_and_update().clone();

        let outcome = self
            .tick
            .execute(self.link.as_mut(), &endpoint, force_reset)
            .await;
        self.reconciler.check_liveness(Timestamp::now()).await;
        outcome
    }

    /// Tick every period until `shutdown` turns true, then close the link.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "Polling desktop timer at {} every {:?}",
            self.endpoint.borrow().clone(),
            self.period
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let outcome = self.tick_once().await;
                    tracing::trace!("Tick finished: {:?}", outcome);
                }
            }
        }

        self.link.close().await;
        self.reconciler.desktop_lost().await;
        tracing::info!("Desktop polling stopped");
    }
}
