use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadenza_core::config::SchedulerConfig;
use chrono::{Local, NaiveDateTime};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::schedule::{minute_floor, minutes_to_evaluate};
use crate::table::TriggerTable;
use crate::types::{FireContext, StartAction, TriggerAction};

/// Receives trigger fires. Each call runs on its own worker task.
///
/// Handlers report their own failures; nothing they do can unregister a
/// trigger or stop the timer.
#[async_trait]
pub trait TriggerHandler: Send + Sync + 'static {
    async fn on_start(&self, ctx: &FireContext, action: &StartAction);
    async fn on_stop(&self, ctx: &FireContext);
}

/// Minute-resolution timer over a shared [`TriggerTable`].
///
/// Every tick it evaluates each wall-clock minute it has not seen yet and
/// hands matching triggers to a bounded worker pool, so a slow callback never
/// delays the evaluation of others.
pub struct SchedulerRuntime {
    table: Arc<TriggerTable>,
    handler: Arc<dyn TriggerHandler>,
    workers: Arc<Semaphore>,
    config: SchedulerConfig,
    in_flight: JoinSet<()>,
    /// Last minute evaluated.
    cursor: Option<NaiveDateTime>,
}

impl SchedulerRuntime {
    pub fn new(
        table: Arc<TriggerTable>,
        handler: Arc<dyn TriggerHandler>,
        config: SchedulerConfig,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        Self {
            table,
            handler,
            workers,
            config,
            in_flight: JoinSet::new(),
            cursor: None,
        }
    }

    /// Main loop. Evaluates triggers every `tick_ms` until `shutdown` turns
    /// `true` (or its sender goes away), then waits for in-flight callbacks.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            triggers = self.table.len(),
            workers = self.config.worker_pool_size.max(1),
            "scheduler runtime started"
        );

        let mut interval = tokio::time::interval(Duration::from_millis(self.config.tick_ms.max(10)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    self.reap();
                    self.advance(Local::now().naive_local());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(in_flight = self.in_flight.len(), "scheduler runtime shutting down");
        self.drain().await;
        info!("scheduler runtime stopped");
    }

    // --- private helpers ---------------------------------------------------

    /// Evaluate every minute between the cursor and `now`.
    pub(crate) fn advance(&mut self, now: NaiveDateTime) {
        let current = minute_floor(now);
        // The first tick also covers the minute we booted in.
        let cursor = *self
            .cursor
            .get_or_insert_with(|| current - chrono::Duration::minutes(1));

        if current < cursor {
            warn!(%cursor, %now, "wall clock moved backwards; restarting evaluation from now");
            self.cursor = Some(current);
            return;
        }

        let (minutes, skipped) =
            minutes_to_evaluate(cursor, now, self.config.max_catch_up_minutes);
        if skipped > 0 {
            warn!(skipped, "timer stalled; oldest missed minutes not evaluated");
        }
        for at in minutes {
            self.fire_due(at);
            self.cursor = Some(at);
        }
    }

    /// Dispatch every trigger matching `at` to the worker pool.
    pub(crate) fn fire_due(&mut self, at: NaiveDateTime) -> usize {
        let due = self.table.due_at(at);
        let count = due.len();
        for trigger in due {
            let handler = Arc::clone(&self.handler);
            let workers = Arc::clone(&self.workers);
            let table = Arc::clone(&self.table);
            let action = trigger.action;
            let ctx = FireContext {
                key: trigger.key,
                at,
            };
            self.in_flight.spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return;
                };
                // Removed while queued for a worker.
                if !table.exists(&ctx.key) {
                    debug!(key = %ctx.key, "trigger removed before a worker was free; skipped");
                    return;
                }
                info!(key = %ctx.key, at = %ctx.at, "trigger fired");
                match &action {
                    TriggerAction::Start(start) => handler.on_start(&ctx, start).await,
                    TriggerAction::Stop => handler.on_stop(&ctx).await,
                }
            });
        }
        if count > 0 {
            debug!(%at, count, "triggers dispatched");
        }
        count
    }

    fn reap(&mut self) {
        while let Some(outcome) = self.in_flight.try_join_next() {
            log_outcome(outcome);
        }
    }

    /// Wait for in-flight callbacks, aborting whatever is left after
    /// `shutdown_timeout_secs`.
    pub(crate) async fn drain(&mut self) {
        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        let in_flight = &mut self.in_flight;
        let finished = tokio::time::timeout(timeout, async {
            while let Some(outcome) = in_flight.join_next().await {
                log_outcome(outcome);
            }
        })
        .await;

        if finished.is_err() {
            warn!(
                remaining = self.in_flight.len(),
                "in-flight callbacks did not finish in time; aborting"
            );
            self.in_flight.abort_all();
            while self.in_flight.join_next().await.is_some() {}
        }
    }
}

fn log_outcome(outcome: Result<(), JoinError>) {
    match outcome {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!("trigger callback panicked: {e}"),
        Err(e) => debug!("trigger callback cancelled: {e}"),
    }
}
