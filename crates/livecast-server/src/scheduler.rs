use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use livecast_gateway::Dispatcher;
use livecast_source::GraphClient;
use livecast_store::CommentStore;

/// Cadence of the two background loops.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub startup_delay: Duration,
    pub refresh_interval: Duration,
    pub display_interval: Duration,
    pub sample_size: usize,
}

/// Handles for the refresh and display loops.
pub struct Scheduler {
    pub refresh: JoinHandle<()>,
    pub display: JoinHandle<()>,
}

impl Scheduler {
    /// Wait for both loops to exit after the token is cancelled.
    /// Returns how many of them ended by panicking or being aborted.
    pub async fn join(self) -> usize {
        let mut failed = 0;
        if let Err(e) = self.refresh.await {
            warn!("Refresh loop ended abnormally: {}", e);
            failed += 1;
        }
        if let Err(e) = self.display.await {
            warn!("Display loop ended abnormally: {}", e);
            failed += 1;
        }
        failed
    }
}

/// Start both loops. Each waits `startup_delay`, then ticks immediately
/// and on its own interval until `cancel` fires.
pub fn spawn(
    schedule: Schedule,
    client: GraphClient,
    store: CommentStore,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) -> Scheduler {
    let refresh = tokio::spawn(run_refresh_loop(
        client,
        store.clone(),
        schedule.startup_delay,
        schedule.refresh_interval,
        cancel.clone(),
    ));
    let display = tokio::spawn(run_display_loop(
        store,
        dispatcher,
        schedule.sample_size,
        schedule.startup_delay,
        schedule.display_interval,
        cancel,
    ));
    Scheduler { refresh, display }
}

/// Refresh the store from the comment source on an interval.
pub async fn run_refresh_loop(
    client: GraphClient,
    store: CommentStore,
    startup_delay: Duration,
    every: Duration,
    cancel: CancellationToken,
) {
    let Some(mut interval) = start_interval(startup_delay, every, &cancel).await else {
        return;
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        // An in-flight fetch finishes on its own; the client timeout bounds it.
        let outcome = client.refresh(&store).await;
        debug!("Refresh outcome: {:?}", outcome);
    }

    info!("Refresh loop stopped");
}

/// Push a fresh sample of the store to viewers on an interval.
pub async fn run_display_loop(
    store: CommentStore,
    dispatcher: Dispatcher,
    sample_size: usize,
    startup_delay: Duration,
    every: Duration,
    cancel: CancellationToken,
) {
    let Some(mut interval) = start_interval(startup_delay, every, &cancel).await else {
        return;
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        display_tick(&store, &dispatcher, sample_size);
    }

    info!("Display loop stopped");
}

/// Draw one sample and push it. Returns the number of comments pushed.
pub fn display_tick(store: &CommentStore, dispatcher: &Dispatcher, sample_size: usize) -> usize {
    let sample = store.sample(sample_size);
    let reached = dispatcher.push(&sample);
    if reached > 0 {
        info!("Sent {} shuffled comments to {} viewers", sample.len(), reached);
    }
    sample.len()
}

async fn start_interval(
    startup_delay: Duration,
    every: Duration,
    cancel: &CancellationToken,
) -> Option<tokio::time::Interval> {
    tokio::select! {
        _ = cancel.cancelled() => return None,
        _ = tokio::time::sleep(startup_delay) => {}
    }

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}
