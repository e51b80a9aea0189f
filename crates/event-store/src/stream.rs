//! Live subscription to the event log.
//!
//! A poller task follows the store-wide `sequence` and forwards new events
//! through a bounded channel. Delivery is at-most-once and in sequence order;
//! a consumer that needs the history before its subscription should replay
//! it with [`EventStore::get_all_events`] first.

use std::time::Duration;

use futures_core::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{EventEnvelope, Result, store::EventStore};

/// Tuning knobs for the poller.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// How long to wait between polls when the log is idle.
    pub poll_interval: Duration,
    /// Maximum number of events fetched per query.
    pub batch_size: usize,
    /// Capacity of the delivery channel.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            channel_capacity: 256,
        }
    }
}

impl StreamConfig {
    /// Sets the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Receiving half of a running subscription.
///
/// The channel closes once the poller exits, either because shutdown was
/// signalled, the subscription was dropped or the store failed.
pub struct EventSubscription {
    receiver: mpsc::Receiver<EventEnvelope>,
    handle: JoinHandle<()>,
}

impl EventSubscription {
    /// Waits for the next event. `None` means the stream is closed.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }

    /// Converts the subscription into a [`Stream`] of events.
    pub fn into_stream(self) -> impl Stream<Item = EventEnvelope> + Send {
        let Self { receiver, handle } = self;
        futures_util::stream::unfold((receiver, handle), |(mut receiver, handle)| async move {
            let event = receiver.recv().await?;
            Some((event, (receiver, handle)))
        })
    }

    /// Waits for the poller task to finish.
    pub async fn join(self) {
        drop(self.receiver);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "event stream poller panicked");
        }
    }
}

/// Spawns pollers over an [`EventStore`].
pub struct EventStreamPoller;

impl EventStreamPoller {
    /// Subscribes to events appended from now on.
    ///
    /// The starting position is read before this returns, so every event
    /// appended after `subscribe` resolves is delivered exactly once unless
    /// shutdown or a store failure ends the stream first.
    pub async fn subscribe<S>(
        store: S,
        config: StreamConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<EventSubscription>
    where
        S: EventStore + Clone + 'static,
    {
        let start = store.latest_sequence().await?;
        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));

        tracing::info!(start_sequence = start, "event stream subscribed");
        let handle = tokio::spawn(poll(store, config, start, sender, shutdown));

        Ok(EventSubscription { receiver, handle })
    }
}

async fn poll<S: EventStore>(
    store: S,
    config: StreamConfig,
    mut cursor: i64,
    sender: mpsc::Sender<EventEnvelope>,
    mut shutdown: watch::Receiver<bool>,
) {
    let batch_size = config.batch_size.max(1);
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'outer: loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow_and_update() {
            break;
        }

        loop {
            let batch = match store.get_events_after(cursor, batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(error = %e, cursor, "event stream poll failed");
                    break 'outer;
                }
            };
            let drained = batch.len() < batch_size;

            for event in batch {
                let sequence = event.sequence;
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break 'outer,
                    sent = sender.send(event) => {
                        if sent.is_err() {
                            tracing::debug!("event stream receiver dropped");
                            break 'outer;
                        }
                    }
                }
                cursor = sequence;
                metrics::counter!("event_stream_events_delivered").increment(1);
            }

            if drained {
                break;
            }
        }
    }

    tracing::info!(cursor, "event stream closed");
}
