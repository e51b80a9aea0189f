//! Replays the event log into a read model.

use event_store::EventStore;

use crate::handler::EventHandler;
use crate::repository::ResettableRepository;
use crate::{ProjectionError, Result};

const DEFAULT_BATCH_SIZE: usize = 500;

/// Outcome of a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Events handed to the repository.
    pub events_applied: u64,
    /// Events the repository could not apply and were skipped.
    pub events_skipped: u64,
    /// Sequence of the last event read, or 0 for an empty log.
    pub last_sequence: i64,
}

/// Resets a repository and feeds it every stored event in sequence order.
///
/// This repairs a read model that missed publications. Undecodable events and
/// updates for orders without a creation event are logged and skipped; any
/// other error aborts the rebuild.
pub struct ProjectionRebuilder<S: EventStore> {
    store: S,
    batch_size: usize,
}

impl<S: EventStore> ProjectionRebuilder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets how many events are read per page.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[tracing::instrument(skip(self, repository), fields(handler = repository.name()))]
    pub async fn rebuild<R>(&self, repository: &R) -> Result<RebuildStats>
    where
        R: ResettableRepository + ?Sized,
    {
        repository.reset().await?;

        let mut stats = RebuildStats::default();
        loop {
            let batch = self
                .store
                .get_events_after(stats.last_sequence, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            let last_sequence = last.sequence;

            for event in &batch {
                match repository.handle(event).await {
                    Ok(()) => stats.events_applied += 1,
                    Err(
                        e @ (ProjectionError::Deserialization(_)
                        | ProjectionError::MissingRow { .. }),
                    ) => {
                        tracing::warn!(
                            sequence = event.sequence,
                            event_type = %event.event_type,
                            order_id = %event.aggregate_id,
                            error = %e,
                            "skipping event during rebuild"
                        );
                        metrics::counter!("projection_rebuild_events_skipped").increment(1);
                        stats.events_skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            stats.last_sequence = last_sequence;
            if batch.len() < self.batch_size {
                break;
            }
        }

        tracing::info!(
            events_applied = stats.events_applied,
            events_skipped = stats.events_skipped,
            last_sequence = stats.last_sequence,
            "projection rebuilt"
        );
        Ok(stats)
    }
}
