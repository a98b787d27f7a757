use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use livecast_types::models::NormalizedComment;

/// The current batch. Always replaced as a whole, never edited in place.
pub type Batch = Arc<Vec<NormalizedComment>>;

/// Holds the latest normalized batch and draws display samples from it.
///
/// Writers build the new batch off to the side and swap it in with
/// [`CommentStore::replace`]; readers take a [`Batch`] snapshot. A reader
/// therefore sees either the old or the new batch, never a mix.
#[derive(Clone, Default)]
pub struct CommentStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    batch: RwLock<Batch>,
    last_fetch: RwLock<Option<DateTime<Utc>>>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new batch. Returns the previous one.
    pub fn replace(&self, batch: Vec<NormalizedComment>) -> Batch {
        let next = Arc::new(batch);
        let mut slot = self
            .inner
            .batch
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        debug!("Replacing batch: {} -> {} comments", slot.len(), next.len());
        std::mem::replace(&mut *slot, next)
    }

    /// Cheap handle to the current batch.
    pub fn snapshot(&self) -> Batch {
        self.inner
            .batch
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Record a successful fetch.
    pub fn mark_fetched(&self, at: DateTime<Utc>) {
        *self
            .inner
            .last_fetch
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        *self
            .inner
            .last_fetch
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Draw up to `k` comments in random order using the thread RNG.
    pub fn sample(&self, k: usize) -> Vec<NormalizedComment> {
        self.sample_with(k, &mut rand::rng())
    }

    /// Draw `min(k, len)` distinct comments in uniformly random order.
    ///
    /// Runs a partial Fisher-Yates shuffle over a copy of the snapshot, so
    /// the stored batch is never reordered.
    pub fn sample_with<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Vec<NormalizedComment> {
        let batch = self.snapshot();
        if batch.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut pool: Vec<NormalizedComment> = batch.as_ref().clone();
        let amount = k.min(pool.len());
        let (picked, _) = pool.partial_shuffle(rng, amount);
        picked.to_vec()
    }
}
