// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sample loading and caching for an instrument.
//!
//! Every sample is loaded at most once per loader. Concurrent `prepare` calls that overlap on a
//! key share the same in-flight backend load, and a key that fails to load stays failed until
//! it is explicitly invalidated.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::key::SampleKey;
use crate::backend::{Backend, BackendError, SoundId};
use crate::error::Error;

/// Default number of concurrent streams the backend pool is created with.
pub const DEFAULT_MAX_STREAMS: u32 = 6;

/// Upper bound on the concurrent stream count.
pub const MAX_STREAMS_LIMIT: u32 = 12;

/// The observable state of one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleState {
    Unrequested,
    Loading,
    Loaded(SoundId),
    /// Terminal until [`Loader::invalidate`] is called.
    Failed,
}

/// A backend load in progress and the batches waiting on it.
struct PendingLoad {
    waiters: Vec<Arc<LoadBatch>>,
}

enum Slot {
    Loading(PendingLoad),
    Loaded(SoundId),
    Failed,
}

struct Cache {
    slots: HashMap<SampleKey, Slot>,
    released: bool,
}

struct BatchProgress {
    resolved: usize,
    failed: Vec<SampleKey>,
    done: Option<oneshot::Sender<Result<(), Error>>>,
}

/// A set of keys submitted together by one `prepare` call.
struct LoadBatch {
    size: usize,
    progress: Mutex<BatchProgress>,
}

impl LoadBatch {
    fn new(size: usize, done: oneshot::Sender<Result<(), Error>>) -> LoadBatch {
        LoadBatch {
            size,
            progress: Mutex::new(BatchProgress {
                resolved: 0,
                failed: Vec::new(),
                done: Some(done),
            }),
        }
    }

    /// Records the outcome of one key. Completes the batch once every key has resolved.
    fn advance(&self, key: &SampleKey, loaded: bool) {
        let mut progress = self.progress.lock();
        progress.resolved += 1;
        if !loaded {
            progress.failed.push(key.clone());
        }
        if progress.resolved < self.size {
            return;
        }

        let Some(done) = progress.done.take() else {
            return;
        };
        let result = if progress.failed.is_empty() {
            Ok(())
        } else {
            Err(Error::LoadFailed {
                keys: std::mem::take(&mut progress.failed),
            })
        };
        // The caller may have dropped the pending batch; nobody is left to tell.
        let _ = done.send(result);
    }
}

/// Resolves once every key of a `prepare` call has loaded or failed.
#[must_use = "a pending batch does nothing unless awaited"]
pub struct PendingBatch {
    rx: oneshot::Receiver<Result<(), Error>>,
}

impl Future for PendingBatch {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| match result {
            Ok(result) => result,
            // The loader dropped the batch without finishing it.
            Err(_) => Err(Error::Released),
        })
    }
}

/// Manages loading and caching of the samples of one instrument.
pub struct Loader {
    /// Resource name prefix, e.g. `acoustic_grand_piano`.
    instrument: String,
    backend: Arc<dyn Backend>,
    cache: Arc<Mutex<Cache>>,
}

impl Loader {
    /// Creates a loader and allocates the backend pool. `max_streams` is clamped to
    /// `0..=MAX_STREAMS_LIMIT` and defaults to `DEFAULT_MAX_STREAMS`.
    pub fn new(
        instrument: &str,
        backend: Arc<dyn Backend>,
        max_streams: Option<u32>,
    ) -> Result<Loader, Error> {
        if instrument.is_empty()
            || !instrument
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::InvalidInstrument(instrument.to_string()));
        }

        let max_streams = max_streams
            .unwrap_or(DEFAULT_MAX_STREAMS)
            .min(MAX_STREAMS_LIMIT);
        backend.create(max_streams)?;
        info!(instrument, %backend, max_streams, "Created instrument.");

        Ok(Loader {
            instrument: instrument.to_string(),
            backend,
            cache: Arc::new(Mutex::new(Cache {
                slots: HashMap::new(),
                released: false,
            })),
        })
    }

    /// The instrument name this loader resolves resources for.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Makes sure the given samples are loaded. The returned batch resolves with
    /// `Error::LoadFailed` listing every key that could not be loaded.
    ///
    /// Must be called from within a tokio runtime.
    pub fn prepare(&self, keys: &[SampleKey]) -> Result<PendingBatch, Error> {
        if keys.is_empty() {
            return Err(Error::EmptyRequest);
        }

        let (tx, rx) = oneshot::channel();
        let batch = Arc::new(LoadBatch::new(keys.len(), tx));
        let mut to_load = Vec::new();
        {
            let mut cache = self.cache.lock();
            if cache.released {
                return Err(Error::Released);
            }

            for key in keys {
                match cache.slots.get_mut(key) {
                    Some(Slot::Loaded(_)) => batch.advance(key, true),
                    Some(Slot::Failed) => {
                        debug!(instrument = self.instrument, key = %key, "Note previously failed to load.");
                        batch.advance(key, false)
                    }
                    Some(Slot::Loading(pending)) => pending.waiters.push(batch.clone()),
                    None => {
                        cache.slots.insert(
                            key.clone(),
                            Slot::Loading(PendingLoad {
                                waiters: vec![batch.clone()],
                            }),
                        );
                        to_load.push(key.clone());
                    }
                }
            }
        }

        for key in to_load {
            self.spawn_load(key);
        }

        Ok(PendingBatch { rx })
    }

    /// Issues the single backend load for a key that just entered the loading state.
    fn spawn_load(&self, key: SampleKey) {
        let resource = key.resource(&self.instrument);
        let backend = self.backend.clone();
        let cache = self.cache.clone();
        let instrument = self.instrument.clone();

        info!(instrument, resource, "Loading sample.");
        tokio::task::spawn_blocking(move || {
            let result = backend.load(&resource);
            Loader::complete(&cache, &instrument, &key, result);
        });
    }

    fn complete(
        cache: &Mutex<Cache>,
        instrument: &str,
        key: &SampleKey,
        result: Result<SoundId, BackendError>,
    ) {
        let mut cache = cache.lock();
        if cache.released {
            debug!(instrument, key = %key, "Discarding load completed after release.");
            return;
        }

        let pending = match cache.slots.remove(key) {
            Some(Slot::Loading(pending)) => pending,
            Some(other) => {
                warn!(instrument, key = %key, "Load completed for a sample that was not loading.");
                cache.slots.insert(key.clone(), other);
                return;
            }
            None => return,
        };

        let loaded = match result {
            Ok(sound) => {
                debug!(instrument, key = %key, %sound, "Sample loaded.");
                cache.slots.insert(key.clone(), Slot::Loaded(sound));
                true
            }
            Err(e) => {
                error!(instrument, key = %key, "Failed to load sample.");
                debug!(instrument, key = %key, err = %e, "Load failure detail.");
                cache.slots.insert(key.clone(), Slot::Failed);
                false
            }
        };

        for batch in pending.waiters {
            batch.advance(key, loaded);
        }
    }

    /// Returns the current state of a sample.
    pub fn state(&self, key: &SampleKey) -> SampleState {
        match self.cache.lock().slots.get(key) {
            None => SampleState::Unrequested,
            Some(Slot::Loading(_)) => SampleState::Loading,
            Some(Slot::Loaded(sound)) => SampleState::Loaded(*sound),
            Some(Slot::Failed) => SampleState::Failed,
        }
    }

    /// Resolves every key to its sound handle. Returns `None` unless all of them are loaded.
    pub fn resolve(&self, keys: &[SampleKey]) -> Result<Option<Vec<SoundId>>, Error> {
        let cache = self.cache.lock();
        if cache.released {
            return Err(Error::Released);
        }

        Ok(keys
            .iter()
            .map(|key| match cache.slots.get(key) {
                Some(Slot::Loaded(sound)) => Some(*sound),
                _ => None,
            })
            .collect())
    }

    /// Forgets a failed sample so that the next `prepare` retries it. Returns true if the
    /// key was in the failed state.
    pub fn invalidate(&self, key: &SampleKey) -> bool {
        let mut cache = self.cache.lock();
        if matches!(cache.slots.get(key), Some(Slot::Failed)) {
            cache.slots.remove(key);
            info!(instrument = self.instrument, key = %key, "Invalidated failed sample.");
            return true;
        }
        false
    }

    /// Returns true once `release` has been called.
    pub fn is_released(&self) -> bool {
        self.cache.lock().released
    }

    /// Drops every cached sample and tears down the backend pool. Batches still waiting
    /// resolve with `Error::Released`.
    pub fn release(&self) {
        {
            let mut cache = self.cache.lock();
            if cache.released {
                return;
            }
            cache.released = true;
            cache.slots.clear();
        }
        self.backend.release();
        info!(instrument = self.instrument, "Released instrument.");
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("Loader")
            .field("instrument", &self.instrument)
            .field("samples", &cache.slots.len())
            .field("released", &cache.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::mock;

    fn keys(notes: &[&str]) -> Vec<SampleKey> {
        SampleKey::parse_all(notes).unwrap()
    }

    fn loader() -> (Loader, mock::Backend) {
        let backend = mock::Backend::get("mock");
        let loader = Loader::new("piano", Arc::new(backend.clone()), None).unwrap();
        (loader, backend)
    }

    #[test]
    fn test_max_streams_clamped() {
        let backend = mock::Backend::get("mock");
        Loader::new("piano", Arc::new(backend.clone()), None).unwrap();
        assert_eq!(backend.max_streams(), Some(DEFAULT_MAX_STREAMS));

        Loader::new("piano", Arc::new(backend.clone()), Some(64)).unwrap();
        assert_eq!(backend.max_streams(), Some(MAX_STREAMS_LIMIT));

        Loader::new("piano", Arc::new(backend.clone()), Some(0)).unwrap();
        assert_eq!(backend.max_streams(), Some(0));
    }

    #[test]
    fn test_invalid_instrument() {
        let backend = mock::Backend::get("mock");
        assert!(matches!(
            Loader::new("grand piano", Arc::new(backend.clone()), None),
            Err(Error::InvalidInstrument(_))
        ));
        // Nothing is allocated for a rejected instrument.
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_is_idempotent() -> Result<(), Error> {
        let (loader, backend) = loader();

        loader.prepare(&keys(&["C5", "e5"]))?.await?;
        assert_eq!(backend.total_loads(), 2);
        assert!(matches!(
            loader.state(&SampleKey::parse("c5")?),
            SampleState::Loaded(_)
        ));

        loader.prepare(&keys(&["c5", "E5"]))?.await?;
        assert_eq!(backend.total_loads(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_overlapping_prepares_share_load() -> Result<(), Error> {
        let (loader, backend) = loader();
        backend.set_load_delay(Duration::from_millis(50));

        let first = loader.prepare(&keys(&["c5"]))?;
        assert_eq!(loader.state(&SampleKey::parse("c5")?), SampleState::Loading);
        let second = loader.prepare(&keys(&["c5", "g5"]))?;

        first.await?;
        second.await?;
        assert_eq!(backend.load_count("piano_c5"), 1);
        assert_eq!(backend.load_count("piano_g5"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_overlapping_prepares_share_failure() -> Result<(), Error> {
        let (loader, backend) = loader();
        backend.set_load_delay(Duration::from_millis(50));
        backend.set_missing("piano_x9");

        let first = loader.prepare(&keys(&["x9"]))?;
        let second = loader.prepare(&keys(&["c5", "x9"]))?;

        let first = first.await.unwrap_err();
        let second = second.await.unwrap_err();
        assert_eq!(first.failed_keys(), Some(&keys(&["x9"])[..]));
        assert_eq!(second.failed_keys(), Some(&keys(&["x9"])[..]));
        assert_eq!(backend.load_count("piano_x9"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_is_sticky() -> Result<(), Error> {
        let (loader, backend) = loader();
        backend.set_missing("piano_x9");

        let err = loader.prepare(&keys(&["c5", "X9"]))?.await.unwrap_err();
        assert_eq!(err.failed_keys(), Some(&keys(&["x9"])[..]));
        assert_eq!(loader.state(&SampleKey::parse("x9")?), SampleState::Failed);

        // Even once the resource shows up, the key is not retried on its own.
        backend.clear_missing("piano_x9");
        let err = loader.prepare(&keys(&["x9"]))?.await.unwrap_err();
        assert_eq!(err.failed_keys(), Some(&keys(&["x9"])[..]));
        assert_eq!(backend.load_count("piano_x9"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalidate_allows_retry() -> Result<(), Error> {
        let (loader, backend) = loader();
        backend.set_missing("piano_x9");
        let x9 = SampleKey::parse("x9")?;

        assert!(loader.prepare(&[x9.clone()])?.await.is_err());
        backend.clear_missing("piano_x9");

        assert!(loader.invalidate(&x9));
        assert_eq!(loader.state(&x9), SampleState::Unrequested);
        loader.prepare(&[x9.clone()])?.await?;
        assert_eq!(backend.load_count("piano_x9"), 2);

        // Loaded keys are not affected.
        assert!(!loader.invalidate(&x9));
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_keys_in_batch() -> Result<(), Error> {
        let (loader, backend) = loader();
        loader.prepare(&keys(&["c5", "C5", "c5"]))?.await?;
        assert_eq!(backend.load_count("piano_c5"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_prepare_is_rejected() {
        let (loader, backend) = loader();
        assert!(matches!(loader.prepare(&[]), Err(Error::EmptyRequest)));
        assert_eq!(backend.total_loads(), 0);
    }

    #[tokio::test]
    async fn test_release() -> Result<(), Error> {
        let (loader, backend) = loader();
        backend.set_load_delay(Duration::from_millis(50));

        let pending = loader.prepare(&keys(&["c5"]))?;
        loader.release();
        assert!(loader.is_released());
        assert!(matches!(pending.await, Err(Error::Released)));

        assert!(matches!(
            loader.prepare(&keys(&["c5"])),
            Err(Error::Released)
        ));
        assert!(matches!(
            loader.resolve(&keys(&["c5"])),
            Err(Error::Released)
        ));
        assert_eq!(backend.max_streams(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_is_all_or_nothing() -> Result<(), Error> {
        let (loader, _backend) = loader();
        loader.prepare(&keys(&["c5"]))?.await?;

        assert_eq!(loader.resolve(&keys(&["c5"]))?.map(|s| s.len()), Some(1));
        assert_eq!(loader.resolve(&keys(&["c5", "x9"]))?, None);
        Ok(())
    }
}
