use std::collections::HashMap;
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::catalogue::CatalogueIndex;
use crate::domain::SourceKey;
use crate::error::DashError;
use crate::remote::{RemoteClient, resolve_url};
use crate::series::PlotSeries;

#[derive(Debug, Clone, PartialEq)]
pub enum DataState {
    Unknown,
    Pending,
    Ready(Arc<PlotSeries>),
}

/// Fetched series keyed by source. Entries only ever move from pending to ready.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    entries: HashMap<SourceKey, Option<Arc<PlotSeries>>>,
}

impl DataStore {
    pub fn seeded(keys: impl IntoIterator<Item = SourceKey>) -> Self {
        Self {
            entries: keys.into_iter().map(|key| (key, None)).collect(),
        }
    }

    pub fn state(&self, key: &SourceKey) -> DataState {
        match self.entries.get(key) {
            None => DataState::Unknown,
            Some(None) => DataState::Pending,
            Some(Some(series)) => DataState::Ready(Arc::clone(series)),
        }
    }

    pub fn series(&self, key: &SourceKey) -> Option<&Arc<PlotSeries>> {
        self.entries.get(key).and_then(Option::as_ref)
    }

    pub fn is_ready(&self, key: &SourceKey) -> bool {
        self.series(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_some()).count()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SourceKey> {
        self.entries.keys()
    }

    fn populate(&mut self, key: &SourceKey, series: Arc<PlotSeries>) {
        match self.entries.get_mut(key) {
            Some(slot) if slot.is_none() => *slot = Some(series),
            Some(_) => debug!(key = %key, "source already populated; keeping first result"),
            None => warn!(key = %key, "refusing to populate a key outside the catalogue"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Hit,
    Fetched,
    Joined { populated: bool },
    Failed,
    UnknownKey,
}

impl EnsureOutcome {
    pub fn is_populated(self) -> bool {
        matches!(
            self,
            EnsureOutcome::Hit | EnsureOutcome::Fetched | EnsureOutcome::Joined { populated: true }
        )
    }
}

struct PendingFetch {
    result: Mutex<Option<bool>>,
    finished: Condvar,
}

impl PendingFetch {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            finished: Condvar::new(),
        }
    }

    fn wait(&self) -> bool {
        let mut result = lock(&self.result);
        loop {
            if let Some(populated) = *result {
                return populated;
            }
            result = self
                .finished
                .wait(result)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish(&self, populated: bool) {
        *lock(&self.result) = Some(populated);
        self.finished.notify_all();
    }
}

type InFlight = Mutex<HashMap<SourceKey, Arc<PendingFetch>>>;

struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    key: &'a SourceKey,
    pending: Arc<PendingFetch>,
    populated: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.in_flight).remove(self.key);
        self.pending.finish(self.populated);
    }
}

/// Fetch-once cache of source payloads.
///
/// At most one request per key is running at any time; callers that arrive
/// while one is running wait for it instead of issuing their own. A key that
/// has been fetched successfully is never requested again.
pub struct RetrievalCache<C: RemoteClient> {
    client: C,
    repository_base: String,
    locations: HashMap<SourceKey, String>,
    store: RwLock<DataStore>,
    in_flight: InFlight,
}

impl<C: RemoteClient> RetrievalCache<C> {
    pub fn new(client: C, repository_base: impl Into<String>, catalogue: &CatalogueIndex) -> Self {
        Self {
            client,
            repository_base: repository_base.into(),
            locations: catalogue.filename_lookup().clone(),
            store: RwLock::new(catalogue.data_store()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository_base(&self) -> &str {
        &self.repository_base
    }

    pub fn payload_url(&self, key: &SourceKey) -> Option<String> {
        self.locations
            .get(key)
            .map(|filepath| resolve_url(&self.repository_base, filepath))
    }

    pub fn ensure(&self, key: &SourceKey) -> EnsureOutcome {
        let Some(url) = self.payload_url(key) else {
            error!(error = %DashError::UnknownSourceKey(key.to_string()), "cannot fetch source");
            return EnsureOutcome::UnknownKey;
        };
        if read(&self.store).is_ready(key) {
            return EnsureOutcome::Hit;
        }

        let pending = {
            let mut in_flight = lock(&self.in_flight);
            if let Some(running) = in_flight.get(key) {
                Err(Arc::clone(running))
            } else if read(&self.store).is_ready(key) {
                return EnsureOutcome::Hit;
            } else {
                let pending = Arc::new(PendingFetch::new());
                in_flight.insert(key.clone(), Arc::clone(&pending));
                Ok(pending)
            }
        };
        let pending = match pending {
            Ok(pending) => pending,
            Err(running) => {
                debug!(key = %key, "joining in-flight fetch");
                let populated = running.wait();
                return EnsureOutcome::Joined { populated };
            }
        };

        let mut guard = InFlightGuard {
            in_flight: &self.in_flight,
            key,
            pending,
            populated: false,
        };

        info!(key = %key, url = %url, "fetching source payload");
        let start = Instant::now();
        let fetched = self
            .client
            .get_json(&url)
            .and_then(|payload| PlotSeries::from_payload(&payload));
        let latency_ms = start.elapsed().as_millis() as u64;

        match fetched {
            Ok(series) => {
                let points = series.len();
                write(&self.store).populate(key, Arc::new(series));
                guard.populated = true;
                info!(key = %key, points, latency_ms, "source payload cached");
                EnsureOutcome::Fetched
            }
            Err(err) => {
                warn!(
                    key = %key,
                    url = %url,
                    latency_ms,
                    error = %err,
                    "source fetch failed; it will be retried on the next request"
                );
                EnsureOutcome::Failed
            }
        }
    }

    pub fn state(&self, key: &SourceKey) -> DataState {
        read(&self.store).state(key)
    }

    pub fn snapshot(&self) -> DataStore {
        read(&self.store).clone()
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
