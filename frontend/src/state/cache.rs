//! Request-state cache shared by every hook.
//!
//! A [`RequestCache`] maps a [`CacheKey`] to one slot holding
//! `{data, error, is_loading, last_fetched_at}`. Every handle mounted on the
//! same key shares that slot, so concurrent mounts collapse into one network
//! call and observe one loading/error state.
//!
//! Requests for a key carry a monotonically increasing sequence number. A
//! response is applied only if its sequence is newer than the last applied
//! one, which keeps the last-issued request authoritative even when responses
//! arrive out of order. Fetches run as spawned tasks: dropping every handle
//! does not cancel the network call, and a closed cache ignores the result.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::{runtime::Handle, sync::watch};

use crate::{
    api::ApiError,
    config::{Config, DEFAULT_DEDUPE_INTERVAL_MS},
};

pub type FetchResult<T> = Result<Arc<T>, ApiError>;

type SharedFetch<T> = Shared<BoxFuture<'static, FetchResult<T>>>;
type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resource path plus query params. Params are kept sorted so that
/// `?a=1&b=2` and `?b=2&a=1` share one entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self.params.sort();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (index, (name, value)) in self.params.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", separator, name, value)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevalidateEvent {
    Focus,
    Reconnect,
}

/// Per-key revalidation policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub revalidate_on_focus: bool,
    pub revalidate_on_reconnect: bool,
    /// A mount within this window of the last successful fetch reuses the cache.
    pub dedupe_interval: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            revalidate_on_focus: true,
            revalidate_on_reconnect: true,
            dedupe_interval: Duration::from_millis(DEFAULT_DEDUPE_INTERVAL_MS),
        }
    }
}

impl CachePolicy {
    /// Identity rarely changes mid-session, so focus and reconnect never refetch it.
    pub fn identity() -> Self {
        Self {
            revalidate_on_focus: false,
            revalidate_on_reconnect: false,
            ..Self::default()
        }
    }

    pub fn with_dedupe_interval(mut self, dedupe_interval: Duration) -> Self {
        self.dedupe_interval = dedupe_interval;
        self
    }

    pub fn reacts_to(&self, event: RevalidateEvent) -> bool {
        match event {
            RevalidateEvent::Focus => self.revalidate_on_focus,
            RevalidateEvent::Reconnect => self.revalidate_on_reconnect,
        }
    }
}

/// What a subscriber sees for one key.
pub struct Snapshot<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub is_loading: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            last_fetched_at: self.last_fetched_at,
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            last_fetched_at: None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("data", &self.data)
            .field("error", &self.error)
            .field("is_loading", &self.is_loading)
            .field("last_fetched_at", &self.last_fetched_at)
            .finish()
    }
}

/// Token returned by an optimistic write; hand it back to `rollback` or `confirm`.
pub struct OptimisticWrite<T> {
    previous: Option<Arc<T>>,
    written: Arc<T>,
}

impl<T> OptimisticWrite<T> {
    pub fn previous(&self) -> Option<&Arc<T>> {
        self.previous.as_ref()
    }

    pub fn written(&self) -> &Arc<T> {
        &self.written
    }
}

struct InFlight<T> {
    seq: u64,
    future: SharedFetch<T>,
}

struct SlotState<T> {
    data: Option<Arc<T>>,
    error: Option<ApiError>,
    fetched_at: Option<Instant>,
    last_fetched_at: Option<DateTime<Utc>>,
    issued: u64,
    applied: u64,
    in_flight: Option<InFlight<T>>,
    closed: bool,
}

impl<T> SlotState<T> {
    fn is_fresh(&self, dedupe_interval: Duration) -> bool {
        self.data.is_some()
            && self.error.is_none()
            && self
                .fetched_at
                .is_some_and(|at| at.elapsed() < dedupe_interval)
    }

    fn holds(&self, written: &Arc<T>) -> bool {
        self.data
            .as_ref()
            .is_some_and(|data| Arc::ptr_eq(data, written))
    }

    fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.in_flight.is_some(),
            last_fetched_at: self.last_fetched_at,
        }
    }
}

struct Slot<T> {
    key: CacheKey,
    policy: CachePolicy,
    fetcher: Fetcher<T>,
    state: Mutex<SlotState<T>>,
    snapshot: watch::Sender<Snapshot<T>>,
    subscribers: AtomicUsize,
}

impl<T: Send + Sync + 'static> Slot<T> {
    fn new(key: CacheKey, policy: CachePolicy, fetcher: Fetcher<T>, closed: bool) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            key,
            policy,
            fetcher,
            state: Mutex::new(SlotState {
                data: None,
                error: None,
                fetched_at: None,
                last_fetched_at: None,
                issued: 0,
                applied: 0,
                in_flight: None,
                closed,
            }),
            snapshot,
            subscribers: AtomicUsize::new(0),
        }
    }

    fn publish(&self, state: &SlotState<T>) {
        self.snapshot.send_replace(state.snapshot());
    }

    fn in_flight(&self) -> Option<SharedFetch<T>> {
        lock(&self.state)
            .in_flight
            .as_ref()
            .map(|in_flight| in_flight.future.clone())
    }

    /// Joins the in-flight request, or issues a new one unless the cached
    /// value is still fresh. `force` always issues.
    fn start(self: &Arc<Self>, force: bool) -> Option<SharedFetch<T>> {
        let mut state = lock(&self.state);
        if state.closed {
            return None;
        }
        if !force {
            if let Some(in_flight) = &state.in_flight {
                return Some(in_flight.future.clone());
            }
            if state.is_fresh(self.policy.dedupe_interval) {
                return None;
            }
        }

        state.issued += 1;
        let seq = state.issued;
        tracing::debug!(key = %self.key, seq, force, "Issuing request");

        let request = (self.fetcher)();
        let slot = Arc::clone(self);
        let task = async move {
            let result = request.await.map(Arc::new);
            slot.apply(seq, result.clone());
            result
        }
        .boxed();
        let future = self.spawn(seq, task);

        state.in_flight = Some(InFlight {
            seq,
            future: future.clone(),
        });
        self.publish(&state);
        Some(future)
    }

    fn spawn(
        self: &Arc<Self>,
        seq: u64,
        task: BoxFuture<'static, FetchResult<T>>,
    ) -> SharedFetch<T> {
        let Ok(runtime) = Handle::try_current() else {
            return task.shared();
        };
        let handle = runtime.spawn(task);
        let slot = Arc::clone(self);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(
                        key = %slot.key,
                        seq,
                        error = %err,
                        "Fetch task ended abnormally"
                    );
                    slot.apply(seq, Err(ApiError::Cancelled));
                    Err(ApiError::Cancelled)
                }
            }
        }
        .boxed()
        .shared()
    }

    fn apply(&self, seq: u64, result: FetchResult<T>) {
        let mut state = lock(&self.state);
        if state
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.seq == seq)
        {
            state.in_flight = None;
        }
        if state.closed {
            tracing::debug!(key = %self.key, seq, "Dropping response for a closed scope");
            return;
        }
        if seq <= state.applied {
            tracing::debug!(
                key = %self.key,
                seq,
                applied = state.applied,
                "Discarding out-of-order response"
            );
            self.publish(&state);
            return;
        }

        state.applied = seq;
        match result {
            Ok(data) => {
                state.data = Some(data);
                state.error = None;
                state.fetched_at = Some(Instant::now());
                state.last_fetched_at = Some(Utc::now());
            }
            Err(err) => {
                tracing::warn!(
                    key = %self.key,
                    error = %err,
                    stale = state.data.is_some(),
                    "Revalidation failed; keeping last known data"
                );
                state.error = Some(err);
            }
        }
        self.publish(&state);
    }

    fn write_optimistic(&self, update: impl FnOnce(Option<&T>) -> T) -> OptimisticWrite<T> {
        let mut state = lock(&self.state);
        let previous = state.data.clone();
        let written = Arc::new(update(previous.as_deref()));
        if !state.closed {
            state.data = Some(Arc::clone(&written));
            // responses issued before this write describe the old server state,
            // unless nothing has loaded yet and they are the only base there is
            if previous.is_some() {
                state.applied = state.issued;
            }
            self.publish(&state);
        }
        OptimisticWrite { previous, written }
    }

    fn rollback(&self, write: OptimisticWrite<T>) -> bool {
        let mut state = lock(&self.state);
        if state.closed || !state.holds(&write.written) {
            return false;
        }
        state.data = write.previous;
        self.publish(&state);
        true
    }

    fn confirm(&self, write: OptimisticWrite<T>, reconcile: impl FnOnce(&T) -> T) -> bool {
        let mut state = lock(&self.state);
        if state.closed || !state.holds(&write.written) {
            return false;
        }
        state.data = Some(Arc::new(reconcile(&write.written)));
        self.publish(&state);
        true
    }

    fn patch(&self, update: impl FnOnce(&T) -> T) -> bool {
        let mut state = lock(&self.state);
        let Some(current) = state.data.clone() else {
            return false;
        };
        if state.closed {
            return false;
        }
        state.data = Some(Arc::new(update(&current)));
        self.publish(&state);
        true
    }

    fn replace_with(&self, update: impl FnOnce(Option<&T>) -> T) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        let next = update(state.data.as_deref());
        state.data = Some(Arc::new(next));
        state.applied = state.issued;
        self.publish(&state);
    }
}

trait SlotControl: Send + Sync {
    fn key(&self) -> &CacheKey;
    fn on_event(self: Arc<Self>, event: RevalidateEvent);
    fn invalidate(&self);
    fn close(&self);
}

impl<T: Send + Sync + 'static> SlotControl for Slot<T> {
    fn key(&self) -> &CacheKey {
        &self.key
    }

    fn on_event(self: Arc<Self>, event: RevalidateEvent) {
        if self.subscribers.load(Ordering::SeqCst) == 0 || !self.policy.reacts_to(event) {
            return;
        }
        tracing::debug!(key = %self.key, ?event, "Revalidating on event");
        let _ = self.start(false);
    }

    fn invalidate(&self) {
        let mut state = lock(&self.state);
        state.data = None;
        state.error = None;
        state.fetched_at = None;
        state.last_fetched_at = None;
        state.applied = state.issued;
        self.publish(&state);
    }

    fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        state.in_flight = None;
        self.publish(&state);
    }
}

struct Registered {
    slot: Arc<dyn Any + Send + Sync>,
    control: Arc<dyn SlotControl>,
}

struct CacheInner {
    slots: Mutex<HashMap<(CacheKey, TypeId), Registered>>,
    dedupe_interval: Duration,
    closed: AtomicBool,
}

/// Shared request-state cache. Clones share the same entries.
#[derive(Clone)]
pub struct RequestCache {
    inner: Arc<CacheInner>,
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEDUPE_INTERVAL_MS))
    }
}

impl fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("entries", &lock(&self.inner.slots).len())
            .field("dedupe_interval", &self.inner.dedupe_interval)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl RequestCache {
    pub fn new(dedupe_interval: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                slots: Mutex::new(HashMap::new()),
                dedupe_interval,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.dedupe_interval)
    }

    /// Dedupe window the built-in hooks apply to their keys.
    pub fn dedupe_interval(&self) -> Duration {
        self.inner.dedupe_interval
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Subscribes to `key` without triggering a fetch. The first registration
    /// of a key fixes its policy and fetcher.
    pub fn register<T, F, Fut>(
        &self,
        key: CacheKey,
        policy: CachePolicy,
        fetch: F,
    ) -> UseResource<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let id = (key.clone(), TypeId::of::<T>());
        let mut slots = lock(&self.inner.slots);
        if let Some(existing) = slots.get(&id) {
            if let Ok(slot) = Arc::clone(&existing.slot).downcast::<Slot<T>>() {
                return UseResource::attach(slot);
            }
        }

        let fetcher: Fetcher<T> = Arc::new(move || fetch().boxed());
        let slot = Arc::new(Slot::new(key, policy, fetcher, self.is_closed()));
        slots.insert(
            id,
            Registered {
                slot: slot.clone(),
                control: slot.clone(),
            },
        );
        UseResource::attach(slot)
    }

    /// Subscribes to `key` and revalidates it unless a request is already in
    /// flight or the cached value is within the dedupe window.
    pub fn use_resource<T, F, Fut>(
        &self,
        key: CacheKey,
        policy: CachePolicy,
        fetch: F,
    ) -> UseResource<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let resource = self.register(key, policy, fetch);
        resource.load();
        resource
    }

    /// Revalidates every subscribed key whose policy reacts to `event`.
    pub fn dispatch(&self, event: RevalidateEvent) {
        let targets: Vec<Arc<dyn SlotControl>> = lock(&self.inner.slots)
            .values()
            .map(|registered| Arc::clone(&registered.control))
            .collect();
        tracing::debug!(?event, keys = targets.len(), "Dispatching revalidation event");
        for target in targets {
            target.on_event(event);
        }
    }

    /// Drops the cached value for `key`; the next mount refetches.
    pub fn invalidate(&self, key: &CacheKey) {
        let targets: Vec<Arc<dyn SlotControl>> = lock(&self.inner.slots)
            .values()
            .filter(|registered| registered.control.key() == key)
            .map(|registered| Arc::clone(&registered.control))
            .collect();
        for target in targets {
            target.invalidate();
        }
    }

    /// Tears the cache down. Pending responses are ignored and later
    /// registrations stay inert.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let drained: Vec<Registered> = lock(&self.inner.slots)
            .drain()
            .map(|(_, registered)| registered)
            .collect();
        for registered in drained {
            registered.control.close();
        }
    }
}

/// A mounted subscription to one cache key. Dropping the last handle of a key
/// stops event-driven revalidation for it.
pub struct UseResource<T: Send + Sync + 'static> {
    slot: Arc<Slot<T>>,
}

impl<T: Send + Sync + 'static> UseResource<T> {
    fn attach(slot: Arc<Slot<T>>) -> Self {
        slot.subscribers.fetch_add(1, Ordering::SeqCst);
        Self { slot }
    }

    pub fn key(&self) -> &CacheKey {
        &self.slot.key
    }

    pub fn policy(&self) -> CachePolicy {
        self.slot.policy
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.slot.snapshot.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.slot.snapshot.borrow().data.clone()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.slot.snapshot.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.slot.snapshot.borrow().is_loading
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.slot.snapshot.subscribe()
    }

    /// Starts a fetch unless one is already in flight or the cached value is
    /// within the dedupe window.
    pub fn load(&self) {
        let _ = self.slot.start(false);
    }

    /// Waits until no request is in flight for this key.
    pub async fn settle(&self) -> Snapshot<T> {
        while let Some(pending) = self.slot.in_flight() {
            let _ = pending.await;
        }
        self.snapshot()
    }

    /// Discards the cached value's freshness and always issues a new request.
    pub async fn revalidate(&self) -> FetchResult<T> {
        match self.slot.start(true) {
            Some(pending) => pending.await,
            None => Err(ApiError::Cancelled),
        }
    }

    /// Overwrites the cached value before the server confirms it.
    pub fn mutate_optimistic(&self, update: impl FnOnce(Option<&T>) -> T) -> OptimisticWrite<T> {
        self.slot.write_optimistic(update)
    }

    /// Restores the exact value held before `write`, unless newer data
    /// replaced the optimistic value in the meantime.
    pub fn rollback(&self, write: OptimisticWrite<T>) -> bool {
        self.slot.rollback(write)
    }

    /// Replaces the optimistic value with its server-confirmed form.
    pub fn confirm(&self, write: OptimisticWrite<T>, reconcile: impl FnOnce(&T) -> T) -> bool {
        self.slot.confirm(write, reconcile)
    }

    /// Rewrites the value currently held, whichever write produced it. Leaves
    /// request sequencing alone and does nothing while no value is cached.
    pub fn patch(&self, update: impl FnOnce(&T) -> T) -> bool {
        self.slot.patch(update)
    }

    /// Applies a change the server has already accepted.
    pub fn replace_with(&self, update: impl FnOnce(Option<&T>) -> T) {
        self.slot.replace_with(update)
    }
}

impl<T: Send + Sync + 'static> UseResource<Vec<T>> {
    /// The cached list, or an empty one while nothing has loaded.
    pub fn items(&self) -> Arc<Vec<T>> {
        self.data().unwrap_or_default()
    }
}

impl<T: Send + Sync + 'static> Clone for UseResource<T> {
    fn clone(&self) -> Self {
        Self::attach(Arc::clone(&self.slot))
    }
}

impl<T: Send + Sync + 'static> Drop for UseResource<T> {
    fn drop(&mut self) {
        self.slot.subscribers.fetch_sub(1, Ordering::SeqCst);
    }
}
