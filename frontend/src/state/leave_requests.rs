//! Scoped leave-requests state shared by every page under one layout.
//!
//! A [`LeaveRequestsScope`] is created when the layout mounts and torn down
//! when it unmounts. Descendants receive a [`LeaveRequestsContext`] and all
//! observe and mutate the same collection. The scope owns a private
//! [`RequestCache`], so two activations never share state and nothing
//! outlives the subtree.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::watch;

use crate::{
    api::{
        ApiClient, ApiError, CreateLeaveRequest, LeaveRequest, LeaveRequestId, LeaveStatus,
        LEAVE_REQUESTS_PATH,
    },
    state::cache::{CacheKey, CachePolicy, RequestCache, Snapshot, UseResource},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeavePhase {
    Uninitialized,
    Loading,
    Ready,
    Refreshing,
    Error,
    Unmounted,
}

impl LeavePhase {
    fn from_snapshot(snapshot: &Snapshot<Vec<LeaveRequest>>) -> Self {
        match (snapshot.is_loading, &snapshot.data, &snapshot.error) {
            (true, Some(_), _) => LeavePhase::Refreshing,
            (true, None, _) => LeavePhase::Loading,
            (false, _, Some(_)) => LeavePhase::Error,
            (false, Some(_), None) => LeavePhase::Ready,
            (false, None, None) => LeavePhase::Uninitialized,
        }
    }
}

struct ScopeInner {
    client: ApiClient,
    cache: RequestCache,
    requests: UseResource<Vec<LeaveRequest>>,
    mounted: AtomicBool,
}

impl ScopeInner {
    fn ensure_mounted(&self) -> Result<(), ApiError> {
        if self.mounted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::Cancelled)
        }
    }
}

/// Owner handle held by the layout. Dropping it unmounts the scope.
pub struct LeaveRequestsScope {
    inner: Arc<ScopeInner>,
}

impl LeaveRequestsScope {
    pub fn new(client: ApiClient) -> Self {
        let cache = RequestCache::default();
        let fetch_client = client.clone();
        let requests = cache.register(
            CacheKey::new(LEAVE_REQUESTS_PATH),
            CachePolicy::default(),
            move || {
                let client = fetch_client.clone();
                async move { client.list_leave_requests().await }
            },
        );
        Self {
            inner: Arc::new(ScopeInner {
                client,
                cache,
                requests,
                mounted: AtomicBool::new(true),
            }),
        }
    }

    /// Creates the scope and starts the first load without waiting for it.
    pub fn mount(client: ApiClient) -> Self {
        let scope = Self::new(client);
        scope.context().activate();
        scope
    }

    pub fn context(&self) -> LeaveRequestsContext {
        LeaveRequestsContext {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Releases the subscription. Responses still in flight are ignored.
    pub fn unmount(&self) {
        if self.inner.mounted.swap(false, Ordering::SeqCst) {
            tracing::debug!("Leave requests scope unmounted");
            self.inner.cache.close();
        }
    }
}

impl Drop for LeaveRequestsScope {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Handle given to descendants of the layout.
#[derive(Clone)]
pub struct LeaveRequestsContext {
    inner: Arc<ScopeInner>,
}

impl LeaveRequestsContext {
    pub fn phase(&self) -> LeavePhase {
        if !self.inner.mounted.load(Ordering::SeqCst) {
            return LeavePhase::Unmounted;
        }
        LeavePhase::from_snapshot(&self.inner.requests.snapshot())
    }

    pub fn requests(&self) -> Arc<Vec<LeaveRequest>> {
        self.inner.requests.items()
    }

    pub fn find(&self, id: LeaveRequestId) -> Option<LeaveRequest> {
        self.requests().iter().find(|request| request.id == id).cloned()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.inner.requests.error()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<Vec<LeaveRequest>>> {
        self.inner.requests.subscribe()
    }

    /// Starts loading if nothing has been fetched yet.
    pub fn activate(&self) {
        if self.phase() == LeavePhase::Uninitialized {
            self.inner.requests.load();
        }
    }

    /// Waits for the current load and returns the resulting phase.
    pub async fn load(&self) -> LeavePhase {
        self.activate();
        self.inner.requests.settle().await;
        self.phase()
    }

    /// Forces a reload; also the retry path out of `LeavePhase::Error`.
    pub async fn refresh(&self) -> Result<Arc<Vec<LeaveRequest>>, ApiError> {
        self.inner.ensure_mounted()?;
        self.inner.requests.revalidate().await
    }

    pub async fn approve(
        &self,
        id: LeaveRequestId,
        comment: Option<String>,
    ) -> Result<LeaveRequest, ApiError> {
        let client = self.inner.client.clone();
        self.transition(id, LeaveStatus::Approved, async move {
            client.approve_leave_request(id, comment).await
        })
        .await
    }

    pub async fn reject(
        &self,
        id: LeaveRequestId,
        comment: Option<String>,
    ) -> Result<LeaveRequest, ApiError> {
        let client = self.inner.client.clone();
        self.transition(id, LeaveStatus::Rejected, async move {
            client.reject_leave_request(id, comment).await
        })
        .await
    }

    pub async fn cancel(&self, id: LeaveRequestId) -> Result<LeaveRequest, ApiError> {
        let client = self.inner.client.clone();
        self.transition(id, LeaveStatus::Cancelled, async move {
            client.cancel_leave_request(id).await
        })
        .await
    }

    /// New requests have no id until the server assigns one, so they are added
    /// only after it confirms.
    pub async fn create(&self, payload: CreateLeaveRequest) -> Result<LeaveRequest, ApiError> {
        self.inner.ensure_mounted()?;
        let created = self.inner.client.create_leave_request(&payload).await?;
        if self.inner.ensure_mounted().is_ok() {
            let added = created.clone();
            self.inner.requests.replace_with(|current| {
                let mut requests = current.cloned().unwrap_or_default();
                requests.push(added);
                requests
            });
        }
        Ok(created)
    }

    async fn transition<Fut>(
        &self,
        id: LeaveRequestId,
        status: LeaveStatus,
        call: Fut,
    ) -> Result<LeaveRequest, ApiError>
    where
        Fut: Future<Output = Result<LeaveRequest, ApiError>>,
    {
        self.inner.ensure_mounted()?;
        // an optimistic write needs the loaded list as its base
        if self.inner.requests.data().is_none() {
            self.load().await;
            self.inner.ensure_mounted()?;
            if self.inner.requests.data().is_none() {
                return Err(self.error().unwrap_or(ApiError::Cancelled));
            }
        }

        let prior = self.find(id).map(|request| request.status);
        let write = self
            .inner
            .requests
            .mutate_optimistic(|current| with_status(current, id, status));

        match call.await {
            Ok(updated) => {
                let confirmed = updated.clone();
                let applied = self
                    .inner
                    .requests
                    .confirm(write, |requests| replace_request(requests.clone(), confirmed));
                if !applied {
                    // another write landed on top; fold the server record into it
                    let confirmed = updated.clone();
                    self.inner
                        .requests
                        .patch(|requests| replace_request(requests.clone(), confirmed));
                }
                Ok(updated)
            }
            Err(err) => {
                let restored = self.inner.requests.rollback(write)
                    || prior.is_some_and(|prior| {
                        self.inner
                            .requests
                            .patch(|requests| revert_status(requests, id, status, prior))
                    });
                tracing::warn!(
                    leave_request_id = id,
                    ?status,
                    error = %err,
                    restored,
                    "Leave request update rejected; rolled back"
                );
                Err(err)
            }
        }
    }
}

fn with_status(
    current: Option<&Vec<LeaveRequest>>,
    id: LeaveRequestId,
    status: LeaveStatus,
) -> Vec<LeaveRequest> {
    let mut requests = current.cloned().unwrap_or_default();
    if let Some(request) = requests.iter_mut().find(|request| request.id == id) {
        request.status = status;
    }
    requests
}

/// Puts `prior` back on `id` unless a later write already moved it elsewhere.
fn revert_status(
    requests: &[LeaveRequest],
    id: LeaveRequestId,
    attempted: LeaveStatus,
    prior: LeaveStatus,
) -> Vec<LeaveRequest> {
    let mut requests = requests.to_vec();
    if let Some(request) = requests
        .iter_mut()
        .find(|request| request.id == id && request.status == attempted)
    {
        request.status = prior;
    }
    requests
}

fn replace_request(mut requests: Vec<LeaveRequest>, updated: LeaveRequest) -> Vec<LeaveRequest> {
    match requests.iter_mut().find(|request| request.id == updated.id) {
        Some(slot) => *slot = updated,
        None => requests.push(updated),
    }
    requests
}
