//! Rate-limited submission of documents.
//!
//! [`CrptApi`] admits at most `request_limit` dispatches in any sliding
//! `window`. Callers over quota wait in arrival order instead of failing.
//! Admitted submissions are serialized and sent on a bounded pool of tokio
//! tasks, and each result goes back to the caller that submitted it.

mod admission;
pub(crate) mod internal_event;

use std::{
    collections::{HashMap, HashSet},
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex, OnceLock, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use bon::Builder;
use bytes::Bytes;
use futures::FutureExt;
use http::{Request as HttpRequest, Response as HttpResponse};
use serde::de::DeserializeOwned;
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore, oneshot, watch},
    task::AbortHandle,
    time::{self, Instant},
};
use tower::Service;

use crate::{
    CrptApiConfig, Error as CrateError,
    error::{CrptApiError, Result},
    gateway::{Gateway, reqwest_integration::ReqwestService},
    model::{Document, DocumentRequest, Validate},
};
use admission::Admission;
use internal_event::{
    AbandonReason, ShutdownStarted, SubmissionAbandoned, SubmissionAdmitted, SubmissionFinished,
    SubmissionQueued, SubmissionReleased,
};
pub use internal_event::SubmissionState;

/// Per-call overrides for [`CrptApi::submit_with`].
#[derive(Clone, Copy, Debug, Default, Builder)]
pub struct SubmitOptions {
    /// Overall deadline for this call, admission wait included. Falls back to
    /// [`CrptApiConfig::call_deadline`] when unset.
    pub deadline: Option<Duration>,
}

/// How [`CrptApi::shutdown`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight submission finished within the drain deadline.
    Drained,
    /// The drain deadline passed; this many submissions were aborted.
    Aborted { in_flight: usize },
}

/// Rate-limited client for the document creation endpoint.
///
/// Cloning is cheap and every clone shares the same quota and worker pool.
pub struct CrptApi<S = ReqwestService> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for CrptApi<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    gateway: Gateway<S>,
    admission: Admission,
    workers: Arc<Semaphore>,
    max_workers: usize,
    call_deadline: Option<Duration>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<TaskRegistry>,
    next_id: AtomicU64,
}

impl CrptApi<ReqwestService> {
    /// Client for the production endpoint with default settings.
    pub fn new(window: Duration, request_limit: usize) -> Result<Self> {
        Self::with_config(CrptApiConfig::new(window, request_limit))
    }

    pub fn with_config(config: CrptApiConfig) -> Result<Self> {
        config.validate()?;
        let client = config.reqwest_client()?;
        Self::with_transport(config, ReqwestService::new_with_client(client))
    }
}

impl<S> CrptApi<S>
where
    S: Service<HttpRequest<Bytes>, Response = HttpResponse<Bytes>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<CrateError>,
{
    /// Client that sends through `transport` instead of the default reqwest stack.
    pub fn with_transport(config: CrptApiConfig, transport: S) -> Result<Self> {
        config.validate()?;
        let max_workers = config.max_workers();
        let gateway = Gateway::new(
            transport,
            config.endpoint()?,
            config.user_agent_header()?,
            config.header_provider.clone(),
        );
        let (shutdown, _) = watch::channel(false);

        info!(
            endpoint = %gateway.endpoint(),
            request_limit = config.request_limit,
            window_ms = config.window.as_millis(),
            max_workers,
            "CrptApi initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                gateway,
                admission: Admission::new(config.request_limit, config.window),
                workers: Arc::new(Semaphore::new(max_workers)),
                max_workers,
                call_deadline: config.call_deadline,
                shutdown,
                tasks: Mutex::new(TaskRegistry::default()),
                next_id: AtomicU64::new(0),
            }),
        })
    }

    /// Submits `document` with its detached `signature` and decodes the answer as `R`.
    ///
    /// Waits for quota when the window is full. Invalid documents are
    /// rejected before they are queued and use no quota.
    pub async fn submit<R>(&self, document: Document, signature: impl Into<String>) -> Result<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        self.submit_with(
            DocumentRequest::new(document, signature),
            SubmitOptions::default(),
            std::future::pending(),
        )
        .await
    }

    /// Like [`CrptApi::submit`], with a per-call deadline and a cancellation signal.
    ///
    /// When `cancelled` resolves first the call returns
    /// [`CrptApiError::Cancelled`]. Before admission that frees the caller's
    /// place without using quota. After dispatch the exchange still runs to
    /// completion in the background and its result is discarded.
    pub async fn submit_with<R, C>(
        &self,
        request: DocumentRequest,
        options: SubmitOptions,
        cancelled: C,
    ) -> Result<R>
    where
        R: DeserializeOwned + Send + 'static,
        C: Future<Output = ()>,
    {
        request.validate()?;
        if self.is_shut_down() {
            return Err(CrptApiError::ShutDown);
        }

        let deadline = options.deadline.or(self.inner.call_deadline);
        let submission = Submission::new(&self.inner);
        let work = async {
            match deadline {
                Some(deadline) => match time::timeout(deadline, submission.run(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(CrptApiError::Timeout),
                },
                None => submission.run(request).await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancelled => Err(CrptApiError::Cancelled),
            result = work => result,
        };
        if let Err(error) = &result {
            submission.record_exit(error);
        }
        result
    }

    /// Stops accepting submissions and waits up to `drain` for in-flight ones.
    ///
    /// Callers still waiting for a worker or for quota get
    /// [`CrptApiError::ShutDown`] right away. Submissions still running when
    /// `drain` passes are aborted and their callers get the same error.
    pub async fn shutdown(&self, drain: Duration) -> ShutdownOutcome {
        let inner = &self.inner;
        inner.shutdown.send_replace(true);
        ShutdownStarted {
            in_flight: inner.in_flight(),
            drain,
        }
        .emit();

        let all = inner.max_workers as u32;
        let drained = time::timeout(drain, inner.workers.acquire_many(all)).await;
        inner.workers.close();

        match drained {
            Ok(_) => ShutdownOutcome::Drained,
            Err(_) => {
                // Aborted tasks unregister themselves as they are dropped.
                let handles: Vec<AbortHandle> = inner
                    .tasks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .running
                    .values()
                    .cloned()
                    .collect();
                for handle in &handles {
                    handle.abort();
                }
                warn!(aborted = handles.len(), "Drain deadline passed; aborting in-flight submissions");
                ShutdownOutcome::Aborted {
                    in_flight: handles.len(),
                }
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Dispatches counted against the current window.
    pub fn dispatched_in_window(&self) -> usize {
        self.inner.admission.in_window()
    }

    /// Submissions currently running on the worker pool.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight()
    }
}

impl<S> Inner<S> {
    fn in_flight(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
            .len()
    }

    async fn closed(&self) {
        let mut rx = self.shutdown.subscribe();
        // The sender lives as long as `self`, so this only returns once shut down.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn forget(&self, id: u64) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .forget(id);
    }
}

/// Abort handles of running exchanges, keyed by submission id.
///
/// A task can be dropped before its handle is registered, for instance when
/// it is spawned on a runtime that is shutting down. `finished_early` keeps
/// those ids so the late registration is skipped.
#[derive(Debug, Default)]
struct TaskRegistry {
    running: HashMap<u64, AbortHandle>,
    finished_early: HashSet<u64>,
}

impl TaskRegistry {
    fn register(&mut self, id: u64, handle: AbortHandle) {
        if !self.finished_early.remove(&id) {
            self.running.insert(id, handle);
        }
    }

    fn forget(&mut self, id: u64) {
        if self.running.remove(&id).is_none() {
            self.finished_early.insert(id);
        }
    }
}

/// One caller's trip through the submitter.
///
/// Tracks whether the request got past admission so that a caller leaving
/// early is reported as abandoned, with the reason it was given.
struct Submission<'a, S> {
    inner: &'a Arc<Inner<S>>,
    id: u64,
    dispatched: AtomicBool,
    exit: OnceLock<AbandonReason>,
}

impl<'a, S> Submission<'a, S>
where
    S: Service<HttpRequest<Bytes>, Response = HttpResponse<Bytes>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<CrateError>,
{
    fn new(inner: &'a Arc<Inner<S>>) -> Self {
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        SubmissionQueued { id }.emit();
        Self {
            inner,
            id,
            dispatched: AtomicBool::new(false),
            exit: OnceLock::new(),
        }
    }

    /// Remembers why the caller was answered with `error`. Only read if the
    /// submission never got dispatched; a dropped future counts as cancelled.
    fn record_exit(&self, error: &CrptApiError) {
        let reason = match error {
            CrptApiError::Timeout => AbandonReason::TimedOut,
            CrptApiError::ShutDown => AbandonReason::ShutDown,
            _ => AbandonReason::Cancelled,
        };
        let _ = self.exit.set(reason);
    }

    async fn run<R>(&self, request: DocumentRequest) -> Result<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let inner = self.inner;
        let queued_at = Instant::now();

        // Take a worker before quota: a slot admitted now is dispatched now.
        let permit = tokio::select! {
            permit = Arc::clone(&inner.workers).acquire_owned() => {
                permit.map_err(|_| CrptApiError::ShutDown)?
            }
            _ = inner.closed() => return Err(CrptApiError::ShutDown),
        };
        let admitted_at = tokio::select! {
            at = inner.admission.acquire() => at,
            _ = inner.closed() => return Err(CrptApiError::ShutDown),
        };

        SubmissionAdmitted {
            id: self.id,
            waited: admitted_at.saturating_duration_since(queued_at),
        }
        .emit();

        let receiver = self.dispatch::<R>(request, permit);
        self.dispatched.store(true, Ordering::Release);

        // The worker answers on every path; a closed channel means the runtime is going away.
        receiver.await.map_err(|_| CrptApiError::ShutDown)?
    }

    /// Spawns the exchange. Runs without awaiting, so it cannot be
    /// interrupted between admission and dispatch.
    fn dispatch<R>(
        &self,
        request: DocumentRequest,
        permit: OwnedSemaphorePermit,
    ) -> oneshot::Receiver<Result<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let id = self.id;
        let mut worker = Worker {
            inner: Arc::clone(self.inner),
            id,
            reply: Some(tx),
            outcome: None,
            _permit: permit,
        };

        let handle = tokio::spawn(async move {
            trace!(submission = id, state = SubmissionState::InFlight.as_str(), "Dispatching");
            let exchange = worker.inner.gateway.call::<_, R>(&request);
            let outcome = match AssertUnwindSafe(exchange).catch_unwind().await {
                Ok(result) => result.map_err(CrptApiError::from),
                Err(_) => {
                    error!(submission = id, "Exchange panicked");
                    Err(CrptApiError::WorkerPanicked)
                }
            };
            worker.outcome = Some(outcome);
        });
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(id, handle.abort_handle());
        rx
    }
}

/// State owned by a spawned exchange.
///
/// Its drop, on every path including abort, unregisters the task, releases
/// the worker permit and answers the caller.
struct Worker<S, R> {
    inner: Arc<Inner<S>>,
    id: u64,
    reply: Option<oneshot::Sender<Result<R>>>,
    outcome: Option<Result<R>>,
    _permit: OwnedSemaphorePermit,
}

impl<S, R> Drop for Worker<S, R> {
    fn drop(&mut self) {
        self.inner.forget(self.id);
        SubmissionReleased { id: self.id }.emit();
        if let Some(reply) = self.reply.take() {
            // No outcome means the task was aborted, which only `shutdown` does.
            let outcome = self.outcome.take().unwrap_or_else(|| Err(CrptApiError::ShutDown));
            reply_to_caller(self.id, reply, outcome);
        }
    }
}

fn reply_to_caller<R>(id: u64, reply: oneshot::Sender<Result<R>>, outcome: Result<R>) {
    SubmissionFinished {
        id,
        state: if outcome.is_ok() {
            SubmissionState::Completed
        } else {
            SubmissionState::Failed
        },
        error: outcome.as_ref().err().map(ToString::to_string),
    }
    .emit();

    if reply.send(outcome).is_err() {
        debug!(submission = id, "Caller went away; response discarded");
    }
}

impl<S> Drop for Submission<'_, S> {
    fn drop(&mut self) {
        if !self.dispatched.load(Ordering::Acquire) {
            SubmissionAbandoned {
                id: self.id,
                reason: self.exit.get().copied().unwrap_or(AbandonReason::Cancelled),
            }
            .emit();
        }
    }
}

impl<S> fmt::Debug for CrptApi<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrptApi")
            .field("gateway", &self.inner.gateway)
            .field("max_workers", &self.inner.max_workers)
            .field("call_deadline", &self.inner.call_deadline)
            .field("shut_down", &*self.inner.shutdown.borrow())
            .finish()
    }
}
