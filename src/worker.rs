// File: worker.rs
// Location: /src/worker.rs
//
// Owns the single background encoder thread. Requests go out over a channel
// tagged with an id; a dispatcher task routes each response back to the
// caller waiting on that id.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::EncodeError;
use crate::matrix::ModuleMatrix;
use crate::protocol::{WorkerRequest, WorkerResponse};
use crate::qr::MatrixEncoder;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const ENCODE_TIMEOUT: Duration = Duration::from_secs(5);

const WORKER_THREAD_NAME: &str = "qr-encoder-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Absent,
    Starting,
    Ready,
    Terminated,
}

type Reply = Result<WorkerResponse, EncodeError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fail_pending(pending: &PendingMap, error: EncodeError) {
    let drained: Vec<_> = lock(pending).drain().collect();
    for (_, tx) in drained {
        let _ = tx.send(Err(error.clone()));
    }
}

/// Removes the pending slot when the waiting caller goes away early.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

/// A live background worker. Obtained from [`WorkerManager::get_or_create_worker`].
pub struct WorkerHandle {
    id: Uuid,
    requests: Mutex<Option<mpsc::UnboundedSender<WorkerRequest>>>,
    pending: PendingMap,
    next_id: AtomicU64,
    alive: Arc<AtomicBool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    encode_timeout: Duration,
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl WorkerHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WorkerState {
        if self.is_alive() {
            WorkerState::Ready
        } else {
            WorkerState::Terminated
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    async fn request(
        &self,
        build: impl FnOnce(u64) -> WorkerRequest,
        timeout: Duration,
    ) -> Result<WorkerResponse, EncodeError> {
        if !self.is_alive() {
            return Err(EncodeError::Terminated);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let sent = match lock(&self.requests).as_ref() {
            Some(requests) => requests.send(build(id)).is_ok(),
            None => return Err(EncodeError::Terminated),
        };
        if !sent {
            return Err(EncodeError::Disconnected);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(EncodeError::Disconnected),
            Err(_) => {
                warn!("Worker {} did not answer request {} within {:?}", self.id, id, timeout);
                Err(EncodeError::Timeout(timeout))
            }
        }
    }

    /// Liveness probe; resolves once the matching `pong` arrives.
    pub async fn ping(&self, timeout: Duration) -> Result<(), EncodeError> {
        match self.request(|id| WorkerRequest::Ping { id }, timeout).await? {
            WorkerResponse::Pong { .. } => Ok(()),
            other => Err(EncodeError::Worker(format!("unexpected reply to ping: {:?}", other))),
        }
    }

    pub async fn encode(&self, text: &str) -> Result<ModuleMatrix, EncodeError> {
        let text = text.to_string();
        let response = self
            .request(|id| WorkerRequest::Encode { id, text }, self.encode_timeout)
            .await?;

        match response {
            WorkerResponse::Encoded { matrix, .. } => Ok(matrix),
            WorkerResponse::EncodeError { reason, .. } => Err(EncodeError::Worker(reason)),
            WorkerResponse::Pong { id } => Err(EncodeError::Worker(format!(
                "unexpected pong for encode request {}",
                id
            ))),
        }
    }

    /// Stops the worker thread and fails every request still waiting.
    fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);
        // dropping the sender lets the worker thread leave its receive loop
        lock(&self.requests).take();
        if let Some(dispatcher) = lock(&self.dispatcher).take() {
            dispatcher.abort();
        }
        fail_pending(&self.pending, EncodeError::Terminated);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    encoder: Arc<dyn MatrixEncoder>,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
) {
    while let Some(request) = requests.blocking_recv() {
        let response = match request {
            WorkerRequest::Ping { id } => WorkerResponse::Pong { id },
            WorkerRequest::Encode { id, text } => match encoder.encode(&text) {
                Ok(matrix) => WorkerResponse::Encoded { id, matrix },
                Err(reason) => WorkerResponse::EncodeError { id, reason },
            },
        };
        if responses.send(response).is_err() {
            break;
        }
    }
}

async fn dispatch_responses(
    worker_id: Uuid,
    mut responses: mpsc::UnboundedReceiver<WorkerResponse>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
) {
    while let Some(response) = responses.recv().await {
        let id = response.id();
        let waiter = lock(&pending).remove(&id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(Ok(response));
            }
            None => debug!("Dropping response {} from worker {}: nobody is waiting", id, worker_id),
        }
    }

    // The worker thread is gone, most likely after a panic in the encoder.
    if alive.swap(false, Ordering::AcqRel) {
        warn!("Worker {} exited unexpectedly", worker_id);
    }
    fail_pending(&pending, EncodeError::Disconnected);
}

/// Clears the starting flag when creation finishes or its future is dropped.
struct StartingGuard<'a>(&'a AtomicBool);

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Creates, reuses and tears down the one background worker.
pub struct WorkerManager {
    gate: TokioMutex<()>,
    slot: Mutex<Option<Arc<WorkerHandle>>>,
    starting: AtomicBool,
    spawned: AtomicUsize,
    probe_timeout: Duration,
    encode_timeout: Duration,
}

impl Default for WorkerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerManager {
    pub fn new() -> Self {
        Self::with_timeouts(PROBE_TIMEOUT, ENCODE_TIMEOUT)
    }

    pub fn with_timeouts(probe_timeout: Duration, encode_timeout: Duration) -> Self {
        Self {
            gate: TokioMutex::new(()),
            slot: Mutex::new(None),
            starting: AtomicBool::new(false),
            spawned: AtomicUsize::new(0),
            probe_timeout,
            encode_timeout,
        }
    }

    pub fn state(&self) -> WorkerState {
        if self.starting.load(Ordering::Acquire) {
            return WorkerState::Starting;
        }
        match lock(&self.slot).as_ref() {
            Some(handle) if handle.is_alive() => WorkerState::Ready,
            _ => WorkerState::Absent,
        }
    }

    pub fn workers_spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    pub async fn current(&self) -> Option<Arc<WorkerHandle>> {
        lock(&self.slot).clone()
    }

    /// Returns the running worker or starts one. Creation is serialized, so
    /// concurrent first callers all end up with the same handle.
    pub async fn get_or_create_worker(
        &self,
        encoder: Arc<dyn MatrixEncoder>,
    ) -> Result<Arc<WorkerHandle>, EncodeError> {
        let _gate = self.gate.lock().await;

        {
            let mut slot = lock(&self.slot);
            if let Some(handle) = slot.as_ref() {
                if handle.is_alive() {
                    return Ok(handle.clone());
                }
                warn!("Discarding dead worker {}", handle.id());
                handle.shutdown();
                *slot = None;
            }
        }

        self.starting.store(true, Ordering::Release);
        let _starting = StartingGuard(&self.starting);
        match self.spawn_worker(encoder).await {
            Ok(handle) => {
                info!("Worker {} ready", handle.id());
                *lock(&self.slot) = Some(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                warn!("Failed to start worker: {}", e);
                Err(e)
            }
        }
    }

    async fn spawn_worker(
        &self,
        encoder: Arc<dyn MatrixEncoder>,
    ) -> Result<Arc<WorkerHandle>, EncodeError> {
        let worker_id = Uuid::new_v4();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        debug!("Starting worker {}", worker_id);
        std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(encoder, request_rx, response_tx))
            .map_err(|e| EncodeError::Spawn(e.to_string()))?;
        self.spawned.fetch_add(1, Ordering::Relaxed);

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let dispatcher = tokio::spawn(dispatch_responses(
            worker_id,
            response_rx,
            pending.clone(),
            alive.clone(),
        ));

        let handle = Arc::new(WorkerHandle {
            id: worker_id,
            requests: Mutex::new(Some(request_tx)),
            pending,
            next_id: AtomicU64::new(1),
            alive,
            dispatcher: Mutex::new(Some(dispatcher)),
            encode_timeout: self.encode_timeout,
        });

        if let Err(e) = handle.ping(self.probe_timeout).await {
            handle.shutdown();
            return Err(e);
        }

        Ok(handle)
    }

    /// Forgets `handle` so the next call starts a fresh worker. Requests
    /// already running on it keep their own timeouts; the thread stops once
    /// the last clone of the handle is dropped.
    pub async fn discard(&self, handle: &Arc<WorkerHandle>) {
        let _gate = self.gate.lock().await;
        let mut slot = lock(&self.slot);
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, handle)) {
            info!("Discarding worker {} after failure", handle.id());
            *slot = None;
        }
    }

    /// Tears the worker down. Requests in flight fail with `Terminated`.
    pub async fn terminate(&self) {
        let _gate = self.gate.lock().await;
        let current = lock(&self.slot).take();
        match current {
            Some(handle) => {
                info!("Terminating worker {}", handle.id());
                handle.shutdown();
            }
            None => debug!("No worker to terminate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qr::QrCodeEncoder;
    use std::future::Future;

    struct SlowEncoder(Duration);

    impl MatrixEncoder for SlowEncoder {
        fn encode(&self, _text: &str) -> Result<ModuleMatrix, String> {
            std::thread::sleep(self.0);
            Ok(ModuleMatrix::new(21))
        }
    }

    struct RejectingEncoder;

    impl MatrixEncoder for RejectingEncoder {
        fn encode(&self, text: &str) -> Result<ModuleMatrix, String> {
            Err(format!("cannot encode {}", text))
        }
    }

    struct PanickingEncoder;

    impl MatrixEncoder for PanickingEncoder {
        fn encode(&self, _text: &str) -> Result<ModuleMatrix, String> {
            panic!("encoder crashed");
        }
    }

    /// Width of the returned matrix depends on the text length.
    struct LengthEncoder(AtomicUsize);

    impl MatrixEncoder for LengthEncoder {
        fn encode(&self, text: &str) -> Result<ModuleMatrix, String> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(ModuleMatrix::new(text.len()))
        }
    }

    fn quick_manager() -> WorkerManager {
        WorkerManager::with_timeouts(Duration::from_millis(500), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_worker_responds_to_ping() {
        let manager = WorkerManager::new();
        let handle = manager.get_or_create_worker(Arc::new(QrCodeEncoder)).await.unwrap();
        assert!(handle.ping(PROBE_TIMEOUT).await.is_ok());
        assert_eq!(manager.state(), WorkerState::Ready);
        manager.terminate().await;
    }

    #[tokio::test]
    async fn test_encode_real_text() {
        let manager = WorkerManager::new();
        let handle = manager.get_or_create_worker(Arc::new(QrCodeEncoder)).await.unwrap();
        let matrix = handle.encode("https://example.com").await.unwrap();
        assert_eq!(matrix.width(), 25);
        assert_eq!(handle.in_flight(), 0);
        manager.terminate().await;
    }

    #[tokio::test]
    async fn test_handle_reused_until_terminate() {
        let manager = quick_manager();
        let encoder: Arc<dyn MatrixEncoder> = Arc::new(QrCodeEncoder);
        let first = manager.get_or_create_worker(encoder.clone()).await.unwrap();
        let second = manager.get_or_create_worker(encoder.clone()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.workers_spawned(), 1);

        manager.terminate().await;
        assert_eq!(manager.state(), WorkerState::Absent);
        assert_eq!(first.state(), WorkerState::Terminated);

        let third = manager.get_or_create_worker(encoder).await.unwrap();
        assert_ne!(first.id(), third.id());
        assert_eq!(manager.workers_spawned(), 2);
        manager.terminate().await;
    }

    #[tokio::test]
    async fn test_concurrent_creation_spawns_once() {
        let manager = quick_manager();
        let encoder: Arc<dyn MatrixEncoder> = Arc::new(QrCodeEncoder);
        let (a, b) = tokio::join!(
            manager.get_or_create_worker(encoder.clone()),
            manager.get_or_create_worker(encoder.clone()),
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(manager.workers_spawned(), 1);
        manager.terminate().await;
    }

    #[tokio::test]
    async fn test_responses_paired_by_id() {
        let manager = quick_manager();
        let encoder = Arc::new(LengthEncoder(AtomicUsize::new(0)));
        let handle = manager.get_or_create_worker(encoder.clone()).await.unwrap();
        let (short, long) = tokio::join!(handle.encode("ab"), handle.encode("abcdef"));
        assert_eq!(short.unwrap().width(), 2);
        assert_eq!(long.unwrap().width(), 6);
        assert_eq!(encoder.0.load(Ordering::Relaxed), 2);
        manager.terminate().await;
    }

    #[tokio::test]
    async fn test_worker_failure_is_reported() {
        let manager = quick_manager();
        let handle = manager.get_or_create_worker(Arc::new(RejectingEncoder)).await.unwrap();
        assert_eq!(
            handle.encode("abc").await,
            Err(EncodeError::Worker("cannot encode abc".to_string()))
        );
        // a reported failure does not kill the worker
        assert!(handle.is_alive());
        manager.terminate().await;
    }

    #[tokio::test]
    async fn test_encode_timeout() {
        let manager = quick_manager();
        let handle = manager
            .get_or_create_worker(Arc::new(SlowEncoder(Duration::from_millis(600))))
            .await
            .unwrap();
        assert_eq!(
            handle.encode("slow").await,
            Err(EncodeError::Timeout(Duration::from_millis(200)))
        );
        assert_eq!(handle.in_flight(), 0);

        manager.discard(&handle).await;
        assert_eq!(manager.state(), WorkerState::Absent);
        assert!(manager.current().await.is_none());
    }

    #[tokio::test]
    async fn test_crashed_worker_is_replaced() {
        let manager = quick_manager();
        let handle = manager.get_or_create_worker(Arc::new(PanickingEncoder)).await.unwrap();
        assert_eq!(handle.encode("boom").await, Err(EncodeError::Disconnected));
        assert!(!handle.is_alive());

        let fresh = manager.get_or_create_worker(Arc::new(QrCodeEncoder)).await.unwrap();
        assert_ne!(handle.id(), fresh.id());
        assert_eq!(manager.workers_spawned(), 2);
        manager.terminate().await;
    }

    #[tokio::test]
    async fn test_crash_is_reflected_in_manager_state() {
        let manager = quick_manager();
        let handle = manager.get_or_create_worker(Arc::new(PanickingEncoder)).await.unwrap();
        assert_eq!(manager.state(), WorkerState::Ready);

        assert_eq!(handle.encode("boom").await, Err(EncodeError::Disconnected));
        assert_eq!(manager.state(), WorkerState::Absent);
        assert_eq!(handle.state(), WorkerState::Terminated);
    }

    #[tokio::test]
    async fn test_dropped_creation_does_not_stick_in_starting() {
        let manager = quick_manager();
        let mut creating = Box::pin(manager.get_or_create_worker(Arc::new(QrCodeEncoder)));

        // The pong can only be routed once this task yields.
        let pending = std::future::poll_fn(|cx| {
            std::task::Poll::Ready(creating.as_mut().poll(cx).is_pending())
        })
        .await;
        assert!(pending);
        assert_eq!(manager.state(), WorkerState::Starting);

        drop(creating);
        assert_eq!(manager.state(), WorkerState::Absent);
        assert!(manager.current().await.is_none());

        manager.get_or_create_worker(Arc::new(QrCodeEncoder)).await.unwrap();
        assert_eq!(manager.state(), WorkerState::Ready);
        manager.terminate().await;
    }

    #[tokio::test]
    async fn test_discard_leaves_running_requests_alone() {
        let manager = WorkerManager::with_timeouts(Duration::from_millis(500), Duration::from_secs(2));
        let handle = manager
            .get_or_create_worker(Arc::new(SlowEncoder(Duration::from_millis(300))))
            .await
            .unwrap();

        let running = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.encode("still wanted").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.discard(&handle).await;

        assert_eq!(manager.state(), WorkerState::Absent);
        assert_eq!(running.await.unwrap().map(|m| m.width()), Ok(21));
        assert!(handle.is_alive());
    }

    #[tokio::test]
    async fn test_terminate_fails_in_flight_requests() {
        let manager = WorkerManager::with_timeouts(Duration::from_millis(500), Duration::from_secs(5));
        let handle = manager
            .get_or_create_worker(Arc::new(SlowEncoder(Duration::from_millis(300))))
            .await
            .unwrap();

        let pending = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.encode("in flight").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.terminate().await;

        assert_eq!(pending.await.unwrap(), Err(EncodeError::Terminated));
        assert_eq!(handle.encode("after").await, Err(EncodeError::Terminated));
    }

    #[tokio::test]
    async fn test_terminate_twice_is_noop() {
        let manager = quick_manager();
        manager.terminate().await;
        assert_eq!(manager.state(), WorkerState::Absent);

        manager.get_or_create_worker(Arc::new(QrCodeEncoder)).await.unwrap();
        manager.terminate().await;
        manager.terminate().await;
        assert_eq!(manager.state(), WorkerState::Absent);
        assert_eq!(manager.workers_spawned(), 1);
    }
}
