//! Stale-while-revalidate scheduling of off-thread layout
//!
//! Callers read [`AsyncScheduler::get_cached`] synchronously and keep their
//! last synchronous result on a miss. Misses are sent to a background
//! [`Worker`]; responses queue up and are applied together on the next
//! paint tick.

pub mod cache;
pub mod protocol;
pub mod worker;

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

pub use cache::{CacheKey, CachedLayout, LayoutCache};
pub use protocol::{RequestId, WorkerRequest, WorkerResponse};
pub use worker::Worker;

use crate::bridge::{AvailableSize, ModuleFactory, StylePayload};
use crate::document::ElementId;
use crate::layout::records;
use crate::utils::{LayoutError, Result};

/// Work that can be sent to the worker.
///
/// [`FallbackLayout`](crate::layout::FallbackLayout) only submits grid jobs;
/// block levels it runs synchronously through the bridge. `Block` jobs are
/// for callers that lay out large levels themselves and want them off the
/// frame thread: encode the level with [`records::encode_level`], key it with
/// [`CacheKey::with_records`], and read the [`CachedLayout::Block`] result
/// back through [`AsyncScheduler::get_cached`] after a paint tick.
#[derive(Debug)]
pub enum LayoutJob {
    /// A block-flow level in flat record form, with the children's ids in
    /// record order
    Block {
        records: Vec<f32>,
        ids: Vec<ElementId>,
    },
    Grid {
        payload: StylePayload,
        available: AvailableSize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Ready,
    Failed,
}

/// Continuation of a scheduled job; `None` means the job produced nothing
/// usable
pub type LayoutReceiver = oneshot::Receiver<Option<CachedLayout>>;

#[derive(Debug)]
struct Pending {
    key: CacheKey,
    generation: u64,
    epoch: u64,
    ids: Vec<ElementId>,
    reply: oneshot::Sender<Option<CachedLayout>>,
}

#[derive(Debug)]
pub struct AsyncScheduler {
    worker: Worker,
    init_request: RequestId,
    state: WorkerState,
    next_request: RequestId,
    pending: HashMap<RequestId, Pending>,
    arrived: VecDeque<WorkerResponse>,
    cache: LayoutCache,
    generations: HashMap<ElementId, u64>,
    epoch: u64,
}

impl AsyncScheduler {
    /// Start a worker that builds its module with `factory`
    pub fn spawn(factory: ModuleFactory) -> Result<Self> {
        let worker = Worker::spawn(factory)?;
        let init_request = 1;
        worker.send(WorkerRequest::Init {
            request_id: init_request,
        })?;
        Ok(Self {
            worker,
            init_request,
            state: WorkerState::Starting,
            next_request: init_request + 1,
            pending: HashMap::new(),
            arrived: VecDeque::new(),
            cache: LayoutCache::default(),
            generations: HashMap::new(),
            epoch: 0,
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == WorkerState::Ready
    }

    /// Previous result for `key`, if any. Never blocks.
    pub fn get_cached(&self, key: &CacheKey) -> Option<&CachedLayout> {
        self.cache.get(key)
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.pending.values().any(|p| p.key == *key)
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Send `job` to the worker. The result is cached under `key` on the
    /// paint tick after it arrives, when the receiver also resolves.
    pub fn schedule_async(&mut self, key: CacheKey, job: LayoutJob) -> Result<LayoutReceiver> {
        match self.state {
            WorkerState::Ready => {}
            WorkerState::Starting => {
                return Err(LayoutError::WorkerNotReady(
                    "worker has not finished initializing".to_string(),
                ))
            }
            WorkerState::Failed => {
                return Err(LayoutError::WorkerNotReady(
                    "worker failed to initialize".to_string(),
                ))
            }
        }

        let request_id = self.next_request;
        self.next_request += 1;
        let (request, ids) = match job {
            LayoutJob::Block { records, ids } => (
                WorkerRequest::BlockLayout {
                    request_id,
                    records,
                },
                ids,
            ),
            LayoutJob::Grid { payload, available } => (
                WorkerRequest::GridLayout {
                    request_id,
                    payload,
                    available,
                },
                Vec::new(),
            ),
        };
        self.worker.send(request)?;

        let (reply, receiver) = oneshot::channel();
        let generation = self.generation(key.parent);
        log::trace!("scheduled request {} for parent {}", request_id, key.parent);
        self.pending.insert(
            request_id,
            Pending {
                key,
                generation,
                epoch: self.epoch,
                ids,
                reply,
            },
        );
        Ok(receiver)
    }

    /// Drop cached results for `parent`. Responses already in flight for it
    /// are discarded when they arrive.
    pub fn invalidate(&mut self, parent: ElementId) {
        *self.generations.entry(parent).or_insert(0) += 1;
        let dropped = self.cache.invalidate(parent);
        log::trace!("invalidated {} cached layouts under {}", dropped, parent);
    }

    /// Drop every cached result and every in-flight response
    pub fn clear_cache(&mut self) {
        self.epoch += 1;
        self.cache.clear();
    }

    /// Move every response that has arrived into the apply queue
    pub fn pump(&mut self) {
        loop {
            match self.worker.try_recv() {
                Ok(Some(response)) => self.accept(response),
                Ok(None) => break,
                Err(err) => {
                    self.fail_all(&err);
                    break;
                }
            }
        }
    }

    /// Apply queued results in arrival order, write them to the cache and
    /// resolve their continuations. Returns the parents whose cache changed.
    pub fn on_paint_tick(&mut self) -> Vec<ElementId> {
        self.pump();
        let mut updated = Vec::new();
        while let Some(response) = self.arrived.pop_front() {
            let request_id = response.request_id();
            let Some(pending) = self.pending.remove(&request_id) else {
                log::debug!("dropping response to unknown request {}", request_id);
                continue;
            };
            if pending.epoch != self.epoch || pending.generation != self.generation(pending.key.parent)
            {
                log::debug!(
                    "discarding late {} for invalidated parent {}",
                    response.kind(),
                    pending.key.parent
                );
                let _ = pending.reply.send(None);
                continue;
            }
            let value = match response {
                WorkerResponse::BlockLayoutResult { records, .. } => {
                    match records::decode_output(&records, &pending.ids) {
                        Ok(output) => Some(CachedLayout::Block(output)),
                        Err(err) => {
                            log::warn!("bad block result for request {}: {}", request_id, err);
                            None
                        }
                    }
                }
                WorkerResponse::GridLayoutResult { geometry, .. } => {
                    Some(CachedLayout::Grid(geometry))
                }
                WorkerResponse::Error { message, .. } => {
                    log::warn!("worker request {} failed: {}", request_id, message);
                    None
                }
                WorkerResponse::InitOk { .. } => None,
            };
            if let Some(value) = &value {
                self.cache.put(pending.key.clone(), value.clone());
                if !updated.contains(&pending.key.parent) {
                    updated.push(pending.key.parent);
                }
            }
            let _ = pending.reply.send(value);
        }
        updated
    }

    /// Block the calling thread until the worker is initialized or
    /// `timeout` passes
    pub fn wait_ready_blocking(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.state == WorkerState::Starting {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self.worker.recv_timeout(left) {
                Ok(Some(response)) => self.accept(response),
                Ok(None) => break,
                Err(err) => self.fail_all(&err),
            }
        }
        self.is_ready()
    }

    /// Wait for the worker to finish initializing, polling without
    /// blocking the runtime
    pub async fn wait_ready(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.pump();
            if self.state != WorkerState::Starting || tokio::time::Instant::now() >= deadline {
                return self.is_ready();
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Wait until every in-flight request has a response, then apply them
    pub async fn flush(&mut self, timeout: Duration) -> Vec<ElementId> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.pump();
            if self.arrived.len() >= self.pending.len()
                || tokio::time::Instant::now() >= deadline
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        self.on_paint_tick()
    }

    fn generation(&self, parent: ElementId) -> u64 {
        self.generations.get(&parent).copied().unwrap_or(0)
    }

    fn accept(&mut self, response: WorkerResponse) {
        if response.request_id() != self.init_request {
            self.arrived.push_back(response);
            return;
        }
        match response {
            WorkerResponse::InitOk { module, .. } => {
                log::info!("layout worker ready with {}", module);
                self.state = WorkerState::Ready;
            }
            WorkerResponse::Error { message, .. } => {
                log::warn!("layout worker failed to initialize: {}", message);
                self.state = WorkerState::Failed;
            }
            other => log::debug!("unexpected {} for INIT", other.kind()),
        }
    }

    /// The worker is gone: every continuation resolves to nothing
    fn fail_all(&mut self, err: &LayoutError) {
        if self.state != WorkerState::Failed {
            log::warn!("layout worker lost: {}", err);
        }
        self.state = WorkerState::Failed;
        self.arrived.clear();
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{AccelerationModule, TaffyModule};
    use crate::layout::geometry::Edges;
    use crate::layout::types::{FlowContainer, FlowContext, FlowItem};

    fn taffy_factory() -> ModuleFactory {
        Box::new(|| Ok(Box::new(TaffyModule::new()) as Box<dyn AccelerationModule>))
    }

    fn ready_scheduler() -> AsyncScheduler {
        let mut scheduler = AsyncScheduler::spawn(taffy_factory()).unwrap();
        assert!(scheduler.wait_ready_blocking(Duration::from_secs(5)));
        scheduler
    }

    fn block_job(parent: ElementId) -> (CacheKey, LayoutJob) {
        let children = vec![
            FlowItem::new(1)
                .with_size(None, Some(100.0))
                .with_margin(Edges::new(0.0, 0.0, 20.0, 0.0)),
            FlowItem::new(2)
                .with_size(None, Some(100.0))
                .with_margin(Edges::new(30.0, 0.0, 0.0, 0.0)),
        ];
        let records = records::encode_level(
            &FlowContainer::default(),
            &children,
            400.0,
            None,
            FlowContext::default(),
        );
        let key = CacheKey::new(parent, vec![1, 2], AvailableSize::new(Some(400.0), None))
            .with_records(&records);
        (
            key,
            LayoutJob::Block {
                records,
                ids: vec![1, 2],
            },
        )
    }

    fn tick_until_applied(scheduler: &mut AsyncScheduler) -> Vec<ElementId> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let updated = scheduler.on_paint_tick();
            if !updated.is_empty() || scheduler.in_flight() == 0 || Instant::now() > deadline {
                return updated;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_not_ready_before_init() {
        let factory: ModuleFactory =
            Box::new(|| Err(LayoutError::ModuleUnavailable("missing".to_string())));
        let mut scheduler = AsyncScheduler::spawn(factory).unwrap();
        let (key, job) = block_job(1);
        assert!(matches!(
            scheduler.schedule_async(key, job),
            Err(LayoutError::WorkerNotReady(_))
        ));
        assert!(!scheduler.wait_ready_blocking(Duration::from_secs(5)));
        assert_eq!(scheduler.state(), WorkerState::Failed);
    }

    #[test]
    fn test_result_cached_on_paint_tick() {
        let mut scheduler = ready_scheduler();
        let (key, job) = block_job(50);
        let mut receiver = scheduler.schedule_async(key.clone(), job).unwrap();
        assert!(scheduler.is_in_flight(&key));
        assert!(scheduler.get_cached(&key).is_none());

        assert_eq!(tick_until_applied(&mut scheduler), vec![50]);
        match scheduler.get_cached(&key) {
            Some(CachedLayout::Block(output)) => assert_eq!(output.layouts[1].y, 130.0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(receiver.try_recv(), Ok(Some(CachedLayout::Block(_)))));
    }

    #[test]
    fn test_invalidated_parent_discards_late_response() {
        let mut scheduler = ready_scheduler();
        let (key, job) = block_job(60);
        let mut receiver = scheduler.schedule_async(key.clone(), job).unwrap();
        scheduler.invalidate(60);

        assert!(tick_until_applied(&mut scheduler).is_empty());
        assert!(scheduler.get_cached(&key).is_none());
        assert!(matches!(receiver.try_recv(), Ok(None)));
    }

    #[test]
    fn test_clear_cache_discards_everything() {
        let mut scheduler = ready_scheduler();
        let (key, job) = block_job(70);
        scheduler.schedule_async(key.clone(), job).unwrap();
        tick_until_applied(&mut scheduler);
        assert_eq!(scheduler.cache_len(), 1);

        scheduler.clear_cache();
        assert_eq!(scheduler.cache_len(), 0);
        assert!(scheduler.get_cached(&key).is_none());
    }
}
