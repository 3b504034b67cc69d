//! Background layout worker
//!
//! A dedicated thread with its own acceleration module, built on that
//! thread from a `Send` factory. Requests and responses travel over a pair
//! of channels; nothing else is shared.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::protocol::{RequestId, WorkerRequest, WorkerResponse};
use crate::bridge::{AccelerationModule, AvailableSize, ModuleFactory, NodeGeometry, StylePayload};
use crate::utils::{LayoutError, Result};

/// Channel pair to a running worker thread
pub struct Worker {
    sender: Sender<WorkerRequest>,
    receiver: Receiver<WorkerResponse>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl Worker {
    /// Start the worker thread. The module is not built until `Init`.
    pub fn spawn(factory: ModuleFactory) -> Result<Self> {
        let (request_tx, request_rx) = channel();
        let (response_tx, response_rx) = channel();
        let handle = thread::Builder::new()
            .name("boxflow-layout-worker".to_string())
            .spawn(move || run(factory, request_rx, response_tx))?;
        Ok(Self {
            sender: request_tx,
            receiver: response_rx,
            handle: Some(handle),
        })
    }

    pub fn send(&self, request: WorkerRequest) -> Result<()> {
        self.sender
            .send(request)
            .map_err(|_| LayoutError::WorkerDisconnected)
    }

    /// Next response, if one is waiting
    pub fn try_recv(&self) -> Result<Option<WorkerResponse>> {
        match self.receiver.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LayoutError::WorkerDisconnected),
        }
    }

    /// Wait up to `timeout` for the next response
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WorkerResponse>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LayoutError::WorkerDisconnected),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.sender.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("layout worker panicked");
            }
        }
    }
}

fn run(factory: ModuleFactory, requests: Receiver<WorkerRequest>, responses: Sender<WorkerResponse>) {
    let mut module: Option<Box<dyn AccelerationModule>> = None;
    for request in requests {
        log::trace!("worker received {}", request.kind());
        let response = match request {
            WorkerRequest::Init { request_id } => match init(&factory) {
                Ok(built) => {
                    let name = built.name();
                    module = Some(built);
                    WorkerResponse::InitOk {
                        request_id,
                        module: name,
                    }
                }
                Err(err) => error(request_id, &err),
            },
            WorkerRequest::BlockLayout {
                request_id,
                records,
            } => match module.as_mut() {
                None => not_ready(request_id),
                Some(module) => match module.block_layout(&records) {
                    Ok(records) => WorkerResponse::BlockLayoutResult {
                        request_id,
                        records,
                    },
                    Err(err) => error(request_id, &err),
                },
            },
            WorkerRequest::GridLayout {
                request_id,
                payload,
                available,
            } => match module.as_mut() {
                None => not_ready(request_id),
                Some(module) => match grid_layout(module.as_mut(), &payload, available) {
                    Ok(geometry) => WorkerResponse::GridLayoutResult {
                        request_id,
                        geometry,
                    },
                    Err(err) => error(request_id, &err),
                },
            },
            WorkerRequest::Shutdown => break,
        };
        if responses.send(response).is_err() {
            break;
        }
    }
    log::debug!("layout worker stopped");
}

fn init(factory: &ModuleFactory) -> Result<Box<dyn AccelerationModule>> {
    let mut module = factory()?;
    module.probe()?;
    Ok(module)
}

fn error(request_id: RequestId, err: &LayoutError) -> WorkerResponse {
    WorkerResponse::Error {
        request_id,
        message: err.to_string(),
    }
}

fn not_ready(request_id: RequestId) -> WorkerResponse {
    error(
        request_id,
        &LayoutError::WorkerNotReady("layout request before INIT completed".to_string()),
    )
}

/// Lay out one grid container and return its children's geometry. The
/// module's tree is cleared afterwards whatever the outcome.
fn grid_layout(
    module: &mut dyn AccelerationModule,
    payload: &StylePayload,
    available: AvailableSize,
) -> Result<Vec<NodeGeometry>> {
    let handles = module.build_tree(payload)?;
    let result = match handles.split_last() {
        Some((&root, children)) => module
            .compute_layout(root, available)
            .and_then(|()| module.layouts_batch(children)),
        None => Ok(Vec::new()),
    };
    module.clear();
    result
}
