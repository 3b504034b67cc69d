//! Messages between the scheduler and its worker
//!
//! Every request except `Shutdown` yields exactly one response carrying the
//! same request id. Buffers move with the message.

use crate::bridge::{AvailableSize, NodeGeometry, StylePayload};

pub type RequestId = u64;

#[derive(Debug)]
pub enum WorkerRequest {
    /// Build and probe the worker's own module
    Init { request_id: RequestId },
    /// One block-flow level as flat records
    BlockLayout {
        request_id: RequestId,
        records: Vec<f32>,
    },
    /// A grid container (last node) and its children as a style batch
    GridLayout {
        request_id: RequestId,
        payload: StylePayload,
        available: AvailableSize,
    },
    Shutdown,
}

impl WorkerRequest {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            WorkerRequest::Init { request_id }
            | WorkerRequest::BlockLayout { request_id, .. }
            | WorkerRequest::GridLayout { request_id, .. } => Some(*request_id),
            WorkerRequest::Shutdown => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkerRequest::Init { .. } => "INIT",
            WorkerRequest::BlockLayout { .. } => "BLOCK_LAYOUT",
            WorkerRequest::GridLayout { .. } => "GRID_LAYOUT",
            WorkerRequest::Shutdown => "SHUTDOWN",
        }
    }
}

#[derive(Debug)]
pub enum WorkerResponse {
    InitOk {
        request_id: RequestId,
        module: &'static str,
    },
    BlockLayoutResult {
        request_id: RequestId,
        records: Vec<f32>,
    },
    /// Geometry of the container's children, in batch order
    GridLayoutResult {
        request_id: RequestId,
        geometry: Vec<NodeGeometry>,
    },
    Error {
        request_id: RequestId,
        message: String,
    },
}

impl WorkerResponse {
    pub fn request_id(&self) -> RequestId {
        match self {
            WorkerResponse::InitOk { request_id, .. }
            | WorkerResponse::BlockLayoutResult { request_id, .. }
            | WorkerResponse::GridLayoutResult { request_id, .. }
            | WorkerResponse::Error { request_id, .. } => *request_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkerResponse::InitOk { .. } => "INIT_OK",
            WorkerResponse::BlockLayoutResult { .. } => "BLOCK_LAYOUT_RESULT",
            WorkerResponse::GridLayoutResult { .. } => "GRID_LAYOUT_RESULT",
            WorkerResponse::Error { .. } => "ERROR",
        }
    }
}
