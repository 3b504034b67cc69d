//! Error types for boxflow layout operations

use thiserror::Error;

use crate::bridge::NodeHandle;
use crate::document::ElementId;

/// Main error type for layout operations
#[derive(Debug, Error)]
pub enum LayoutError {
    /// `compute_layout` or an incremental update was called before `build_full`
    #[error("layout tree has not been built; call build_full first")]
    TreeNotBuilt,
    /// The element id is not present in the persistent tree
    #[error("element {0} is not present in the layout tree")]
    UnknownNode(ElementId),
    /// The handle was removed or never issued by this module instance
    #[error("stale or unknown node handle {0:?}")]
    StaleHandle(NodeHandle),
    /// A node was removed while another node still lists it as a child
    #[error("element {child} is still referenced as a child of {parent}")]
    StillReferenced {
        /// The node that was going to be removed
        child: ElementId,
        /// The node that still lists it
        parent: ElementId,
    },
    /// The root element is missing from the document
    #[error("root element {0} not found in document")]
    MissingRoot(ElementId),
    /// Binary protocol violation
    #[error("wire format error: {0}")]
    Wire(#[from] WireError),
    /// Textual protocol violation
    #[error("textual style error: {0}")]
    Textual(String),
    /// The acceleration module is not usable right now
    #[error("acceleration module unavailable: {0}")]
    ModuleUnavailable(String),
    /// The constraint engine rejected an operation
    #[error("layout engine error: {0}")]
    Engine(String),
    /// The background worker has not initialized or failed to initialize
    #[error("layout worker not ready: {0}")]
    WorkerNotReady(String),
    /// The worker channel is closed
    #[error("layout worker disconnected")]
    WorkerDisconnected,
    /// JSON (de)serialization failure
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Binary wire format errors.
///
/// Every variant indicates a schema mismatch between the two sides of the
/// boundary, never bad user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("bad magic {found:02x?}")]
    BadMagic { found: [u8; 4] },
    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u8, found: u8 },
    #[error("buffer truncated at offset {offset} (needed {needed} more bytes)")]
    Truncated { offset: usize, needed: usize },
    #[error("unknown field bit {0}")]
    UnknownField(u32),
    #[error("unknown code {code} for field {field}")]
    UnknownEnum { field: &'static str, code: u8 },
    #[error("unknown value tag {tag} for field {field}")]
    UnknownTag { field: &'static str, tag: u8 },
    #[error("node {node} references child {child} that does not precede it")]
    ForwardReference { node: usize, child: usize },
    #[error("batch of {0} nodes exceeds the u16 index space")]
    TooManyNodes(usize),
    #[error("grid sideband of {0} bytes exceeds u16 length")]
    SidebandTooLarge(usize),
    #[error("invalid grid sideband: {0}")]
    BadSideband(String),
    #[error("{0} trailing bytes after last node")]
    TrailingBytes(usize),
    #[error("expected {expected} nodes, found {found}")]
    NodeCount { expected: usize, found: usize },
    #[error("flat record buffer of {len} floats is not a multiple of stride {stride}")]
    RecordStride { len: usize, stride: usize },
}

impl From<taffy::TaffyError> for LayoutError {
    fn from(err: taffy::TaffyError) -> Self {
        Self::Engine(err.to_string())
    }
}

/// Convenience Result type for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;
