// ============================================================================
// REMOTE: annotation backend protocol
// ============================================================================

pub mod dispatch;
pub mod http;
pub mod npy;
pub mod wire;

use crate::ops::ingest::RawSlice;
use crate::volume::{SliceCoordinate, VolumeShape};
use wire::{FindLabelRequest, LassoRequest, SamPayload, SliceKind, StrokeRequest};

#[derive(Debug)]
pub enum RemoteError {
    /// Transport failure (connect, timeout, TLS, ...).
    Http(String),
    /// Non-success HTTP status.
    Status { path: String, code: u16 },
    /// Slice body could not be decompressed or parsed.
    Decode(String),
    /// JSON body could not be parsed.
    Json(String),
    Io(std::io::Error),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Http(e) => write!(f, "HTTP error: {}", e),
            RemoteError::Status { path, code } => write!(f, "{} returned status {}", path, code),
            RemoteError::Decode(e) => write!(f, "Slice decode error: {}", e),
            RemoteError::Json(e) => write!(f, "JSON error: {}", e),
            RemoteError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        RemoteError::Io(e)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RemoteError::Status {
                path: e.url().map(|u| u.path().to_string()).unwrap_or_default(),
                code: status.as_u16(),
            },
            None => RemoteError::Http(e.to_string()),
        }
    }
}

/// The annotation backend.  Every call blocks; the dispatcher runs them on
/// worker threads.
pub trait Backend: Send + Sync {
    fn fetch_slice(
        &self,
        kind: SliceKind,
        coord: SliceCoordinate,
        contour: bool,
    ) -> Result<RawSlice, RemoteError>;

    fn submit_stroke(&self, stroke: &StrokeRequest) -> Result<(), RemoteError>;

    fn submit_sam(&self, payload: &SamPayload) -> Result<(), RemoteError>;

    fn apply_lasso(&self, lasso: &LassoRequest) -> Result<(), RemoteError>;

    /// Label id under a world pixel; negative when there is none.
    fn find_label_by_click(&self, req: &FindLabelRequest) -> Result<i64, RemoteError>;

    fn undo(&self) -> Result<(), RemoteError>;

    fn new_annotation(&self) -> Result<(), RemoteError>;

    fn is_annotation_empty(&self) -> Result<bool, RemoteError>;

    fn image_info(&self) -> Result<VolumeShape, RemoteError>;
}
