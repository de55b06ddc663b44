//! The uploader collaborator: moves one file to storage and reports progress.

mod accept;
pub mod http;
pub mod paths;

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::field::item::{FileHandle, UploadMetadata};

pub use accept::AcceptList;
pub use http::{HttpTransport, TransportConfig};
pub use paths::{PathError, destination_path};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("storage api error: {0}")]
    Storage(#[from] storage_core::StorageError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid destination: {0}")]
    Path(#[from] PathError),
    #[error("file {name} is empty")]
    EmptyFile { name: String },
    #[error("file {name} has a type that is not accepted ({content_type})")]
    Rejected { name: String, content_type: String },
    #[error("concurrency limiter is closed")]
    ConcurrencyClosed,
    #[error("upload stopped unexpectedly: {0}")]
    Aborted(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    pub fn new(bytes_transferred: u64, total_bytes: u64) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    pub fn percent(&self) -> f32 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        let ratio = self.bytes_transferred as f64 / self.total_bytes as f64;
        (ratio * 100.0).clamp(0.0, 100.0) as f32
    }
}

pub type ProgressSink = mpsc::UnboundedSender<TransferProgress>;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: FileHandle,
    pub destination: String,
    pub metadata: Option<UploadMetadata>,
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Uploads `request.file` and resolves to the path it was stored at.
    /// Progress goes to `progress` until the call returns.
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressSink,
    ) -> Result<String, TransportError>;

    /// Public download URL for a stored path.
    async fn download_url(&self, stored_path: &str) -> Result<String, TransportError>;
}
