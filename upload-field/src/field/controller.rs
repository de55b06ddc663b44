//! Lifecycle of a single file upload.
//!
//! A controller starts its transport call once, on a spawned task, and the
//! task reports back over a channel. The owner of the item list feeds those
//! events into [`UploadItemController::apply`], which yields the completion or
//! the failure exactly once.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::StorageSettings;
use super::host::Notification;
use super::item::{FileHandle, FileId, UploadMetadata};
use crate::transport::{TransportError, UploadRequest, UploadTransport, destination_path};

#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Idle,
    Uploading { percent: f32 },
    Resolved { reference: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Progress { file: FileId, percent: f32 },
    Completed { file: FileId, reference: String },
    Failed { file: FileId, message: String },
}

impl ControllerEvent {
    pub fn file(&self) -> FileId {
        match self {
            ControllerEvent::Progress { file, .. }
            | ControllerEvent::Completed { file, .. }
            | ControllerEvent::Failed { file, .. } => *file,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ControllerEvent::Progress { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerOutcome {
    Resolved {
        reference: String,
        file: FileHandle,
        metadata: Option<UploadMetadata>,
    },
    Failed(Notification),
}

#[derive(Debug)]
pub struct UploadItemController {
    file: FileHandle,
    settings: StorageSettings,
    state: UploadState,
    started: bool,
}

impl UploadItemController {
    pub fn new(file: FileHandle, settings: StorageSettings) -> Self {
        Self {
            file,
            settings,
            state: UploadState::Idle,
            started: false,
        }
    }

    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self.state, UploadState::Uploading { .. })
    }

    pub fn percent_complete(&self) -> Option<f32> {
        match self.state {
            UploadState::Uploading { percent } => Some(percent),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            UploadState::Failed { message } => Some(message),
            _ => None,
        }
    }

    /// Spawns the upload on the current tokio runtime. Only the first call
    /// does anything; later calls return `false`.
    pub fn start(
        &mut self,
        transport: Arc<dyn UploadTransport>,
        events: mpsc::UnboundedSender<ControllerEvent>,
    ) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        self.state = UploadState::Uploading { percent: 0.0 };
        debug!(file = %self.file.id(), name = self.file.name(), "starting upload");
        tokio::spawn(run_upload(
            transport,
            self.file.clone(),
            self.settings.clone(),
            events,
        ));
        true
    }

    pub fn apply(&mut self, event: ControllerEvent) -> Option<ControllerOutcome> {
        if event.file() != self.file.id() || !self.is_uploading() {
            debug!(file = %event.file(), "ignoring event for settled upload");
            return None;
        }
        match event {
            ControllerEvent::Progress { percent, .. } => {
                self.state = UploadState::Uploading { percent };
                None
            }
            ControllerEvent::Completed { reference, .. } => {
                info!(name = self.file.name(), %reference, "upload complete");
                self.state = UploadState::Resolved {
                    reference: reference.clone(),
                };
                Some(ControllerOutcome::Resolved {
                    reference,
                    file: self.file.clone(),
                    metadata: self.settings.metadata.clone(),
                })
            }
            ControllerEvent::Failed { message, .. } => {
                warn!(name = self.file.name(), error = %message, "upload failed");
                self.state = UploadState::Failed {
                    message: message.clone(),
                };
                Some(ControllerOutcome::Failed(Notification::upload_failed(
                    message,
                )))
            }
        }
    }
}

/// Runs the transport call on its own task so that a panic inside it still
/// ends in a `Failed` report.
async fn run_upload(
    transport: Arc<dyn UploadTransport>,
    file: FileHandle,
    settings: StorageSettings,
    events: mpsc::UnboundedSender<ControllerEvent>,
) {
    let id = file.id();
    let progress = events.clone();
    let task = tokio::spawn(async move {
        upload_once(transport.as_ref(), &file, &settings, &progress).await
    });
    let result = match task.await {
        Ok(result) => result,
        Err(err) => Err(TransportError::Aborted(err)),
    };
    let event = match result {
        Ok(reference) => ControllerEvent::Completed { file: id, reference },
        Err(err) => ControllerEvent::Failed {
            file: id,
            message: err.to_string(),
        },
    };
    // The owner may be gone; the transport result is simply dropped then.
    let _ = events.send(event);
}

async fn upload_once(
    transport: &dyn UploadTransport,
    file: &FileHandle,
    settings: &StorageSettings,
    events: &mpsc::UnboundedSender<ControllerEvent>,
) -> Result<String, TransportError> {
    let destination = destination_path(&settings.storage_path, file.name())?;
    let request = UploadRequest {
        file: file.clone(),
        destination,
        metadata: settings.metadata.clone(),
    };

    let forward = |percent: f32| {
        debug!(name = file.name(), "upload is {percent:.0}% done");
        let _ = events.send(ControllerEvent::Progress {
            file: file.id(),
            percent,
        });
    };

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let mut upload = transport.upload(request, progress_tx);
    let stored = loop {
        tokio::select! {
            biased;
            Some(progress) = progress_rx.recv() => forward(progress.percent()),
            result = &mut upload => break result?,
        }
    };
    while let Ok(progress) = progress_rx.try_recv() {
        forward(progress.percent());
    }

    if settings.store_url {
        return transport.download_url(&stored).await;
    }
    Ok(stored)
}
