use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::config::StorageSettings;
use super::host::{FieldHost, Notification};
use super::value::FieldValue;
use crate::transport::{
    ProgressSink, TransferProgress, TransportError, UploadRequest, UploadTransport,
};

pub(crate) fn settings(storage_path: &str) -> StorageSettings {
    StorageSettings {
        storage_path: storage_path.to_string(),
        accepted_files: Vec::new(),
        metadata: None,
        store_url: false,
    }
}

/// Transport double: reports 50% then 100%, and resolves to the destination
/// unless a file name was scripted to fail. A gated transport waits for one
/// permit per upload between the two progress reports.
pub(crate) struct ScriptedTransport {
    failures: Mutex<HashMap<String, String>>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail(self, name: &str, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), message.to_string());
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadTransport for ScriptedTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressSink,
    ) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = progress.send(TransferProgress::new(50, 100));
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| TransportError::ConcurrencyClosed)?
                .forget();
        }
        let _ = progress.send(TransferProgress::new(100, 100));
        let failure = self
            .failures
            .lock()
            .unwrap()
            .get(request.file.name())
            .cloned();
        match failure {
            Some(message) => Err(TransportError::Failed(message)),
            None => Ok(request.destination),
        }
    }

    async fn download_url(&self, stored_path: &str) -> Result<String, TransportError> {
        Ok(format!("https://cdn.example/{stored_path}"))
    }
}

/// Transport double whose upload panics.
pub(crate) struct PanickingTransport;

#[async_trait]
impl UploadTransport for PanickingTransport {
    async fn upload(
        &self,
        _request: UploadRequest,
        _progress: ProgressSink,
    ) -> Result<String, TransportError> {
        panic!("transport bug");
    }

    async fn download_url(&self, _stored_path: &str) -> Result<String, TransportError> {
        unreachable!("upload never succeeds")
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    pub(crate) changes: Vec<FieldValue>,
    pub(crate) touched: usize,
    pub(crate) notifications: Vec<Notification>,
}

impl FieldHost for RecordingHost {
    fn on_change(&mut self, value: FieldValue) {
        self.changes.push(value);
    }

    fn on_touched(&mut self) {
        self.touched += 1;
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}
