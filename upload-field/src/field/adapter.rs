use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::config::{ConfigError, FieldProperty, UploadConfig};
use super::controller::{ControllerEvent, ControllerOutcome, UploadItemController};
use super::host::{FieldHost, Notification};
use super::item::{DisplaySize, FileHandle, FileId, UploadItem};
use super::reconciler::ItemReconciler;
use super::value::FieldValue;
use crate::transport::UploadTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Resolved,
    Pending,
}

/// What a renderer needs to draw one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewEntry {
    pub identity_key: String,
    pub kind: PreviewKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub display_size: DisplaySize,
}

/// Connects one upload field to its host form.
///
/// The adapter is the only owner of the item list. External resets come in
/// through [`FieldAdapter::on_external_value_changed`]; user actions through
/// [`FieldAdapter::drop_files`] and [`FieldAdapter::clear`]; upload reports
/// through [`FieldAdapter::handle_event`]. Uploads are spawned on the current
/// tokio runtime.
///
/// A host value equal to the last one seen is treated as an echo and does not
/// discard pending items.
pub struct FieldAdapter<H: FieldHost> {
    config: UploadConfig,
    reconciler: ItemReconciler,
    transport: Arc<dyn UploadTransport>,
    host: H,
    items: Vec<UploadItem>,
    observed: FieldValue,
    controllers: HashMap<FileId, UploadItemController>,
    /// Uploads still running whose item left the list.
    detached: HashSet<FileId>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
}

impl<H: FieldHost> FieldAdapter<H> {
    pub fn new(
        config: UploadConfig,
        transport: Arc<dyn UploadTransport>,
        host: H,
        value: FieldValue,
    ) -> Self {
        let reconciler = ItemReconciler::new(&config);
        let observed = value.coerce(reconciler.mode());
        let items = reconciler.seed(&observed);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            reconciler,
            transport,
            host,
            items,
            observed,
            controllers: HashMap::new(),
            detached: HashSet::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn from_property(
        property: &FieldProperty,
        transport: Arc<dyn UploadTransport>,
        host: H,
        value: FieldValue,
    ) -> Result<Self, ConfigError> {
        let config = UploadConfig::from_property(property)?;
        Ok(Self::new(config, transport, host, value))
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    /// Last value seen from or sent to the host.
    pub fn value(&self) -> &FieldValue {
        &self.observed
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn has_uploads_in_flight(&self) -> bool {
        self.controllers
            .values()
            .any(UploadItemController::is_uploading)
    }

    /// The host's value changed. A value equal to the last one seen (for
    /// instance the echo of our own `on_change`) is ignored; anything else
    /// re-seeds the list and drops local pending items.
    pub fn on_external_value_changed(&mut self, value: FieldValue) {
        let value = value.coerce(self.reconciler.mode());
        if value == self.observed {
            return;
        }
        let abandoned = self.items.iter().filter(|item| item.is_pending()).count();
        debug!(abandoned, "external value changed, re-seeding");
        self.items = self.reconciler.seed(&value);
        self.observed = value;
        self.sync_controllers();
    }

    pub fn drop_files(&mut self, files: Vec<FileHandle>) {
        if files.is_empty() {
            return;
        }
        let items = self.reconciler.add_files(&self.items, &files);
        self.commit(items, true);
    }

    pub fn clear(&mut self, reference: &str) {
        let items = self.reconciler.clear(&self.items, reference);
        self.commit(items, true);
    }

    /// Applies one report from an upload task. Uploads whose item is no longer
    /// in the list leave the value alone, but their failures are still
    /// notified.
    pub fn handle_event(&mut self, event: ControllerEvent) {
        let Some(controller) = self.controllers.get_mut(&event.file()) else {
            self.handle_detached(event);
            return;
        };
        match controller.apply(event) {
            Some(ControllerOutcome::Resolved {
                reference,
                file,
                metadata,
            }) => {
                let items = self
                    .reconciler
                    .complete_upload(&self.items, &reference, &file, metadata);
                self.commit(items, false);
            }
            Some(ControllerOutcome::Failed(notification)) => self.host.notify(notification),
            None => {}
        }
    }

    fn handle_detached(&mut self, event: ControllerEvent) {
        if !event.is_terminal() || !self.detached.remove(&event.file()) {
            return;
        }
        match event {
            ControllerEvent::Failed { file, message } => {
                warn!(%file, error = %message, "abandoned upload failed");
                self.host.notify(Notification::upload_failed(message));
            }
            ControllerEvent::Completed { file, reference } => {
                debug!(%file, %reference, "ignoring completion of abandoned upload");
            }
            ControllerEvent::Progress { .. } => {}
        }
    }

    pub async fn next_event(&mut self) -> Option<ControllerEvent> {
        self.events_rx.recv().await
    }

    /// Applies every report already queued, without waiting.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Applies reports until no upload is still running, including uploads
    /// whose item was dropped from the list.
    pub async fn run_until_idle(&mut self) {
        while self.has_uploads_in_flight() || !self.detached.is_empty() {
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    pub fn preview(&self) -> Vec<PreviewEntry> {
        self.items
            .iter()
            .filter_map(|item| {
                if let Some(reference) = item.reference() {
                    return Some(PreviewEntry {
                        identity_key: format!("storage_preview_{reference}"),
                        kind: PreviewKind::Resolved,
                        stored_reference: Some(reference.to_string()),
                        percent_complete: None,
                        error_message: None,
                        display_size: item.display_size,
                    });
                }
                let file = item.pending_file.as_ref()?;
                let controller = self.controllers.get(&file.id());
                Some(PreviewEntry {
                    identity_key: format!("storage_upload_{}", file.id()),
                    kind: PreviewKind::Pending,
                    stored_reference: None,
                    percent_complete: controller.and_then(UploadItemController::percent_complete),
                    error_message: controller
                        .and_then(UploadItemController::error_message)
                        .map(str::to_string),
                    display_size: item.display_size,
                })
            })
            .collect()
    }

    fn commit(&mut self, items: Vec<UploadItem>, user_initiated: bool) {
        self.items = items;
        self.sync_controllers();
        if user_initiated {
            self.host.on_touched();
        }
        let projected = self.reconciler.project(&self.items);
        if projected != self.observed {
            self.observed = projected.clone();
            self.host.on_change(projected);
        }
    }

    /// Keeps exactly one controller per file still in the list and starts the
    /// ones for pending items. Starting is one-shot per controller.
    fn sync_controllers(&mut self) {
        let live: HashSet<FileId> = self.items.iter().filter_map(UploadItem::file_id).collect();
        let detached = &mut self.detached;
        self.controllers.retain(|id, controller| {
            if live.contains(id) {
                return true;
            }
            if controller.is_uploading() {
                debug!(file = %id, "upload abandoned while in flight");
                detached.insert(*id);
            }
            false
        });

        let settings = self.config.settings();
        for item in self.items.iter().filter(|item| item.is_pending()) {
            let Some(file) = item.pending_file.as_ref() else {
                continue;
            };
            let controller = self
                .controllers
                .entry(file.id())
                .or_insert_with(|| UploadItemController::new(file.clone(), settings.clone()));
            controller.start(self.transport.clone(), self.events_tx.clone());
        }
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
