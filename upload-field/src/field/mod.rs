//! The upload field: item model, merge rules, per-file upload controllers and
//! the adapter that ties them to a host form.

pub mod adapter;
pub mod config;
pub mod controller;
pub mod host;
pub mod item;
pub mod reconciler;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::{FieldAdapter, PreviewEntry, PreviewKind};
pub use config::{ConfigError, FieldMode, FieldProperty, StorageSettings, UploadConfig};
pub use controller::{ControllerEvent, ControllerOutcome, UploadItemController, UploadState};
pub use host::{FieldHost, Notification, NotificationLevel};
pub use item::{DisplaySize, FileHandle, FileId, FileSource, UploadItem, UploadMetadata};
pub use reconciler::{ItemReconciler, dedup};
pub use value::FieldValue;
