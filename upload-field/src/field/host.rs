use serde::Serialize;

use super::value::FieldValue;

pub const UPLOAD_ERROR_TITLE: &str = "Error uploading file";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: UPLOAD_ERROR_TITLE.to_string(),
            message: message.into(),
        }
    }
}

/// The form that owns the field value.
pub trait FieldHost {
    /// New value after a local change. `FieldValue::Single(None)` clears a
    /// single-file field.
    fn on_change(&mut self, value: FieldValue);

    /// The user interacted with the field.
    fn on_touched(&mut self);

    fn notify(&mut self, notification: Notification);
}
