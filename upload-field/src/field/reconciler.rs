//! Pure merge logic for the field's item list.
//!
//! Every operation takes the current list and returns a new one; nothing here
//! talks to storage or to the host form. Results always pass through [`dedup`],
//! so no two items share a stored reference or a pending file.

use std::collections::HashSet;

use super::config::{FieldMode, UploadConfig};
use super::item::{DisplaySize, FileHandle, FileId, UploadItem, UploadMetadata};
use super::value::FieldValue;

#[derive(Debug, Clone)]
pub struct ItemReconciler {
    mode: FieldMode,
    metadata: Option<UploadMetadata>,
    display_size: DisplaySize,
}

impl ItemReconciler {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            mode: config.mode(),
            metadata: config.settings().metadata.clone(),
            display_size: config.display_size(),
        }
    }

    pub fn mode(&self) -> FieldMode {
        self.mode
    }

    /// Builds the list from the host's value.
    ///
    /// The external value is the source of truth: whatever was pending locally
    /// is discarded. An upload still in flight keeps running in its transport,
    /// but its item disappears and its completion is no longer reflected.
    pub fn seed(&self, value: &FieldValue) -> Vec<UploadItem> {
        let items = value
            .clone()
            .coerce(self.mode)
            .references()
            .into_iter()
            .map(|reference| {
                UploadItem::resolved(reference, self.metadata.clone(), self.display_size)
            })
            .collect();
        dedup(items)
    }

    /// Single mode replaces the whole list with the first file; multi mode
    /// appends one pending item per file. An empty drop leaves the list as is.
    pub fn add_files(&self, existing: &[UploadItem], files: &[FileHandle]) -> Vec<UploadItem> {
        let items = match self.mode {
            FieldMode::Single => match files.first() {
                Some(file) => vec![self.pending(file)],
                None => existing.to_vec(),
            },
            FieldMode::Multiple => existing
                .iter()
                .cloned()
                .chain(files.iter().map(|file| self.pending(file)))
                .collect(),
        };
        dedup(items)
    }

    /// Records a finished upload. The item holding `file` is updated first;
    /// failing that, the item already stored at `reference` (a re-upload to
    /// the same path). Without either, a new item is added.
    pub fn complete_upload(
        &self,
        existing: &[UploadItem],
        reference: &str,
        file: &FileHandle,
        metadata: Option<UploadMetadata>,
    ) -> Vec<UploadItem> {
        let mut items = existing.to_vec();
        let position = items
            .iter()
            .position(|item| item.pending_file.as_ref() == Some(file))
            .or_else(|| {
                items
                    .iter()
                    .position(|item| item.reference() == Some(reference))
            });

        match position {
            Some(index) => {
                let item = &mut items[index];
                item.stored_reference = Some(reference.to_string());
                item.pending_file = Some(file.clone());
                item.metadata = metadata.clone();
            }
            None => {
                let item = UploadItem {
                    stored_reference: Some(reference.to_string()),
                    pending_file: Some(file.clone()),
                    metadata: metadata.clone(),
                    display_size: self.display_size,
                };
                match self.mode {
                    FieldMode::Single => items = vec![item],
                    FieldMode::Multiple => items.push(item),
                }
            }
        }

        let mut items = dedup(items);
        // An earlier item may already own `reference`; it survives dedup and
        // takes over the file so a repeated completion lands on the same item.
        if let Some(survivor) = items
            .iter_mut()
            .find(|item| item.reference() == Some(reference))
        {
            survivor.pending_file = Some(file.clone());
            survivor.metadata = metadata;
        }
        items
    }

    pub fn clear(&self, existing: &[UploadItem], reference: &str) -> Vec<UploadItem> {
        match self.mode {
            FieldMode::Single => Vec::new(),
            FieldMode::Multiple => dedup(
                existing
                    .iter()
                    .filter(|item| item.reference() != Some(reference))
                    .cloned()
                    .collect(),
            ),
        }
    }

    /// External value for `items`. Pending items contribute nothing.
    pub fn project(&self, items: &[UploadItem]) -> FieldValue {
        let mut references = items.iter().filter_map(UploadItem::reference);
        match self.mode {
            FieldMode::Single => FieldValue::Single(references.next().map(str::to_string)),
            FieldMode::Multiple => FieldValue::Multiple(references.map(str::to_string).collect()),
        }
    }

    fn pending(&self, file: &FileHandle) -> UploadItem {
        UploadItem::pending(file.clone(), self.metadata.clone(), self.display_size)
    }
}

/// Keeps the first item per stored reference and per pending file, in order,
/// and drops items with neither.
pub fn dedup(items: Vec<UploadItem>) -> Vec<UploadItem> {
    let mut references: HashSet<String> = HashSet::new();
    let mut files: HashSet<FileId> = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            if item.is_garbage() {
                return false;
            }
            let reference_taken = item
                .reference()
                .is_some_and(|reference| references.contains(reference));
            let file_taken = item.file_id().is_some_and(|id| files.contains(&id));
            if reference_taken || file_taken {
                return false;
            }
            if let Some(reference) = item.reference() {
                references.insert(reference.to_string());
            }
            if let Some(id) = item.file_id() {
                files.insert(id);
            }
            true
        })
        .collect()
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
