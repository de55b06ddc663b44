use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a dropped file. Two handles are the same file
/// only when they share this id, regardless of name or contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(u64);

impl FileId {
    fn next() -> Self {
        Self(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A file the user attached to the field. Cloning keeps the identity.
#[derive(Debug, Clone)]
pub struct FileHandle {
    id: FileId,
    name: String,
    content_type: Option<String>,
    source: FileSource,
}

impl FileHandle {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = guess_content_type(&path).map(str::to_string);
        Self {
            id: FileId::next(),
            name,
            content_type,
            source: FileSource::Path(path),
        }
    }

    pub fn from_bytes(
        name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let name = name.into();
        let content_type =
            content_type.or_else(|| guess_content_type(Path::new(&name)).map(str::to_string));
        Self {
            id: FileId::next(),
            name,
            content_type,
            source: FileSource::Memory(bytes.into()),
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FileHandle {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(
        default,
        rename = "customMetadata",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub custom: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySize {
    Compact,
    Regular,
}

/// One entry of the field: either an uploaded reference or a file still on
/// its way to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadItem {
    pub stored_reference: Option<String>,
    pub pending_file: Option<FileHandle>,
    pub metadata: Option<UploadMetadata>,
    pub display_size: DisplaySize,
}

impl UploadItem {
    pub fn resolved(
        reference: impl Into<String>,
        metadata: Option<UploadMetadata>,
        display_size: DisplaySize,
    ) -> Self {
        Self {
            stored_reference: Some(reference.into()),
            pending_file: None,
            metadata,
            display_size,
        }
    }

    pub fn pending(
        file: FileHandle,
        metadata: Option<UploadMetadata>,
        display_size: DisplaySize,
    ) -> Self {
        Self {
            stored_reference: None,
            pending_file: Some(file),
            metadata,
            display_size,
        }
    }

    /// Stored reference, treating an empty string as unset.
    pub fn reference(&self) -> Option<&str> {
        self.stored_reference
            .as_deref()
            .filter(|reference| !reference.is_empty())
    }

    pub fn file_id(&self) -> Option<FileId> {
        self.pending_file.as_ref().map(FileHandle::id)
    }

    pub fn is_resolved(&self) -> bool {
        self.reference().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending_file.is_some() && !self.is_resolved()
    }

    pub fn is_garbage(&self) -> bool {
        self.pending_file.is_none() && !self.is_resolved()
    }
}

fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(content_type)
}
