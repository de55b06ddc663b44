use thiserror::Error;

const NAME_PLACEHOLDER: &str = "{name}";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("destination path is empty")]
    Empty,
    #[error("file name is empty")]
    EmptyFileName,
    #[error("destination path contains unsupported component")]
    UnsupportedComponent,
}

/// Storage path for `file_name` under `template`.
///
/// A template with `{name}` gets the file name substituted; any other template
/// is a folder the file name is appended to.
pub fn destination_path(template: &str, file_name: &str) -> Result<String, PathError> {
    if file_name.is_empty() {
        return Err(PathError::EmptyFileName);
    }
    if file_name.contains('/') || file_name == ".." {
        return Err(PathError::UnsupportedComponent);
    }

    let raw = if template.contains(NAME_PLACEHOLDER) {
        template.replace(NAME_PLACEHOLDER, file_name)
    } else {
        format!("{}/{}", template.trim_end_matches('/'), file_name)
    };

    // Storage paths are POSIX-like and relative to the bucket root.
    let mut parts = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(PathError::UnsupportedComponent),
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(parts.join("/"))
}
