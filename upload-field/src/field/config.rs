use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::item::{DisplaySize, UploadMetadata};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("storage field using array must have elements of data type string, got {0}")]
    ArrayElementNotString(String),
    #[error("storage field using array must declare its element property")]
    MissingArrayElement,
    #[error("storage field must be of data type string or array, got {0}")]
    UnsupportedDataType(String),
    #[error("storage settings must be specified")]
    MissingStorageSettings,
    #[error("storage path must not be empty")]
    EmptyStoragePath,
    #[error("invalid field property: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where and how files of a field are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    /// Destination folder, or a template containing `{name}`.
    pub storage_path: String,
    #[serde(default)]
    pub accepted_files: Vec<String>,
    #[serde(default)]
    pub metadata: Option<UploadMetadata>,
    /// Store the download URL instead of the storage path.
    #[serde(default)]
    pub store_url: bool,
}

/// Field description as the host form declares it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldProperty {
    pub data_type: String,
    #[serde(default)]
    pub storage_meta: Option<StorageSettings>,
    #[serde(default)]
    pub of: Option<Box<FieldProperty>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    Single,
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadConfig {
    Single(StorageSettings),
    Multiple(StorageSettings),
}

impl UploadConfig {
    pub fn from_property(property: &FieldProperty) -> Result<Self, ConfigError> {
        let config = match property.data_type.as_str() {
            "string" => UploadConfig::Single(
                property
                    .storage_meta
                    .clone()
                    .ok_or(ConfigError::MissingStorageSettings)?,
            ),
            "array" => {
                let element = property
                    .of
                    .as_deref()
                    .ok_or(ConfigError::MissingArrayElement)?;
                if element.data_type != "string" {
                    return Err(ConfigError::ArrayElementNotString(
                        element.data_type.clone(),
                    ));
                }
                UploadConfig::Multiple(
                    element
                        .storage_meta
                        .clone()
                        .ok_or(ConfigError::MissingStorageSettings)?,
                )
            }
            other => return Err(ConfigError::UnsupportedDataType(other.to_string())),
        };
        if config.settings().storage_path.trim().is_empty() {
            return Err(ConfigError::EmptyStoragePath);
        }
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let property: FieldProperty = serde_json::from_str(raw)?;
        Self::from_property(&property)
    }

    pub fn mode(&self) -> FieldMode {
        match self {
            UploadConfig::Single(_) => FieldMode::Single,
            UploadConfig::Multiple(_) => FieldMode::Multiple,
        }
    }

    pub fn is_multiple(&self) -> bool {
        self.mode() == FieldMode::Multiple
    }

    pub fn settings(&self) -> &StorageSettings {
        match self {
            UploadConfig::Single(settings) | UploadConfig::Multiple(settings) => settings,
        }
    }

    pub fn display_size(&self) -> DisplaySize {
        match self.mode() {
            FieldMode::Single => DisplaySize::Regular,
            FieldMode::Multiple => DisplaySize::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_property_resolves_to_single() {
        let config = UploadConfig::from_json(
            r#"{"dataType":"string","storageMeta":{"storagePath":"images","storeUrl":true}}"#,
        )
        .unwrap();
        assert_eq!(config.mode(), FieldMode::Single);
        assert_eq!(config.display_size(), DisplaySize::Regular);
        assert_eq!(config.settings().storage_path, "images");
        assert!(config.settings().store_url);
        assert!(config.settings().accepted_files.is_empty());
    }

    #[test]
    fn array_of_strings_resolves_to_multiple() {
        let config = UploadConfig::from_json(
            r#"{
                "dataType": "array",
                "of": {
                    "dataType": "string",
                    "storageMeta": {
                        "storagePath": "gallery",
                        "acceptedFiles": ["image/*"],
                        "metadata": {"cacheControl": "max-age=1000000"}
                    }
                }
            }"#,
        )
        .unwrap();
        assert!(config.is_multiple());
        assert_eq!(config.display_size(), DisplaySize::Compact);
        assert_eq!(config.settings().accepted_files, vec!["image/*".to_string()]);
        assert_eq!(
            config
                .settings()
                .metadata
                .as_ref()
                .and_then(|m| m.cache_control.as_deref()),
            Some("max-age=1000000")
        );
    }

    #[test]
    fn array_of_numbers_is_rejected() {
        let err = UploadConfig::from_json(r#"{"dataType":"array","of":{"dataType":"number"}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ArrayElementNotString(kind) if kind == "number"));
    }

    #[test]
    fn array_without_element_is_rejected() {
        let err = UploadConfig::from_json(r#"{"dataType":"array"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingArrayElement));
    }

    #[test]
    fn missing_storage_settings_is_rejected() {
        let err = UploadConfig::from_json(r#"{"dataType":"string"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingStorageSettings));

        let err = UploadConfig::from_json(r#"{"dataType":"array","of":{"dataType":"string"}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingStorageSettings));
    }

    #[test]
    fn blank_storage_path_is_rejected() {
        let err = UploadConfig::from_json(
            r#"{"dataType":"string","storageMeta":{"storagePath":"  "}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyStoragePath));
    }

    #[test]
    fn other_data_types_are_rejected() {
        let err = UploadConfig::from_json(r#"{"dataType":"map"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDataType(kind) if kind == "map"));

        let err = UploadConfig::from_json("{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
