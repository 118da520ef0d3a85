//! ## Settings and Artifacts
//!
//! Configuration consumed by the data transformation stage and the artifacts it exchanges with
//! the stages around it. Configuration can be loaded from a YAML file; artifacts are plain records.

use crate::exceptions::{HousingResult, ResultExt};
use crate::transformers::categorical_encoding::HandleUnknown;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration of the data transformation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransformationConfig {
    /// Whether the feature generator appends `bedrooms_per_room`.
    #[serde(default = "default_add_bedroom_per_room")]
    pub add_bedroom_per_room: bool,
    /// Directory of the transformed training array.
    pub transformed_train_dir: PathBuf,
    /// Directory of the transformed test array.
    pub transformed_test_dir: PathBuf,
    /// File of the persisted (fitted) preprocessing object.
    pub preprocessed_object_file_path: PathBuf,
    /// Policy for categories not seen while fitting the one-hot encoder.
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
}

fn default_add_bedroom_per_room() -> bool {
    true
}

impl DataTransformationConfig {
    /// Reads the configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> HousingResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file '{}'", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("parsing configuration file '{}'", path.display()))
    }
}

/// Output of the ingestion stage: where the train/test split was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// Output of the validation stage: the schema the split was validated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    pub schema_file_path: PathBuf,
}

/// Result of a successful data transformation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    pub is_transformed: bool,
    pub message: String,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub preprocessed_object_file_path: PathBuf,
}

impl fmt::Display for DataTransformationArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DataTransformationArtifact(is_transformed={}, message='{}', transformed_train_file_path='{}', \
             transformed_test_file_path='{}', preprocessed_object_file_path='{}')",
            self.is_transformed,
            self.message,
            self.transformed_train_file_path.display(),
            self.transformed_test_file_path.display(),
            self.preprocessed_object_file_path.display()
        )
    }
}
