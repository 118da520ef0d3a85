//! ## Dataset Schema
//!
//! The schema declares the role of each column of the housing dataset: numerical features,
//! categorical features, and the target. It is read from a YAML file, for example:
//!
//! ```yaml
//! numerical_columns:
//!   - longitude
//!   - latitude
//!   - total_rooms
//! categorical_columns:
//!   - ocean_proximity
//! target_column: median_house_value
//! ```
//!
//! Other keys in the file (column dtypes, domain values) are ignored.

use crate::exceptions::{HousingError, HousingResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Key of the numerical column list in the schema file.
pub const NUMERICAL_COLUMN_KEY: &str = "numerical_columns";
/// Key of the categorical column list in the schema file.
pub const CATEGORICAL_COLUMN_KEY: &str = "categorical_columns";
/// Key of the target column name in the schema file.
pub const TARGET_COLUMN_KEY: &str = "target_column";

/// Column roles of a tabular dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Ordered numerical feature columns.
    pub numerical_columns: Vec<String>,
    /// Ordered categorical feature columns.
    pub categorical_columns: Vec<String>,
    /// Name of the target column.
    pub target_column: String,
}

impl DatasetSchema {
    /// Creates a schema and validates it.
    pub fn new(
        numerical_columns: Vec<String>,
        categorical_columns: Vec<String>,
        target_column: impl Into<String>,
    ) -> HousingResult<Self> {
        let schema = Self {
            numerical_columns,
            categorical_columns,
            target_column: target_column.into(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Reads and validates a schema from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> HousingResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading schema file '{}'", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("parsing schema file '{}'", path.display()))
    }

    /// Parses and validates a schema from YAML text.
    pub fn from_yaml_str(content: &str) -> HousingResult<Self> {
        let schema: DatasetSchema = serde_yaml::from_str(content)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Checks that the column roles do not overlap and that there is something to transform.
    pub fn validate(&self) -> HousingResult<()> {
        if self.numerical_columns.is_empty() {
            return Err(HousingError::Configuration(format!(
                "'{}' must list at least one column",
                NUMERICAL_COLUMN_KEY
            )));
        }
        let mut seen = HashSet::new();
        for name in self.numerical_columns.iter().chain(&self.categorical_columns) {
            if !seen.insert(name.as_str()) {
                return Err(HousingError::Configuration(format!(
                    "Column '{}' is listed more than once in the schema",
                    name
                )));
            }
        }
        if self.target_column.trim().is_empty() {
            return Err(HousingError::Configuration(format!(
                "'{}' must not be empty",
                TARGET_COLUMN_KEY
            )));
        }
        if seen.contains(self.target_column.as_str()) {
            return Err(HousingError::Configuration(format!(
                "Target column '{}' must not be listed as a feature column",
                self.target_column
            )));
        }
        Ok(())
    }

    /// All feature columns, numerical first.
    pub fn feature_columns(&self) -> Vec<String> {
        self.numerical_columns
            .iter()
            .chain(&self.categorical_columns)
            .cloned()
            .collect()
    }
}
