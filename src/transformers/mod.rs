//! # Transformer Implementations
//!
//! The submodules contain the pipeline stages used to prepare housing data:
//! imputation, ratio feature generation, one-hot encoding, and standardization.

pub mod categorical_encoding;
pub mod feature_generator;
pub mod imputation;
pub mod scaling;

use crate::exceptions::{HousingError, HousingResult};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;

/// Validates that every column in `target_cols` exists in the DataFrame.
/// Returns an error if any target column is missing.
pub(crate) fn validate_columns(df: &DataFrame, target_cols: &[String]) -> HousingResult<()> {
    let schema = df.schema();
    for col_name in target_cols {
        if schema.field_with_name(None, col_name).is_err() {
            return Err(HousingError::MissingColumn(format!(
                "Column '{}' not found in DataFrame",
                col_name
            )));
        }
    }
    Ok(())
}

/// Names of all columns of the DataFrame, in order.
pub(crate) fn column_names(df: &DataFrame) -> Vec<String> {
    df.schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

/// Reads the value in row 0 of the given column of a single-row aggregate result as `f64`.
/// Returns `None` for a null aggregate (e.g. no non-null input values).
pub(crate) fn first_row_f64(
    batches: &[datafusion::arrow::record_batch::RecordBatch],
    column: usize,
) -> HousingResult<Option<f64>> {
    let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let scalar = ScalarValue::try_from_array(batch.column(column), 0)?;
    match scalar {
        ScalarValue::Float64(v) => Ok(v),
        ScalarValue::Float32(v) => Ok(v.map(f64::from)),
        other if other.is_null() => Ok(None),
        other => Err(HousingError::InvalidParameter(format!(
            "Expected a Float64 aggregate, got {:?}",
            other.data_type()
        ))),
    }
}
