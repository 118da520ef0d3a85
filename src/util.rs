//! ## I/O helpers
//!
//! Loading of schema-conformant tables and persistence of transformed arrays and fitted objects.
//!
//! - Tables are read with DataFusion from CSV or Parquet files and coerced to the schema:
//!   numerical and target columns become `Float64`, categorical columns `Utf8`.
//! - Arrays are written as Parquet files of `Float64` columns.
//! - Objects are written with `bincode`, which round-trips `f64` values (including `NaN`) exactly.

use crate::exceptions::{HousingError, HousingResult, ResultExt};
use crate::schema::DatasetSchema;
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use datafusion_expr::{cast, ident, Expr};
use datafusion::prelude::*;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Extension of files written by [`save_array`].
pub const ARRAY_FILE_EXTENSION: &str = "parquet";

/// Creates a session that executes plans on a single partition.
///
/// The composite transformer materializes each branch separately and joins the results by
/// position, so every plan must return rows in input order.
pub fn session_context() -> SessionContext {
    let config = SessionConfig::new()
        .with_target_partitions(1)
        .with_repartition_file_scans(false);
    SessionContext::new_with_config(config)
}

/// Loads a table and coerces it to `schema`.
///
/// The result holds the numerical, categorical and target columns, in that order, and is cached
/// in memory. Columns not named by the schema are dropped.
pub async fn load_table(
    ctx: &SessionContext,
    file_path: impl AsRef<Path>,
    schema: &DatasetSchema,
) -> HousingResult<DataFrame> {
    let file_path = file_path.as_ref();
    if !file_path.is_file() {
        return Err(HousingError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Data file '{}' does not exist", file_path.display()),
        )));
    }
    let path = file_path.to_string_lossy().to_string();
    let reading = || format!("reading table '{}'", file_path.display());
    let df = match file_path.extension().and_then(|e| e.to_str()) {
        Some("csv") => ctx
            .read_csv(path.as_str(), CsvReadOptions::new())
            .await
            .with_context(reading)?,
        Some("parquet") => ctx
            .read_parquet(path.as_str(), ParquetReadOptions::default())
            .await
            .with_context(reading)?,
        other => {
            return Err(HousingError::UnsupportedFormat(format!(
                "Cannot load '{}' (extension {:?}); expected a CSV or Parquet file",
                file_path.display(),
                other
            )))
        }
    };

    let mut exprs: Vec<Expr> = Vec::new();
    let typed = schema
        .numerical_columns
        .iter()
        .map(|c| (c, DataType::Float64))
        .chain(schema.categorical_columns.iter().map(|c| (c, DataType::Utf8)))
        .chain(std::iter::once((&schema.target_column, DataType::Float64)));
    for (name, data_type) in typed {
        if df.schema().field_with_name(None, name).is_err() {
            return Err(HousingError::MissingColumn(format!(
                "Column '{}' declared in the schema is missing from '{}'",
                name,
                file_path.display()
            )));
        }
        exprs.push(cast(ident(name), data_type).alias(name));
    }
    let df = df.select(exprs)?.cache().await.with_context(reading)?;
    debug!(path = %file_path.display(), "table loaded");
    Ok(df)
}

/// Loads a table, validating and coercing it against the schema stored at `schema_file_path`.
pub async fn load_data(
    ctx: &SessionContext,
    file_path: impl AsRef<Path>,
    schema_file_path: impl AsRef<Path>,
) -> HousingResult<DataFrame> {
    let schema = DatasetSchema::from_yaml_file(schema_file_path)?;
    load_table(ctx, file_path, &schema).await
}

/// Collects a DataFrame into a single record batch.
pub async fn collect_batch(df: DataFrame) -> HousingResult<RecordBatch> {
    let schema: SchemaRef = Arc::new(df.schema().as_arrow().clone());
    let batches = df.collect().await?;
    let schema = batches.first().map(|b| b.schema()).unwrap_or(schema);
    Ok(concat_batches(&schema, &batches)?)
}

/// Concatenates record batches horizontally. All batches must have the same number of rows.
pub fn hstack(batches: &[RecordBatch]) -> HousingResult<RecordBatch> {
    let expected = batches.first().map(|b| b.num_rows()).unwrap_or(0);
    let mut fields = Vec::new();
    let mut columns = Vec::new();
    for batch in batches {
        if batch.num_rows() != expected {
            return Err(HousingError::RowCountMismatch {
                expected,
                got: batch.num_rows(),
            });
        }
        fields.extend(batch.schema().fields().iter().cloned());
        columns.extend(batch.columns().iter().cloned());
    }
    let schema = Arc::new(Schema::new(fields));
    let options = arrow::record_batch::RecordBatchOptions::new().with_row_count(Some(expected));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

fn create_parent_dir(path: &Path) -> HousingResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes an array to a Parquet file, creating parent directories as needed.
pub fn save_array(file_path: impl AsRef<Path>, array: &RecordBatch) -> HousingResult<()> {
    let file_path = file_path.as_ref();
    let write = || -> HousingResult<()> {
        create_parent_dir(file_path)?;
        let file = File::create(file_path)?;
        let mut writer = ArrowWriter::try_new(file, array.schema(), None)?;
        writer.write(array)?;
        writer.close()?;
        Ok(())
    };
    write().with_context(|| format!("saving array to '{}'", file_path.display()))
}

/// Reads an array written by [`save_array`].
pub fn load_array(file_path: impl AsRef<Path>) -> HousingResult<RecordBatch> {
    let file_path = file_path.as_ref();
    let read = || -> HousingResult<RecordBatch> {
        let file = File::open(file_path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
        Ok(concat_batches(&schema, &batches)?)
    };
    read().with_context(|| format!("loading array from '{}'", file_path.display()))
}

/// Serializes an object to a binary file, creating parent directories as needed.
pub fn save_object<T: Serialize>(file_path: impl AsRef<Path>, obj: &T) -> HousingResult<()> {
    let file_path = file_path.as_ref();
    let write = || -> HousingResult<()> {
        create_parent_dir(file_path)?;
        let mut writer = BufWriter::new(File::create(file_path)?);
        bincode::serialize_into(&mut writer, obj)?;
        std::io::Write::flush(&mut writer)?;
        Ok(())
    };
    write().with_context(|| format!("saving object to '{}'", file_path.display()))
}

/// Deserializes an object written by [`save_object`].
pub fn load_object<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> HousingResult<T> {
    let file_path = file_path.as_ref();
    let read = || -> HousingResult<T> {
        let reader = BufReader::new(File::open(file_path)?);
        Ok(bincode::deserialize_from(reader)?)
    };
    read().with_context(|| format!("loading object from '{}'", file_path.display()))
}
