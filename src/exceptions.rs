//! ## Errors for Housing Features
//!
//! This module defines the single error type used throughout the crate.
//! [`HousingError`] is derived with `thiserror` and wraps the errors of the underlying libraries
//! (I/O, DataFusion, Arrow, Parquet, bincode, YAML) as well as the domain failures of the pipeline.
//!
//! Every error is classified into one of three [`ErrorKind`]s with [`HousingError::kind`]:
//! configuration defects, I/O defects, and failures while fitting or applying a transformation.
//! Public operations attach context to failures with [`ResultExt::context`]; the original error is
//! kept as the `source` of the wrapping error, so callers see one consistent error surface.
//!
//! ### Example
//!
//! ```rust
//! use housing_features::exceptions::{ErrorKind, HousingError, HousingResult, ResultExt};
//!
//! fn read_schema() -> HousingResult<()> {
//!     Err(HousingError::Configuration("missing key 'target_column'".into()))
//! }
//!
//! let err = read_schema().context("building data transformer").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Configuration);
//! ```

use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use thiserror::Error;

/// Classification of a [`HousingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The schema or configuration does not describe the data (missing keys, missing columns).
    Configuration,
    /// A file could not be read or written, or an object could not be (de)serialized.
    Io,
    /// A pipeline stage failed while fitting or transforming data.
    Transform,
}

/// Errors specific to the Housing Features library.
#[derive(Debug, Error)]
pub enum HousingError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps errors from Parquet.
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Wraps errors from the binary object serializer.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    /// Wraps errors raised while parsing YAML schema or configuration files.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// The schema or configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Indicates that the specified column does not exist in the DataFrame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Indicates that an invalid parameter was provided or a computed statistic is unusable.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Indicates that the provided file format is unsupported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A category that was not seen during fit reached a one-hot encoder.
    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    /// The branches of a composite transformer produced different numbers of rows.
    #[error("Row count mismatch: expected {expected} rows, got {got}")]
    RowCountMismatch { expected: usize, got: usize },

    /// Indicates the transform method was called before calling fit for a stateful transformer.
    #[error("Transform called before fit for stateful transformer")]
    FitNotCalled,

    /// Adds context to an underlying error, which is kept as the source.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<HousingError>,
    },
}

impl HousingError {
    /// Returns the classification of this error.
    /// For a [`HousingError::Context`] the kind of the wrapped error is returned.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HousingError::IoError(_)
            | HousingError::ParquetError(_)
            | HousingError::SerializationError(_)
            | HousingError::UnsupportedFormat(_) => ErrorKind::Io,
            HousingError::DataFusionError(e) => chain_kind(e),
            HousingError::ArrowError(e) => chain_kind(e),
            HousingError::YamlError(_)
            | HousingError::Configuration(_)
            | HousingError::MissingColumn(_) => ErrorKind::Configuration,
            HousingError::InvalidParameter(_)
            | HousingError::UnknownCategory { .. }
            | HousingError::RowCountMismatch { .. }
            | HousingError::FitNotCalled => ErrorKind::Transform,
            HousingError::Context { source, .. } => source.kind(),
        }
    }

    /// Returns the innermost error, skipping all context layers.
    pub fn root_cause(&self) -> &HousingError {
        match self {
            HousingError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Wraps this error with a context message.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        HousingError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Classifies a library error by the reader failures anywhere in its source chain.
///
/// DataFusion wraps scan failures (malformed CSV rows, corrupt Parquet footers) in context and
/// Arrow layers, so the top-level variant alone does not tell a bad file from a bad plan.
fn chain_kind(err: &(dyn std::error::Error + 'static)) -> ErrorKind {
    let mut current = Some(err);
    while let Some(e) = current {
        let is_io = e.is::<std::io::Error>()
            || e.is::<parquet::errors::ParquetError>()
            || matches!(e.downcast_ref::<DataFusionError>(), Some(DataFusionError::IoError(_)))
            || matches!(
                e.downcast_ref::<ArrowError>(),
                Some(
                    ArrowError::CsvError(_)
                        | ArrowError::ParquetError(_)
                        | ArrowError::IoError(_, _)
                )
            );
        if is_io {
            return ErrorKind::Io;
        }
        current = e.source();
    }
    ErrorKind::Transform
}

/// A convenient result type for Housing Features operations.
pub type HousingResult<T> = std::result::Result<T, HousingError>;

/// Extension methods to attach context to fallible operations.
pub trait ResultExt<T> {
    /// Converts the error into a [`HousingError`] and wraps it with `context`.
    fn context(self, context: impl Into<String>) -> HousingResult<T>;

    /// Like [`ResultExt::context`], but only builds the message on failure.
    fn with_context<C, F>(self, f: F) -> HousingResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<HousingError>,
{
    fn context(self, context: impl Into<String>) -> HousingResult<T> {
        self.map_err(|e| {
            let err: HousingError = e.into();
            err.with_context(context)
        })
    }

    fn with_context<C, F>(self, f: F) -> HousingResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            let err: HousingError = e.into();
            err.with_context(f())
        })
    }
}
