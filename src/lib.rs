//! # Housing Features
//!
//! A schema-driven feature transformation pipeline for housing price data, built on
//! [Apache DataFusion](https://datafusion.apache.org/).
//!
//! The crate prepares a train/test split for model training:
//!
//! - missing values are imputed (median for numeric columns, most frequent value for categorical ones),
//! - household ratio features are derived ([`transformers::feature_generator::FeatureGenerator`]),
//! - categorical columns are one-hot encoded,
//! - all features are standardized.
//!
//! The stages are composed into a [`column_transformer::ColumnTransformer`] whose numeric and
//! categorical branches are fitted independently. [`data_transformation::DataTransformation`]
//! fits it on the training data, applies it to both splits, and persists the resulting arrays
//! together with the fitted transformer, which is reused unchanged at inference time.
//!
//! Set `DEBUG_HOUSING_FEATURES=true` to enable debug logging.

pub mod column_transformer;
pub mod data_transformation;
pub mod exceptions;
pub mod housing_data;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod settings;
pub mod transformers;
pub mod util;

pub use column_transformer::ColumnTransformer;
pub use data_transformation::DataTransformation;
pub use exceptions::{ErrorKind, HousingError, HousingResult};
pub use schema::DatasetSchema;
