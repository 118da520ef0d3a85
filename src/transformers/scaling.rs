//! ## Standardization
//!
//! [`StandardScaler`] rescales numeric columns to unit variance and, optionally, zero mean:
//!
//! ```text
//! z = (x - mean) / std      with_mean = true
//! z = x / std               with_mean = false
//! ```
//!
//! `std` is the population standard deviation learned at fit time. A column with zero variance
//! keeps a scale of 1. Without mean-centering, zeros stay zeros, which keeps one-hot indicator
//! columns meaningful.
//!
//! By default every column present at fit time is scaled; [`StandardScaler::with_columns`]
//! restricts the scaler to a subset.

use crate::exceptions::{HousingError, HousingResult};
use crate::impl_transformer;
use crate::transformers::{column_names, first_row_f64, validate_columns};
use datafusion::arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{avg, stddev_pop};
use datafusion::prelude::*;
use datafusion_expr::{cast, ident, lit, Expr};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Learned parameters of one scaled column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: String,
    pub mean: f64,
    pub scale: f64,
}

/// Standardizes numeric columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Columns to scale; `None` scales every column seen at fit time.
    pub columns: Option<Vec<String>>,
    pub with_mean: bool,
    /// Parameters learned by `fit`, in column order.
    pub scales: Vec<ColumnScale>,
    fitted: bool,
}

impl StandardScaler {
    /// Create a scaler that centers and scales all columns.
    pub fn new() -> Self {
        Self {
            columns: None,
            with_mean: true,
            scales: Vec::new(),
            fitted: false,
        }
    }

    /// Restrict scaling to `columns`.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Enable or disable mean-centering.
    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.with_mean = with_mean;
        self
    }

    /// Computes the mean and population standard deviation of every target column in one query.
    pub async fn fit(&mut self, df: &DataFrame) -> HousingResult<()> {
        let targets = match &self.columns {
            Some(cols) => {
                validate_columns(df, cols)?;
                cols.clone()
            }
            None => column_names(df),
        };
        if targets.is_empty() {
            self.scales = Vec::new();
            self.fitted = true;
            return Ok(());
        }

        let mut aggs: Vec<Expr> = Vec::with_capacity(targets.len() * 2);
        for (i, name) in targets.iter().enumerate() {
            let value = cast(ident(name), DataType::Float64);
            aggs.push(avg(value.clone()).alias(format!("mean_{}", i)));
            aggs.push(stddev_pop(value).alias(format!("std_{}", i)));
        }
        let batches = df.clone().aggregate(vec![], aggs)?.collect().await?;

        let mut scales = Vec::with_capacity(targets.len());
        for (i, name) in targets.into_iter().enumerate() {
            let missing = || {
                HousingError::InvalidParameter(format!(
                    "Cannot standardize column '{}': it has no observed values",
                    name
                ))
            };
            let mean = first_row_f64(&batches, 2 * i)?.ok_or_else(missing)?;
            let std = first_row_f64(&batches, 2 * i + 1)?.ok_or_else(missing)?;
            let scale = if std == 0.0 { 1.0 } else { std };
            debug!(column = %name, mean, scale, "scale learned");
            scales.push(ColumnScale {
                column: name,
                mean,
                scale,
            });
        }
        self.scales = scales;
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame with every fitted column standardized (as `Float64`).
    /// Other columns are kept as they are.
    pub fn transform(&self, df: DataFrame) -> HousingResult<DataFrame> {
        if !self.fitted {
            return Err(HousingError::FitNotCalled);
        }
        let fitted: Vec<String> = self.scales.iter().map(|s| s.column.clone()).collect();
        validate_columns(&df, &fitted)?;

        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                match self.scales.iter().find(|s| &s.column == name) {
                    Some(s) => {
                        let value = cast(ident(name), DataType::Float64);
                        let centered = if self.with_mean {
                            value - lit(s.mean)
                        } else {
                            value
                        };
                        (centered / lit(s.scale)).alias(name)
                    }
                    None => ident(name),
                }
            })
            .collect();
        df.select(exprs).map_err(HousingError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl_transformer!(StandardScaler);
