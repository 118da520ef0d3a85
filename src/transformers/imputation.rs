//! ## Transformers for imputing missing values
//!
//! - **MedianImputer**: replaces missing values of numeric columns with the median learned at fit time.
//! - **MostFrequentImputer**: replaces missing values of categorical columns with the most frequent
//!   value learned at fit time. Ties are broken by taking the smallest value, so the result does not
//!   depend on the order of the data.
//!
//! A missing value is a SQL `NULL`. Both imputers keep the column order of their input and leave
//! columns they were not configured for untouched.

use crate::exceptions::{HousingError, HousingResult};
use crate::impl_transformer;
use crate::transformers::{first_row_f64, validate_columns};
use datafusion::arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{count, median};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use datafusion_expr::{cast, col, ident, lit, not, Case as DFCase, Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Constructs an expression equivalent to SQL COALESCE(col, fallback).
/// This is implemented as a CASE expression: if `col` is not null then return it, otherwise return `fallback`.
fn coalesce_expr_for(value: Expr, name: &str, fallback: Expr) -> Expr {
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![(Box::new(not(ident(name).is_null())), Box::new(value))],
        else_expr: Some(Box::new(fallback)),
    })
}

/// Generic helper function to apply a mapping to a set of target columns.
/// For each field in the DataFrame, if its name is in `target_cols` and a mapping is available via `get_fallback`,
/// then the column is replaced by a CASE-WHEN expression; otherwise, the original column is retained.
fn apply_imputation<F>(
    df: DataFrame,
    target_cols: &[String],
    value_type: DataType,
    get_fallback: F,
) -> HousingResult<DataFrame>
where
    F: Fn(&str) -> Option<Expr>,
{
    let exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            if target_cols.contains(name) {
                if let Some(fallback_expr) = get_fallback(name) {
                    let value = cast(ident(name), value_type.clone());
                    coalesce_expr_for(value, name, fallback_expr).alias(name)
                } else {
                    ident(name)
                }
            } else {
                ident(name)
            }
        })
        .collect();
    df.select(exprs).map_err(HousingError::from)
}

/// Replaces missing values with the median value of numeric columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedianImputer {
    pub columns: Vec<String>,
    pub impute_values: BTreeMap<String, f64>,
}

impl MedianImputer {
    /// Create a new median imputer for the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            impute_values: BTreeMap::new(),
        }
    }

    /// Computes the median of every target column in a single aggregate query.
    pub async fn fit(&mut self, df: &DataFrame) -> HousingResult<()> {
        validate_columns(df, &self.columns)?;
        if self.columns.is_empty() {
            return Ok(());
        }
        let aggs: Vec<Expr> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                median(cast(ident(name), DataType::Float64)).alias(format!("median_{}", i))
            })
            .collect();
        let batches = df.clone().aggregate(vec![], aggs)?.collect().await?;

        let mut values = BTreeMap::new();
        for (i, name) in self.columns.iter().enumerate() {
            let median = first_row_f64(&batches, i)?.ok_or_else(|| {
                HousingError::InvalidParameter(format!(
                    "Cannot compute median of column '{}': it has no observed values",
                    name
                ))
            })?;
            debug!(column = %name, median, "median learned");
            values.insert(name.clone(), median);
        }
        self.impute_values = values;
        Ok(())
    }

    /// Returns a new DataFrame where, for each target column, missing values are replaced with the median.
    /// Target columns are returned as `Float64`.
    pub fn transform(&self, df: DataFrame) -> HousingResult<DataFrame> {
        validate_columns(&df, &self.columns)?;
        if self.columns.iter().any(|c| !self.impute_values.contains_key(c)) {
            return Err(HousingError::FitNotCalled);
        }
        apply_imputation(df, &self.columns, DataType::Float64, |name| {
            self.impute_values.get(name).map(|&v| lit(v))
        })
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(MedianImputer);

/// Replaces missing values with the most frequent value of categorical columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MostFrequentImputer {
    pub columns: Vec<String>,
    pub impute_values: BTreeMap<String, String>,
}

impl MostFrequentImputer {
    /// Create a new most-frequent imputer for the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            impute_values: BTreeMap::new(),
        }
    }

    /// For each target column, computes the mode via grouping and counting.
    pub async fn fit(&mut self, df: &DataFrame) -> HousingResult<()> {
        validate_columns(df, &self.columns)?;
        let mut values = BTreeMap::new();
        for col_name in &self.columns {
            let grouped = df
                .clone()
                .select(vec![cast(ident(col_name), DataType::Utf8).alias("value")])?
                .filter(col("value").is_not_null())?
                .aggregate(vec![col("value")], vec![count(col("value")).alias("cnt")])?
                .sort(vec![
                    col("cnt").sort(false, false),
                    col("value").sort(true, false),
                ])?
                .limit(0, Some(1))?;
            let batches = grouped.collect().await?;
            let mode = match batches.iter().find(|b| b.num_rows() > 0) {
                Some(batch) => match ScalarValue::try_from_array(batch.column(0), 0)? {
                    ScalarValue::Utf8(Some(v))
                    | ScalarValue::LargeUtf8(Some(v))
                    | ScalarValue::Utf8View(Some(v)) => v,
                    other => {
                        return Err(HousingError::InvalidParameter(format!(
                            "Failed to compute mode for column {}: got {:?}",
                            col_name, other
                        )))
                    }
                },
                None => {
                    return Err(HousingError::InvalidParameter(format!(
                        "Cannot compute most frequent value of column '{}': it has no observed values",
                        col_name
                    )))
                }
            };
            debug!(column = %col_name, mode = %mode, "most frequent value learned");
            values.insert(col_name.clone(), mode);
        }
        self.impute_values = values;
        Ok(())
    }

    /// Returns a new DataFrame where, for each target column, missing values are replaced with the mode.
    /// Target columns are returned as `Utf8`.
    pub fn transform(&self, df: DataFrame) -> HousingResult<DataFrame> {
        validate_columns(&df, &self.columns)?;
        if self.columns.iter().any(|c| !self.impute_values.contains_key(c)) {
            return Err(HousingError::FitNotCalled);
        }
        apply_imputation(df, &self.columns, DataType::Utf8, |name| {
            self.impute_values
                .get(name)
                .map(|mode_val| lit(mode_val.clone()))
        })
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(MostFrequentImputer);
