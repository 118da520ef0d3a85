//! # Categorical Encoding Transformers
//!
//! **OneHotEncoder** expands each categorical column into one `Float64` indicator column per
//! category seen during fit. Categories are sorted, and the indicator columns replace the source
//! column in place, named `<column>_<category>`.
//!
//! What happens to a category that was not seen during fit is controlled by [`HandleUnknown`].

use crate::exceptions::{HousingError, HousingResult};
use crate::pipeline::Transformer;
use crate::transformers::validate_columns;
use arrow::array::{Array, AsArray};
use async_trait::async_trait;
use datafusion::arrow::datatypes::DataType;
use datafusion_expr::{cast, ident, lit, Case as DFCase, Expr};
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Policy for categories that were not seen during fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleUnknown {
    /// Fail the transformation with [`HousingError::UnknownCategory`].
    #[default]
    Error,
    /// Encode the row as all zeros in the column's indicator columns.
    Ignore,
}

/// Extract the sorted distinct non-null values of a column.
async fn extract_distinct_values(df: &DataFrame, col_name: &str) -> HousingResult<Vec<String>> {
    let distinct_df = df
        .clone()
        .select(vec![cast(ident(col_name), DataType::Utf8).alias(col_name)])?
        .distinct()?;
    let batches = distinct_df.collect().await?;
    let mut values = Vec::new();
    for batch in batches {
        let array = batch.column(0).as_string_opt::<i32>().ok_or_else(|| {
            HousingError::InvalidParameter(format!("Expected Utf8 array for column {}", col_name))
        })?;
        for i in 0..array.len() {
            if !array.is_null(i) {
                values.push(array.value(i).to_string());
            }
        }
    }
    values.sort();
    Ok(values)
}

/// ------------------------- OneHotEncoder -------------------------
///
/// OneHotEncoder transforms each categorical column into multiple binary columns
/// (one per distinct category).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub columns: Vec<String>,
    pub handle_unknown: HandleUnknown,
    /// Mapping from column name to its sorted categories.
    pub categories: BTreeMap<String, Vec<String>>,
}

impl OneHotEncoder {
    /// Create a new OneHotEncoder for the specified columns that rejects unknown categories.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            handle_unknown: HandleUnknown::default(),
            categories: BTreeMap::new(),
        }
    }

    /// Set the policy for unknown categories.
    pub fn with_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }

    /// Names of the indicator columns produced for `column`, in output order.
    pub fn feature_names(&self, column: &str) -> Vec<String> {
        self.categories
            .get(column)
            .map(|cats| cats.iter().map(|cat| format!("{}_{}", column, cat)).collect())
            .unwrap_or_default()
    }

    /// Learn the distinct category values of each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> HousingResult<()> {
        validate_columns(df, &self.columns)?;
        let mut categories = BTreeMap::new();
        for col_name in &self.columns {
            let values = extract_distinct_values(df, col_name).await?;
            debug!(column = %col_name, categories = ?values, "categories learned");
            categories.insert(col_name.clone(), values);
        }
        self.categories = categories;
        Ok(())
    }

    /// Fails with [`HousingError::UnknownCategory`] if `df` holds a category not seen during fit
    /// and the policy is [`HandleUnknown::Error`].
    pub async fn check_unknown(&self, df: &DataFrame) -> HousingResult<()> {
        if self.handle_unknown == HandleUnknown::Ignore {
            return Ok(());
        }
        validate_columns(df, &self.columns)?;
        for col_name in &self.columns {
            let cats = self
                .categories
                .get(col_name)
                .ok_or(HousingError::FitNotCalled)?;
            let value = cast(ident(col_name), DataType::Utf8);
            let unknown = if cats.is_empty() {
                value.is_not_null()
            } else {
                value.in_list(cats.iter().map(|c| lit(c.clone())).collect(), true)
            };
            let batches = df
                .clone()
                .filter(unknown)?
                .select(vec![cast(ident(col_name), DataType::Utf8).alias("unknown")])?
                .limit(0, Some(1))?
                .collect()
                .await?;
            if let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) {
                let value = batch
                    .column(0)
                    .as_string_opt::<i32>()
                    .map(|a| a.value(0).to_string())
                    .unwrap_or_default();
                return Err(HousingError::UnknownCategory {
                    column: col_name.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Replace each target column with its indicator columns.
    pub fn transform(&self, df: DataFrame) -> HousingResult<DataFrame> {
        validate_columns(&df, &self.columns)?;
        let mut exprs: Vec<Expr> = vec![];
        for field in df.schema().fields() {
            let name = field.name();
            if !self.columns.contains(name) {
                exprs.push(ident(name));
                continue;
            }
            let cats = self.categories.get(name).ok_or(HousingError::FitNotCalled)?;
            for (cat, new_col_name) in cats.iter().zip(self.feature_names(name)) {
                let case_expr = Expr::Case(DFCase {
                    expr: None,
                    when_then_expr: vec![(
                        Box::new(cast(ident(name), DataType::Utf8).eq(lit(cat.clone()))),
                        Box::new(lit(1.0_f64)),
                    )],
                    else_expr: Some(Box::new(lit(0.0_f64))),
                })
                .alias(new_col_name);
                exprs.push(case_expr);
            }
        }
        df.select(exprs).map_err(HousingError::from)
    }
}

#[async_trait]
impl Transformer for OneHotEncoder {
    async fn fit(&mut self, df: &DataFrame) -> HousingResult<()> {
        OneHotEncoder::fit(self, df).await
    }

    fn transform(&self, df: DataFrame) -> HousingResult<DataFrame> {
        OneHotEncoder::transform(self, df)
    }

    fn is_stateful(&self) -> bool {
        true
    }

    async fn validate(&self, df: &DataFrame) -> HousingResult<()> {
        self.check_unknown(df).await
    }
}
