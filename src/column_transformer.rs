//! ## Column Transformer
//!
//! [`ColumnTransformer`] applies independent pipelines ("branches") to disjoint column subsets of
//! the same DataFrame and concatenates their outputs horizontally, in branch order.
//!
//! Each branch sees only its own columns, in the order they are listed for the branch. Columns
//! that belong to no branch are dropped. Fitting a branch never looks at another branch's columns.
//!
//! Branch outputs are materialized separately and joined by row position, so the input must
//! produce rows in a stable order (see [`crate::util::session_context`]).

use crate::exceptions::{HousingError, HousingResult, ResultExt};
use crate::pipeline::{Pipeline, Stage};
use crate::transformers::validate_columns;
use crate::util::{collect_batch, hstack};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A pipeline bound to the columns it consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub pipeline: Pipeline,
    pub columns: Vec<String>,
}

/// Applies branches to column subsets and concatenates their outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    branches: Vec<Branch>,
    fitted: bool,
}

impl ColumnTransformer {
    /// Creates a column transformer from `(name, pipeline, columns)` triples.
    /// Fails if a column is claimed by more than one branch.
    pub fn new(branches: Vec<(String, Pipeline, Vec<String>)>) -> HousingResult<Self> {
        let mut claimed = HashSet::new();
        for (name, _, columns) in &branches {
            for column in columns {
                if !claimed.insert(column.clone()) {
                    return Err(HousingError::Configuration(format!(
                        "Column '{}' of branch '{}' is already used by another branch",
                        column, name
                    )));
                }
            }
        }
        Ok(Self {
            branches: branches
                .into_iter()
                .map(|(name, pipeline, columns)| Branch {
                    name,
                    pipeline,
                    columns,
                })
                .collect(),
            fitted: false,
        })
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// The branch's slice of `df`: only its columns, in its order.
    fn slice(df: &DataFrame, branch: &Branch) -> HousingResult<DataFrame> {
        validate_columns(df, &branch.columns)?;
        let columns: Vec<&str> = branch.columns.iter().map(String::as_str).collect();
        Ok(df.clone().select_columns(&columns)?)
    }

    /// Fits every branch on its column slice of `df`.
    pub async fn fit(&mut self, df: &DataFrame) -> HousingResult<()> {
        for branch in self.branches.iter_mut() {
            debug!(branch = %branch.name, columns = ?branch.columns, "fitting branch");
            let slice = Self::slice(df, branch)
                .with_context(|| format!("selecting columns of branch '{}'", branch.name))?;
            branch
                .pipeline
                .fit(&slice)
                .await
                .with_context(|| format!("fitting branch '{}'", branch.name))?;
        }
        self.fitted = true;
        Ok(())
    }

    /// Transforms `df` with the fitted branches and returns the concatenated feature matrix.
    /// `df` is not modified and the fitted state is only read.
    pub async fn transform(&self, df: &DataFrame) -> HousingResult<RecordBatch> {
        if !self.fitted {
            return Err(HousingError::FitNotCalled);
        }
        let mut outputs = Vec::with_capacity(self.branches.len());
        for branch in &self.branches {
            let slice = Self::slice(df, branch)
                .with_context(|| format!("selecting columns of branch '{}'", branch.name))?;
            let transformed = branch
                .pipeline
                .transform(slice)
                .await
                .with_context(|| format!("transforming branch '{}'", branch.name))?;
            let batch = collect_batch(transformed)
                .await
                .with_context(|| format!("executing branch '{}'", branch.name))?;
            debug!(
                branch = %branch.name,
                rows = batch.num_rows(),
                columns = batch.num_columns(),
                "branch transformed"
            );
            outputs.push(batch);
        }
        hstack(&outputs).context("concatenating branch outputs")
    }

    /// Fits on `df`, then transforms it.
    pub async fn fit_transform(&mut self, df: &DataFrame) -> HousingResult<RecordBatch> {
        self.fit(df).await?;
        self.transform(df).await
    }

    /// Names of the output columns, in order. Requires a fitted transformer.
    pub fn feature_names(&self) -> HousingResult<Vec<String>> {
        if !self.fitted {
            return Err(HousingError::FitNotCalled);
        }
        let mut names = Vec::new();
        for branch in &self.branches {
            let mut current = branch.columns.clone();
            for (_, stage) in branch.pipeline.steps() {
                match stage {
                    Stage::FeatureGenerator(g) => {
                        current.extend(g.generated_columns().into_iter().map(String::from))
                    }
                    Stage::OneHotEncoder(e) => {
                        current = current
                            .into_iter()
                            .flat_map(|c| {
                                if e.columns.contains(&c) {
                                    e.feature_names(&c)
                                } else {
                                    vec![c]
                                }
                            })
                            .collect();
                    }
                    Stage::MedianImputer(_)
                    | Stage::MostFrequentImputer(_)
                    | Stage::StandardScaler(_) => {}
                }
            }
            names.extend(current);
        }
        Ok(names)
    }
}
