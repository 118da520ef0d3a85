//! ## Housing Features Pipeline
//!
//! This module provides the core abstractions for fitting and applying chains of transformers.
//!
//! ### Overview
//!
//! - The [`Transformer`] trait defines the capability every stage has: an asynchronous `fit` that may
//!   run aggregate queries to learn parameters, and a `transform` that only extends the DataFrame's
//!   logical plan.
//! - [`Stage`] is the closed set of stages the crate knows how to persist. It implements
//!   [`Transformer`] by dispatching to the wrapped stage.
//! - [`Pipeline`] chains named stages. It is serializable, so a fitted pipeline can be stored and
//!   reloaded for inference.
//! - Macros [`crate::impl_transformer`] and [`crate::make_pipeline`] simplify implementing the trait
//!   and building pipelines.

use crate::exceptions::{HousingError, HousingResult, ResultExt};
use crate::transformers::categorical_encoding::OneHotEncoder;
use crate::transformers::feature_generator::FeatureGenerator;
use crate::transformers::imputation::{MedianImputer, MostFrequentImputer};
use crate::transformers::scaling::StandardScaler;
use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Trait for components used in the data transformation pipeline.
///
/// Every transformer provides a `fit` method (which may collect data to compute parameters)
/// and a `transform` method (which updates the DataFrame's logical plan without triggering execution).
#[async_trait]
pub trait Transformer {
    /// Fit the transformer given a DataFrame.
    async fn fit(&mut self, df: &DataFrame) -> HousingResult<()>;

    /// Transform the input DataFrame, returning a new DataFrame with the transformation applied.
    fn transform(&self, df: DataFrame) -> HousingResult<DataFrame>;

    /// Returns true if the transformer is stateful (i.e. requires a call to fit before transform can be called).
    fn is_stateful(&self) -> bool;

    /// Checks, by executing queries if needed, that `df` can be transformed with the fitted state.
    /// Called by [`Pipeline::transform`] before every `transform`.
    async fn validate(&self, _df: &DataFrame) -> HousingResult<()> {
        Ok(())
    }
}

/// Macro to implement the [`Transformer`] trait for Housing Features transformers.
///
/// The type must already have inherent methods:
/// - `async fn fit(&mut self, &DataFrame) -> HousingResult<()>`
/// - `fn transform(&self, DataFrame) -> HousingResult<DataFrame>`
/// - `fn inherent_is_stateful(&self) -> bool`
#[macro_export]
macro_rules! impl_transformer {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::pipeline::Transformer for $ty {
            async fn fit(
                &mut self,
                df: &datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::HousingResult<()> {
                <$ty>::fit(self, df).await
            }
            fn transform(
                &self,
                df: datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::HousingResult<datafusion::prelude::DataFrame> {
                <$ty>::transform(self, df)
            }
            fn is_stateful(&self) -> bool {
                <$ty>::inherent_is_stateful(self)
            }
        }
    };
}

/// A pipeline stage. Each variant wraps one transformer and keeps its fitted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stage {
    MedianImputer(MedianImputer),
    MostFrequentImputer(MostFrequentImputer),
    FeatureGenerator(FeatureGenerator),
    OneHotEncoder(OneHotEncoder),
    StandardScaler(StandardScaler),
}

macro_rules! dispatch {
    ($stage:expr, $inner:ident => $body:expr) => {
        match $stage {
            Stage::MedianImputer($inner) => $body,
            Stage::MostFrequentImputer($inner) => $body,
            Stage::FeatureGenerator($inner) => $body,
            Stage::OneHotEncoder($inner) => $body,
            Stage::StandardScaler($inner) => $body,
        }
    };
}

#[async_trait]
impl Transformer for Stage {
    async fn fit(&mut self, df: &DataFrame) -> HousingResult<()> {
        dispatch!(self, t => Transformer::fit(t, df).await)
    }

    fn transform(&self, df: DataFrame) -> HousingResult<DataFrame> {
        dispatch!(self, t => Transformer::transform(t, df))
    }

    fn is_stateful(&self) -> bool {
        dispatch!(self, t => Transformer::is_stateful(t))
    }

    async fn validate(&self, df: &DataFrame) -> HousingResult<()> {
        dispatch!(self, t => Transformer::validate(t, df).await)
    }
}

macro_rules! impl_into_stage {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Stage {
                fn from(t: $variant) -> Self {
                    Stage::$variant(t)
                }
            }
        )+
    };
}

impl_into_stage!(
    MedianImputer,
    MostFrequentImputer,
    FeatureGenerator,
    OneHotEncoder,
    StandardScaler,
);

/// A pipeline that chains a sequence of named stages.
///
/// Each stage's output (a new logical plan) is passed as input to the next stage.
/// This allows lazy chaining of transformations until a terminal action (like `collect`) is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<(String, Stage)>,
    fitted: bool,
}

impl Pipeline {
    /// Creates a new, unfitted pipeline from `(name, stage)` pairs.
    pub fn new(steps: Vec<(String, Stage)>) -> Self {
        Self {
            steps,
            fitted: false,
        }
    }

    /// The pipeline's steps, in order.
    pub fn steps(&self) -> &[(String, Stage)] {
        &self.steps
    }

    /// Returns true once [`Pipeline::fit`] has completed.
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Returns true if any step is stateful.
    pub fn is_stateful(&self) -> bool {
        self.steps.iter().any(|(_, step)| step.is_stateful())
    }

    /// Fits each stage sequentially on the output of the previous one and returns the
    /// plan of the fully transformed DataFrame.
    pub async fn fit(&mut self, df: &DataFrame) -> HousingResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(HousingError::InvalidParameter(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        let mut current_df = df.clone();
        for (name, step) in self.steps.iter_mut() {
            debug!(step = %name, "fitting step");
            let start = Instant::now();
            step.fit(&current_df)
                .await
                .with_context(|| format!("Error fitting transformer '{}'", name))?;
            current_df = step
                .transform(current_df)
                .with_context(|| format!("Error transforming in '{}'", name))?;
            debug!(step = %name, elapsed = ?start.elapsed(), "step fitted");
        }
        self.fitted = true;
        Ok(current_df)
    }

    /// Applies the `transform` method of each stage (without fitting).
    pub async fn transform(&self, df: DataFrame) -> HousingResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(HousingError::InvalidParameter(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        if !self.fitted && self.is_stateful() {
            return Err(HousingError::FitNotCalled);
        }
        let mut current_df = df;
        for (name, step) in self.steps.iter() {
            debug!(step = %name, "applying transformer");
            step.validate(&current_df)
                .await
                .with_context(|| format!("Error in transformer '{}'", name))?;
            current_df = step
                .transform(current_df)
                .with_context(|| format!("Error in transformer '{}'", name))?;
        }
        Ok(current_df)
    }

    /// Fits the pipeline, then transforms `df` with the fitted state.
    ///
    /// The returned plan is built by [`Pipeline::transform`], so it is the same plan any later
    /// call to `transform` on the same input produces.
    pub async fn fit_transform(&mut self, df: &DataFrame) -> HousingResult<DataFrame> {
        self.fit(df).await?;
        self.transform(df.clone()).await
    }
}

/// Macro to simplify pipeline creation by converting transformers into [`Stage`]s.
///
/// # Example
///
/// ```rust,no_run
/// use housing_features::make_pipeline;
/// use housing_features::transformers::imputation::MedianImputer;
/// use housing_features::transformers::scaling::StandardScaler;
///
/// let pipeline = make_pipeline!(
///     ("impute", MedianImputer::new(vec!["total_rooms".to_string()])),
///     ("scaler", StandardScaler::new()),
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($(($name:expr, $transformer:expr)),+ $(,)?) => {
        {
            let steps: Vec<(String, $crate::pipeline::Stage)> = vec![
                $(
                    ($name.to_string(), $crate::pipeline::Stage::from($transformer)),
                )+
            ];
            $crate::pipeline::Pipeline::new(steps)
        }
    };
}
