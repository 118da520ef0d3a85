//! ## Inference input
//!
//! [`HousingData`] is one housing observation as received at inference time. It is turned into a
//! one-row DataFrame and passed through a persisted [`ColumnTransformer`], which selects its
//! columns by name, so the field order of the record does not matter.

use crate::column_transformer::ColumnTransformer;
use crate::exceptions::{HousingResult, ResultExt};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single housing record.
///
/// The field names are the column names of the canonical housing schema (eight numerical
/// columns, `ocean_proximity`, `median_house_value`). A transformer fitted on a schema with
/// other column names cannot be applied to this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingData {
    pub longitude: f64,
    pub latitude: f64,
    pub housing_median_age: f64,
    pub total_rooms: f64,
    pub total_bedrooms: f64,
    pub population: f64,
    pub households: f64,
    pub median_income: f64,
    pub ocean_proximity: String,
    pub median_house_value: Option<f64>,
}

impl HousingData {
    /// The record as a one-row Arrow batch.
    pub fn to_record_batch(&self) -> HousingResult<RecordBatch> {
        let numeric = [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("housing_median_age", self.housing_median_age),
            ("total_rooms", self.total_rooms),
            ("total_bedrooms", self.total_bedrooms),
            ("population", self.population),
            ("households", self.households),
            ("median_income", self.median_income),
        ];
        let mut fields = Vec::with_capacity(numeric.len() + 2);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(numeric.len() + 2);
        for (name, value) in numeric {
            fields.push(Field::new(name, DataType::Float64, false));
            columns.push(Arc::new(Float64Array::from(vec![value])));
        }
        fields.push(Field::new("median_house_value", DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(vec![self.median_house_value])));
        fields.push(Field::new("ocean_proximity", DataType::Utf8, false));
        columns.push(Arc::new(StringArray::from(vec![self.ocean_proximity.as_str()])));

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }

    /// The record as a one-row DataFrame.
    pub fn housing_input_data_frame(&self, ctx: &SessionContext) -> HousingResult<DataFrame> {
        Ok(ctx.read_batch(self.to_record_batch()?)?)
    }

    /// Applies a fitted transformer to this record and returns the one-row feature matrix.
    pub async fn transform_with(
        &self,
        ctx: &SessionContext,
        transformer: &ColumnTransformer,
    ) -> HousingResult<RecordBatch> {
        let df = self.housing_input_data_frame(ctx)?;
        transformer
            .transform(&df)
            .await
            .context("transforming housing record")
    }
}
