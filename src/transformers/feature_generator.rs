//! ## Ratio feature generator
//!
//! [`FeatureGenerator`] appends ratio features derived from the household attributes of a housing
//! record. For every row it computes:
//!
//! - `rooms_per_household = total_rooms / households`
//! - `population_per_household = population / households`
//! - `bedrooms_per_room = total_bedrooms / total_rooms` (only if `add_bedrooms_per_room` is set)
//!
//! The derived columns are appended after all input columns, in that order.
//! Source columns are addressed by **position** in the input DataFrame, so the generator must be
//! fed the numeric columns in the order its indices were resolved against. Use
//! [`FeatureGenerator::from_columns`] to resolve the positions from the same column list that
//! selects the input.
//!
//! Division follows IEEE-754 semantics: a zero denominator produces `inf` or `NaN`, never an error.

use crate::exceptions::{HousingError, HousingResult};
use crate::impl_transformer;
use datafusion::arrow::datatypes::DataType;
use datafusion::prelude::*;
use datafusion_expr::{cast, ident, Expr};
use serde::{Deserialize, Serialize};

pub const COLUMN_TOTAL_ROOMS: &str = "total_rooms";
pub const COLUMN_TOTAL_BEDROOMS: &str = "total_bedrooms";
pub const COLUMN_POPULATION: &str = "population";
pub const COLUMN_HOUSEHOLDS: &str = "households";

pub const ROOMS_PER_HOUSEHOLD: &str = "rooms_per_household";
pub const POPULATION_PER_HOUSEHOLD: &str = "population_per_household";
pub const BEDROOMS_PER_ROOM: &str = "bedrooms_per_room";

/// Positions of the source columns in the generator's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnIndices {
    pub total_rooms: usize,
    pub total_bedrooms: usize,
    pub population: usize,
    pub households: usize,
}

impl ColumnIndices {
    /// Resolves the positions of the required columns in `columns`.
    pub fn resolve(columns: &[String]) -> HousingResult<Self> {
        let position = |name: &str| {
            columns.iter().position(|c| c == name).ok_or_else(|| {
                HousingError::Configuration(format!(
                    "Column '{}' required by the feature generator is not among {:?}",
                    name, columns
                ))
            })
        };
        Ok(Self {
            total_rooms: position(COLUMN_TOTAL_ROOMS)?,
            total_bedrooms: position(COLUMN_TOTAL_BEDROOMS)?,
            population: position(COLUMN_POPULATION)?,
            households: position(COLUMN_HOUSEHOLDS)?,
        })
    }

    fn max(&self) -> usize {
        self.total_rooms
            .max(self.total_bedrooms)
            .max(self.population)
            .max(self.households)
    }
}

/// Appends household ratio features to a numeric feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGenerator {
    add_bedrooms_per_room: bool,
    indices: ColumnIndices,
}

impl FeatureGenerator {
    /// Creates a generator reading the source columns at explicit positions.
    pub fn from_indices(add_bedrooms_per_room: bool, indices: ColumnIndices) -> Self {
        Self {
            add_bedrooms_per_room,
            indices,
        }
    }

    /// Creates a generator whose positions are looked up by name in `columns`.
    /// Fails with a configuration error if a required column is absent.
    pub fn from_columns(add_bedrooms_per_room: bool, columns: &[String]) -> HousingResult<Self> {
        Ok(Self::from_indices(
            add_bedrooms_per_room,
            ColumnIndices::resolve(columns)?,
        ))
    }

    pub fn add_bedrooms_per_room(&self) -> bool {
        self.add_bedrooms_per_room
    }

    pub fn indices(&self) -> ColumnIndices {
        self.indices
    }

    /// Names of the columns appended by [`FeatureGenerator::transform`], in order.
    pub fn generated_columns(&self) -> Vec<&'static str> {
        let mut names = vec![ROOMS_PER_HOUSEHOLD, POPULATION_PER_HOUSEHOLD];
        if self.add_bedrooms_per_room {
            names.push(BEDROOMS_PER_ROOM);
        }
        names
    }

    /// Stateless: nothing is learned from the data.
    pub async fn fit(&mut self, _df: &DataFrame) -> HousingResult<()> {
        Ok(())
    }

    /// Appends the ratio columns to the DataFrame.
    pub fn transform(&self, df: DataFrame) -> HousingResult<DataFrame> {
        let fields = df.schema().fields();
        if self.indices.max() >= fields.len() {
            return Err(HousingError::InvalidParameter(format!(
                "Feature generator index {} is out of bounds for an input with {} columns",
                self.indices.max(),
                fields.len()
            )));
        }
        let at = |i: usize| cast(ident(fields[i].name()), DataType::Float64);

        let mut exprs: Vec<Expr> = fields.iter().map(|field| ident(field.name())).collect();
        exprs.push(
            (at(self.indices.total_rooms) / at(self.indices.households)).alias(ROOMS_PER_HOUSEHOLD),
        );
        exprs.push(
            (at(self.indices.population) / at(self.indices.households))
                .alias(POPULATION_PER_HOUSEHOLD),
        );
        if self.add_bedrooms_per_room {
            exprs.push(
                (at(self.indices.total_bedrooms) / at(self.indices.total_rooms))
                    .alias(BEDROOMS_PER_ROOM),
            );
        }
        df.select(exprs).map_err(HousingError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(FeatureGenerator);
