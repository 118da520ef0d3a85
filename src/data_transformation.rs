//! ## Data Transformation Stage
//!
//! [`DataTransformation`] turns the validated train/test split into model-ready arrays:
//!
//! 1. builds a [`ColumnTransformer`] from the dataset schema (see
//!    [`DataTransformation::get_data_transformer_object`]),
//! 2. fits it on the training features and applies it to the training and test features,
//! 3. appends the target as the last column and writes both arrays as Parquet files,
//! 4. persists the fitted transformer so that inference applies the exact same transformation.
//!
//! Every failure is returned as a [`HousingError`] with the failing step as context.
//! No artifact is returned unless all outputs were written.

use crate::column_transformer::ColumnTransformer;
use crate::exceptions::{HousingError, HousingResult, ResultExt};
use crate::make_pipeline;
use crate::schema::DatasetSchema;
use crate::settings::{
    DataIngestionArtifact, DataTransformationArtifact, DataTransformationConfig,
    DataValidationArtifact,
};
use crate::transformers::categorical_encoding::OneHotEncoder;
use crate::transformers::feature_generator::FeatureGenerator;
use crate::transformers::imputation::{MedianImputer, MostFrequentImputer};
use crate::transformers::scaling::StandardScaler;
use crate::util::{
    collect_batch, hstack, load_table, save_array, save_object, session_context,
    ARRAY_FILE_EXTENSION,
};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

pub const NUMERIC_BRANCH: &str = "num_pipeline";
pub const CATEGORICAL_BRANCH: &str = "cat_pipeline";

/// Builds the composite transformer for `schema`.
///
/// - numeric branch: median imputation, ratio features, standardization of every column;
/// - categorical branch: most-frequent imputation, one-hot encoding, scaling without centering.
///
/// A branch without columns is left out.
pub fn build_transformer(
    schema: &DatasetSchema,
    config: &DataTransformationConfig,
) -> HousingResult<ColumnTransformer> {
    let numerical_columns = schema.numerical_columns.clone();
    let categorical_columns = schema.categorical_columns.clone();

    let num_pipeline = make_pipeline!(
        ("impute", MedianImputer::new(numerical_columns.clone())),
        (
            "feature_generator",
            FeatureGenerator::from_columns(config.add_bedroom_per_room, &numerical_columns)?
        ),
        ("scaler", StandardScaler::new()),
    );
    let cat_pipeline = make_pipeline!(
        ("impute", MostFrequentImputer::new(categorical_columns.clone())),
        (
            "one_hot_encoding",
            OneHotEncoder::new(categorical_columns.clone())
                .with_handle_unknown(config.handle_unknown)
        ),
        ("scaler", StandardScaler::new().with_mean(false)),
    );

    info!("Numerical columns: {:?}", numerical_columns);
    info!("Categorical columns: {:?}", categorical_columns);

    let mut branches = vec![(
        NUMERIC_BRANCH.to_string(),
        num_pipeline,
        numerical_columns,
    )];
    if !categorical_columns.is_empty() {
        branches.push((
            CATEGORICAL_BRANCH.to_string(),
            cat_pipeline,
            categorical_columns,
        ));
    }
    ColumnTransformer::new(branches)
}

/// Splits a table into its input features and its target column.
pub fn split_features_and_target(
    df: DataFrame,
    target_column: &str,
) -> HousingResult<(DataFrame, DataFrame)> {
    if df.schema().field_with_name(None, target_column).is_err() {
        return Err(HousingError::MissingColumn(format!(
            "Target column '{}' not found in DataFrame",
            target_column
        )));
    }
    let target = df.clone().select_columns(&[target_column])?;
    let features = df.drop_columns(&[target_column])?;
    Ok((features, target))
}

/// Path of the transformed array for `source_file` inside `output_dir`.
pub fn transformed_file_path(source_file: &Path, output_dir: &Path) -> HousingResult<PathBuf> {
    let file_name = source_file.file_name().ok_or_else(|| {
        HousingError::Configuration(format!(
            "'{}' does not name a file",
            source_file.display()
        ))
    })?;
    Ok(output_dir.join(Path::new(file_name).with_extension(ARRAY_FILE_EXTENSION)))
}

/// Sibling of `path` that an output is written to before it is moved into place.
fn staging_path(path: &Path) -> HousingResult<PathBuf> {
    let mut name = path
        .file_name()
        .ok_or_else(|| {
            HousingError::Configuration(format!("'{}' does not name a file", path.display()))
        })?
        .to_os_string();
    name.push(".partial");
    Ok(path.with_file_name(name))
}

/// The data transformation stage.
pub struct DataTransformation {
    data_transformation_config: DataTransformationConfig,
    data_ingestion_artifact: DataIngestionArtifact,
    data_validation_artifact: DataValidationArtifact,
    ctx: SessionContext,
}

impl DataTransformation {
    pub fn new(
        data_transformation_config: DataTransformationConfig,
        data_ingestion_artifact: DataIngestionArtifact,
        data_validation_artifact: DataValidationArtifact,
    ) -> Self {
        info!("{} Data Transformation log started {}", ">".repeat(20), "<".repeat(20));
        Self {
            data_transformation_config,
            data_ingestion_artifact,
            data_validation_artifact,
            ctx: session_context(),
        }
    }

    fn read_schema(&self) -> HousingResult<DatasetSchema> {
        DatasetSchema::from_yaml_file(&self.data_validation_artifact.schema_file_path)
    }

    /// Builds the (unfitted) preprocessing object from the schema file.
    pub fn get_data_transformer_object(&self) -> HousingResult<ColumnTransformer> {
        let build = || -> HousingResult<ColumnTransformer> {
            let schema = self.read_schema()?;
            build_transformer(&schema, &self.data_transformation_config)
        };
        build().context("building data transformer object")
    }

    /// Runs the stage and returns where its outputs were written.
    pub async fn initiate_data_transformation(&self) -> HousingResult<DataTransformationArtifact> {
        self.run()
            .await
            .context("data transformation failed")
    }

    async fn run(&self) -> HousingResult<DataTransformationArtifact> {
        info!("Obtaining preprocessing object.");
        let mut preprocessing_obj = self.get_data_transformer_object()?;

        info!("Obtaining train and test file path.");
        let train_file_path = &self.data_ingestion_artifact.train_file_path;
        let test_file_path = &self.data_ingestion_artifact.test_file_path;
        let schema = self.read_schema().context("reading dataset schema")?;

        info!("Loading train and test datasets as DataFrames.");
        let train_df = load_table(&self.ctx, train_file_path, &schema)
            .await
            .with_context(|| format!("loading training data '{}'", train_file_path.display()))?;
        let test_df = load_table(&self.ctx, test_file_path, &schema)
            .await
            .with_context(|| format!("loading test data '{}'", test_file_path.display()))?;

        let target_column_name = &schema.target_column;

        info!("Splitting input and target feature from training and testing DataFrame.");
        let (input_feature_train_df, target_feature_train_df) =
            split_features_and_target(train_df, target_column_name)
                .context("splitting training data")?;
        let (input_feature_test_df, target_feature_test_df) =
            split_features_and_target(test_df, target_column_name)
                .context("splitting test data")?;

        info!("Applying preprocessing object on training DataFrame and testing DataFrame.");
        preprocessing_obj
            .fit(&input_feature_train_df)
            .await
            .context("fitting preprocessing object on training data")?;
        let input_feature_train_arr = preprocessing_obj
            .transform(&input_feature_train_df)
            .await
            .context("transforming training data")?;
        let input_feature_test_arr = preprocessing_obj
            .transform(&input_feature_test_df)
            .await
            .context("transforming test data")?;

        let train_arr = append_target(input_feature_train_arr, target_feature_train_df)
            .await
            .context("appending target to training array")?;
        let test_arr = append_target(input_feature_test_arr, target_feature_test_df)
            .await
            .context("appending target to test array")?;

        let config = &self.data_transformation_config;
        let transformed_train_file_path =
            transformed_file_path(train_file_path, &config.transformed_train_dir)?;
        let transformed_test_file_path =
            transformed_file_path(test_file_path, &config.transformed_test_dir)?;
        let preprocessed_object_file_path = config.preprocessed_object_file_path.clone();

        // Outputs are written next to their destinations and moved into place together, so a
        // failed run leaves the outputs of an earlier run untouched.
        let staged = [
            (staging_path(&transformed_train_file_path)?, transformed_train_file_path.clone()),
            (staging_path(&transformed_test_file_path)?, transformed_test_file_path.clone()),
            (staging_path(&preprocessed_object_file_path)?, preprocessed_object_file_path.clone()),
        ];
        info!("Saving transformed training and testing array.");
        let persisted = (|| -> HousingResult<()> {
            save_array(&staged[0].0, &train_arr)?;
            save_array(&staged[1].0, &test_arr)?;
            info!("Saving preprocessing object.");
            save_object(&staged[2].0, &preprocessing_obj)?;
            for (from, to) in &staged {
                std::fs::rename(from, to)
                    .with_context(|| format!("moving output into '{}'", to.display()))?;
            }
            Ok(())
        })();
        if let Err(e) = persisted {
            for (from, _) in &staged {
                let _ = std::fs::remove_file(from);
            }
            return Err(e);
        }

        let data_transformation_artifact = DataTransformationArtifact {
            is_transformed: true,
            message: "Data Transformation Successful".to_string(),
            transformed_train_file_path,
            transformed_test_file_path,
            preprocessed_object_file_path,
        };
        info!("Data transformation artifact: {}", data_transformation_artifact);
        Ok(data_transformation_artifact)
    }
}

impl Drop for DataTransformation {
    fn drop(&mut self) {
        info!("{} Data Transformation log completed. {}", ">>".repeat(20), "<<".repeat(20));
    }
}

/// Appends the single column of `target` to `features` as the last column.
async fn append_target(features: RecordBatch, target: DataFrame) -> HousingResult<RecordBatch> {
    let target = collect_batch(target).await?;
    hstack(&[features, target])
}
