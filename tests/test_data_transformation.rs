use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use arrow::array::{Array, Float64Array};
use arrow::record_batch::RecordBatch;
use housing_features::column_transformer::ColumnTransformer;
use housing_features::data_transformation::{
    split_features_and_target, DataTransformation, CATEGORICAL_BRANCH, NUMERIC_BRANCH,
};
use housing_features::exceptions::{ErrorKind, HousingError, HousingResult};
use housing_features::housing_data::HousingData;
use housing_features::schema::DatasetSchema;
use housing_features::settings::{
    DataIngestionArtifact, DataTransformationConfig, DataValidationArtifact,
};
use housing_features::transformers::categorical_encoding::HandleUnknown;
use housing_features::util::{load_array, load_object, load_table, session_context};
use tempfile::TempDir;

const CATEGORIES: [&str; 5] = ["<1H OCEAN", "INLAND", "ISLAND", "NEAR BAY", "NEAR OCEAN"];

const SCHEMA_YAML: &str = r#"
columns:
  longitude: float
  latitude: float
  housing_median_age: float
  total_rooms: float
  total_bedrooms: float
  population: float
  households: float
  median_income: float
  median_house_value: float
  ocean_proximity: category
numerical_columns:
  - longitude
  - latitude
  - housing_median_age
  - total_rooms
  - total_bedrooms
  - population
  - households
  - median_income
categorical_columns:
  - ocean_proximity
target_column: median_house_value
"#;

const HEADER: &str = "longitude,latitude,housing_median_age,total_rooms,total_bedrooms,\
population,households,median_income,median_house_value,ocean_proximity";

/// A deterministic synthetic record.
fn record(i: usize) -> HousingData {
    let x = i as f64;
    HousingData {
        longitude: -122.25 + 0.01 * x,
        latitude: 37.5 + 0.005 * x,
        housing_median_age: (10 + i % 40) as f64,
        total_rooms: 800.0 + 13.0 * x,
        total_bedrooms: 150.0 + 3.0 * x,
        population: 400.0 + 7.0 * x,
        households: 120.0 + 2.0 * x,
        median_income: 1.5 + 0.07 * x,
        ocean_proximity: CATEGORIES[i % CATEGORIES.len()].to_string(),
        median_house_value: Some(100_000.0 + 1_500.0 * x),
    }
}

/// Writes the records `range` as CSV. Records whose index is in `missing_bedrooms` get an
/// empty `total_bedrooms` field.
fn write_csv(
    path: &Path,
    range: std::ops::Range<usize>,
    missing_bedrooms: impl Fn(usize) -> bool,
    proximity: impl Fn(usize) -> String,
) {
    let mut content = String::from(HEADER);
    content.push('\n');
    for i in range {
        let r = record(i);
        let bedrooms = if missing_bedrooms(i) {
            String::new()
        } else {
            r.total_bedrooms.to_string()
        };
        writeln!(
            content,
            "{},{},{},{},{},{},{},{},{},{}",
            r.longitude,
            r.latitude,
            r.housing_median_age,
            r.total_rooms,
            bedrooms,
            r.population,
            r.households,
            r.median_income,
            r.median_house_value.unwrap(),
            proximity(i)
        )
        .unwrap();
    }
    std::fs::write(path, content).unwrap();
}

struct Fixture {
    dir: TempDir,
    train: PathBuf,
    test: PathBuf,
    schema: PathBuf,
}

impl Fixture {
    /// 100 training rows (every tenth without a bedroom count) and 20 test rows.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ingested = dir.path().join("ingested");
        std::fs::create_dir_all(&ingested).unwrap();
        let train = ingested.join("train.csv");
        let test = ingested.join("test.csv");
        let schema = dir.path().join("schema.yaml");

        let category = |i: usize| CATEGORIES[i % CATEGORIES.len()].to_string();
        write_csv(&train, 0..100, |i| i % 10 == 3, category);
        write_csv(&test, 100..120, |_| false, category);
        std::fs::write(&schema, SCHEMA_YAML).unwrap();

        Self {
            dir,
            train,
            test,
            schema,
        }
    }

    fn config(&self) -> DataTransformationConfig {
        let root = self.dir.path().join("artifact").join("data_transformation");
        DataTransformationConfig {
            add_bedroom_per_room: true,
            transformed_train_dir: root.join("transformed").join("train"),
            transformed_test_dir: root.join("transformed").join("test"),
            preprocessed_object_file_path: root.join("preprocessed").join("preprocessed.bin"),
            handle_unknown: HandleUnknown::Error,
        }
    }

    fn stage(&self, config: DataTransformationConfig) -> DataTransformation {
        DataTransformation::new(
            config,
            DataIngestionArtifact {
                train_file_path: self.train.clone(),
                test_file_path: self.test.clone(),
            },
            DataValidationArtifact {
                schema_file_path: self.schema.clone(),
            },
        )
    }
}

fn column_values(batch: &RecordBatch, index: usize) -> Vec<f64> {
    let array = batch
        .column(index)
        .as_any()
        .downcast_ref::<Float64Array>()
        .expect("Expected Float64Array");
    (0..array.len()).map(|i| array.value(i)).collect()
}

#[tokio::test]
async fn test_end_to_end_transformation() -> HousingResult<()> {
    let fixture = Fixture::new();
    let config = fixture.config();
    let artifact = fixture
        .stage(config.clone())
        .initiate_data_transformation()
        .await?;

    assert!(artifact.is_transformed);
    assert_eq!(artifact.message, "Data Transformation Successful");
    assert_eq!(
        artifact.transformed_train_file_path,
        config.transformed_train_dir.join("train.parquet")
    );
    assert_eq!(
        artifact.transformed_test_file_path,
        config.transformed_test_dir.join("test.parquet")
    );
    assert_eq!(
        artifact.preprocessed_object_file_path,
        config.preprocessed_object_file_path
    );

    // 8 numeric + 3 ratios + 5 indicators + target.
    let train_arr = load_array(&artifact.transformed_train_file_path)?;
    let test_arr = load_array(&artifact.transformed_test_file_path)?;
    assert_eq!(train_arr.num_rows(), 100);
    assert_eq!(train_arr.num_columns(), 17);
    assert_eq!(test_arr.num_rows(), 20);
    assert_eq!(test_arr.num_columns(), 17);

    // The target is the last column, unscaled.
    let target = column_values(&train_arr, 16);
    for (i, value) in target.iter().enumerate() {
        assert_eq!(*value, 100_000.0 + 1_500.0 * i as f64);
    }
    assert_eq!(train_arr.schema().field(16).name(), "median_house_value");

    // Missing bedroom counts were imputed, and every numeric feature is centered.
    for j in 0..11 {
        let values = column_values(&train_arr, j);
        assert!(values.iter().all(|v| v.is_finite()), "column {}", j);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
    }
    // Indicator columns are scaled but not centered.
    for j in 11..16 {
        let values = column_values(&train_arr, j);
        assert!(values.iter().any(|v| *v == 0.0), "column {}", j);
        assert!(values.iter().all(|v| *v >= 0.0), "column {}", j);
    }
    Ok(())
}

#[tokio::test]
async fn test_persisted_transformer_reproduces_arrays() -> HousingResult<()> {
    let fixture = Fixture::new();
    let artifact = fixture
        .stage(fixture.config())
        .initiate_data_transformation()
        .await?;

    let transformer: ColumnTransformer = load_object(&artifact.preprocessed_object_file_path)?;
    let names = transformer.feature_names()?;
    assert_eq!(names.len(), 16);
    assert_eq!(names[8], "rooms_per_household");
    assert_eq!(names[11], "ocean_proximity_<1H OCEAN");
    assert_eq!(names[15], "ocean_proximity_NEAR OCEAN");

    let ctx = session_context();
    let schema = DatasetSchema::from_yaml_file(&fixture.schema)?;
    let splits = [
        (&fixture.train, &artifact.transformed_train_file_path),
        (&fixture.test, &artifact.transformed_test_file_path),
    ];
    for (source, array_path) in splits {
        let saved = load_array(array_path)?;
        let df = load_table(&ctx, source, &schema).await?;
        let (features, _) = split_features_and_target(df, &schema.target_column)?;
        let reproduced = transformer.transform(&features).await?;

        assert_eq!(reproduced.num_columns(), 16);
        for (j, name) in names.iter().enumerate() {
            assert_eq!(saved.schema().field(j).name(), name);
            assert_eq!(column_values(&reproduced, j), column_values(&saved, j));
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_single_record_inference_matches_batch_output() -> HousingResult<()> {
    let fixture = Fixture::new();
    let artifact = fixture
        .stage(fixture.config())
        .initiate_data_transformation()
        .await?;
    let transformer: ColumnTransformer = load_object(&artifact.preprocessed_object_file_path)?;
    let test_arr = load_array(&artifact.transformed_test_file_path)?;

    // Test row 0 is record 100.
    let ctx = session_context();
    let features = record(100).transform_with(&ctx, &transformer).await?;
    assert_eq!(features.num_rows(), 1);
    assert_eq!(features.num_columns(), 16);
    for j in 0..16 {
        assert_eq!(column_values(&features, j)[0], column_values(&test_arr, j)[0]);
    }
    Ok(())
}

#[tokio::test]
async fn test_without_bedrooms_per_room() -> HousingResult<()> {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.add_bedroom_per_room = false;
    let artifact = fixture.stage(config).initiate_data_transformation().await?;

    let train_arr = load_array(&artifact.transformed_train_file_path)?;
    assert_eq!(train_arr.num_columns(), 16);
    Ok(())
}

#[tokio::test]
async fn test_transformer_object_layout() -> HousingResult<()> {
    let fixture = Fixture::new();
    let transformer = fixture
        .stage(fixture.config())
        .get_data_transformer_object()?;
    assert!(!transformer.is_fitted());

    let branches = transformer.branches();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0].name, NUMERIC_BRANCH);
    assert_eq!(branches[0].columns.len(), 8);
    assert_eq!(branches[1].name, CATEGORICAL_BRANCH);
    assert_eq!(branches[1].columns, vec!["ocean_proximity"]);
    let steps: Vec<&str> = branches[1]
        .pipeline
        .steps()
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(steps, vec!["impute", "one_hot_encoding", "scaler"]);
    Ok(())
}

#[tokio::test]
async fn test_schema_without_target_key_is_configuration_error() {
    let fixture = Fixture::new();
    std::fs::write(
        &fixture.schema,
        "numerical_columns: [total_rooms]\ncategorical_columns: []\n",
    )
    .unwrap();
    let config = fixture.config();
    let err = fixture
        .stage(config.clone())
        .initiate_data_transformation()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("data transformation failed"));
    assert!(!config.preprocessed_object_file_path.exists());
}

#[tokio::test]
async fn test_missing_target_column_is_reported() {
    let fixture = Fixture::new();
    let stripped: String = std::fs::read_to_string(&fixture.train)
        .unwrap()
        .lines()
        .map(|line| {
            let mut fields: Vec<&str> = line.split(',').collect();
            fields.remove(8);
            fields.join(",") + "\n"
        })
        .collect();
    std::fs::write(&fixture.train, stripped).unwrap();

    let config = fixture.config();
    let err = fixture
        .stage(config.clone())
        .initiate_data_transformation()
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), HousingError::MissingColumn(_)));
    assert!(err.to_string().contains("median_house_value"));
    assert!(!config.transformed_train_dir.exists());
}

#[tokio::test]
async fn test_missing_input_file_is_io_error() {
    let fixture = Fixture::new();
    std::fs::remove_file(&fixture.test).unwrap();
    let err = fixture
        .stage(fixture.config())
        .initiate_data_transformation()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[tokio::test]
async fn test_unparseable_table_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let ragged = dir.path().join("ragged.csv");
    std::fs::write(&ragged, "a,b,c\n1,2\n1,2,3,4,5\n").unwrap();
    let schema = DatasetSchema::new(vec!["a".into(), "b".into()], vec![], "c").unwrap();

    let err = load_table(&session_context(), &ragged, &schema)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io, "{:?}", err);
    assert!(err.to_string().contains("ragged.csv"));

    let fixture = Fixture::new();
    let mut content = std::fs::read_to_string(&fixture.train).unwrap();
    content.push_str("1.0,2.0\n");
    std::fs::write(&fixture.train, content).unwrap();
    let config = fixture.config();
    let err = fixture
        .stage(config.clone())
        .initiate_data_transformation()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io, "{:?}", err);
    assert!(!config.preprocessed_object_file_path.exists());
}

#[tokio::test]
async fn test_failed_rerun_keeps_earlier_outputs() -> HousingResult<()> {
    let fixture = Fixture::new();
    let first = fixture
        .stage(fixture.config())
        .initiate_data_transformation()
        .await?;
    let train_bytes = std::fs::read(&first.transformed_train_file_path).unwrap();
    let test_bytes = std::fs::read(&first.transformed_test_file_path).unwrap();

    // A regular file where the object's directory should be.
    let blocker = fixture.dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let mut config = fixture.config();
    config.preprocessed_object_file_path = blocker.join("preprocessed.bin");
    let err = fixture
        .stage(config.clone())
        .initiate_data_transformation()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    assert_eq!(std::fs::read(&first.transformed_train_file_path).unwrap(), train_bytes);
    assert_eq!(std::fs::read(&first.transformed_test_file_path).unwrap(), test_bytes);
    assert!(first.preprocessed_object_file_path.is_file());
    for dir in [&config.transformed_train_dir, &config.transformed_test_dir] {
        let names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1, "{:?}", names);
    }
    Ok(())
}

#[tokio::test]
async fn test_unknown_category_in_test_split() -> HousingResult<()> {
    let fixture = Fixture::new();
    write_csv(&fixture.test, 100..120, |_| false, |i| {
        if i == 105 {
            "ATLANTIS".to_string()
        } else {
            CATEGORIES[i % CATEGORIES.len()].to_string()
        }
    });

    let err = fixture
        .stage(fixture.config())
        .initiate_data_transformation()
        .await
        .unwrap_err();
    match err.root_cause() {
        HousingError::UnknownCategory { column, value } => {
            assert_eq!(column, "ocean_proximity");
            assert_eq!(value, "ATLANTIS");
        }
        other => panic!("Expected UnknownCategory, got {:?}", other),
    }

    let mut config = fixture.config();
    config.handle_unknown = HandleUnknown::Ignore;
    let artifact = fixture.stage(config).initiate_data_transformation().await?;
    let test_arr = load_array(&artifact.transformed_test_file_path)?;
    for j in 11..16 {
        assert_eq!(column_values(&test_arr, j)[5], 0.0);
    }
    Ok(())
}
