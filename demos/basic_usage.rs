// Run `cargo run --example basic_usage -- <train.csv> <test.csv> <schema.yaml> <output_dir>`
// Set `DEBUG_HOUSING_FEATURES=true` to see the log output.

use housing_features::settings::{
    DataIngestionArtifact, DataTransformationConfig, DataValidationArtifact,
};
use housing_features::transformers::categorical_encoding::HandleUnknown;
use housing_features::util::{load_array, load_object};
use housing_features::{ColumnTransformer, DataTransformation};
use std::error::Error;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [train, test, schema, output] = args.as_slice() else {
        eprintln!("usage: basic_usage <train.csv> <test.csv> <schema.yaml> <output_dir>");
        std::process::exit(2);
    };
    let output = PathBuf::from(output);

    let config = DataTransformationConfig {
        add_bedroom_per_room: true,
        transformed_train_dir: output.join("transformed").join("train"),
        transformed_test_dir: output.join("transformed").join("test"),
        preprocessed_object_file_path: output.join("preprocessed").join("preprocessed.bin"),
        handle_unknown: HandleUnknown::Error,
    };
    let stage = DataTransformation::new(
        config,
        DataIngestionArtifact {
            train_file_path: PathBuf::from(train),
            test_file_path: PathBuf::from(test),
        },
        DataValidationArtifact {
            schema_file_path: PathBuf::from(schema),
        },
    );

    let artifact = stage.initiate_data_transformation().await?;
    println!("{}", artifact);

    let train_arr = load_array(&artifact.transformed_train_file_path)?;
    println!(
        "train array: {} rows x {} columns",
        train_arr.num_rows(),
        train_arr.num_columns()
    );

    let transformer: ColumnTransformer = load_object(&artifact.preprocessed_object_file_path)?;
    println!("features: {:?}", transformer.feature_names()?);

    Ok(())
}
