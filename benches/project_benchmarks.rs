use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use criterion::{criterion_group, criterion_main, Criterion};
use datafusion::prelude::DataFrame;
use housing_features::data_transformation::build_transformer;
use housing_features::schema::DatasetSchema;
use housing_features::settings::DataTransformationConfig;
use housing_features::util::session_context;
use tokio::runtime::Runtime;

const ROWS: usize = 20_000;
const CATEGORIES: [&str; 5] = ["<1H OCEAN", "INLAND", "ISLAND", "NEAR BAY", "NEAR OCEAN"];
const NUMERIC: [&str; 8] = [
    "longitude",
    "latitude",
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "median_income",
];

fn housing_frame() -> DataFrame {
    let mut fields: Vec<Field> = NUMERIC
        .iter()
        .map(|name| Field::new(*name, DataType::Float64, true))
        .collect();
    fields.push(Field::new("ocean_proximity", DataType::Utf8, false));

    let mut columns: Vec<ArrayRef> = NUMERIC
        .iter()
        .enumerate()
        .map(|(j, _)| {
            let values: Vec<Option<f64>> = (0..ROWS)
                .map(|i| {
                    if j == 4 && i % 97 == 0 {
                        None
                    } else {
                        Some(1.0 + ((i * (j + 3)) % 1000) as f64)
                    }
                })
                .collect();
            Arc::new(Float64Array::from(values)) as ArrayRef
        })
        .collect();
    columns.push(Arc::new(StringArray::from(
        (0..ROWS)
            .map(|i| CATEGORIES[i % CATEGORIES.len()])
            .collect::<Vec<_>>(),
    )));

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap();
    session_context().read_batch(batch).unwrap()
}

fn bench_column_transformer(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let df = housing_frame();
    let schema = DatasetSchema::new(
        NUMERIC.iter().map(|s| s.to_string()).collect(),
        vec!["ocean_proximity".to_string()],
        "median_house_value",
    )
    .unwrap();
    let config = DataTransformationConfig {
        add_bedroom_per_room: true,
        transformed_train_dir: "unused".into(),
        transformed_test_dir: "unused".into(),
        preprocessed_object_file_path: "unused".into(),
        handle_unknown: Default::default(),
    };

    c.bench_function("column_transformer_fit", |b| {
        b.iter(|| {
            let mut transformer = build_transformer(&schema, &config).unwrap();
            rt.block_on(transformer.fit(&df)).unwrap();
        })
    });

    let mut fitted = build_transformer(&schema, &config).unwrap();
    rt.block_on(fitted.fit(&df)).unwrap();
    c.bench_function("column_transformer_transform", |b| {
        b.iter(|| rt.block_on(fitted.transform(&df)).unwrap())
    });
}

criterion_group!(benches, bench_column_transformer);
criterion_main!(benches);
