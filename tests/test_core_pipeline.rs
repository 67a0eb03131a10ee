use std::sync::Arc;

use approx::assert_abs_diff_eq;
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::{DataFrame, SessionContext};

use tableprep::exceptions::TablePrepResult;
use tableprep::make_pipeline;
use tableprep::pipeline::Pipeline;
use tableprep::transformers::categorical_encoding::{LabelEncoder, UNSEEN_SENTINEL};
use tableprep::transformers::column_selection::DropColumns;
use tableprep::transformers::imputation::MeanImputer;
use tableprep::transformers::measurement_parsing::{MeasurementFormat, MeasurementParser};
use tableprep::transformers::outlier_handling::{StatsPolicy, ZScoreOutlierRemover};
use tableprep::transformers::scaling::StandardScaler;

/// Helper function to create a DataFrame shaped like a slice of an equipment
/// auction table: a categorical band, a free-text tire size, and usage hours.
async fn create_df(
    bands: Vec<Option<&str>>,
    tire_sizes: Vec<Option<&str>>,
    hours: Vec<Option<f64>>,
) -> DataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("usage_band", DataType::Utf8, true),
        Field::new("tire_size", DataType::Utf8, true),
        Field::new("hours", DataType::Float64, true),
    ]));
    let bands: ArrayRef = Arc::new(StringArray::from(bands));
    let tire_sizes: ArrayRef = Arc::new(StringArray::from(tire_sizes));
    let hours: ArrayRef = Arc::new(Float64Array::from(hours));
    let batch = RecordBatch::try_new(schema.clone(), vec![bands, tire_sizes, hours]).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    ctx.table("t").await.unwrap()
}

async fn create_training_df() -> DataFrame {
    create_df(
        vec![Some("Low"), Some("High"), Some("Medium"), Some("Low")],
        vec![
            Some("23.5 inch"),
            Some("13\""),
            Some("None or Unspecified"),
            Some("26 inch"),
        ],
        vec![Some(100.0), Some(120.0), Some(110.0), Some(130.0)],
    )
    .await
}

fn build_pipeline() -> Pipeline {
    make_pipeline!(
        false,
        (
            "parse_tire_size",
            MeasurementParser::new(vec![(
                "tire_size".to_string(),
                MeasurementFormat::UnitSuffixed
            )])
        ),
        (
            "impute_tire_size",
            MeanImputer::new(vec!["tire_size".to_string()])
        ),
        (
            "encode_usage_band",
            LabelEncoder::new(vec!["usage_band".to_string()])
        ),
        (
            "remove_hour_outliers",
            ZScoreOutlierRemover::with_columns(
                vec!["hours".to_string()],
                3.0,
                StatsPolicy::FitSet
            )
        ),
        ("scale_hours", StandardScaler::new(vec!["hours".to_string()])),
    )
}

#[tokio::test]
async fn test_pipeline_fit_transform_on_training_set() -> TablePrepResult<()> {
    let df = create_training_df().await;
    let mut pipeline = build_pipeline();
    let transformed = pipeline.fit_transform(&df).await?;
    let batches = transformed.collect().await?;
    let batch = batches.first().expect("Expected at least one batch");
    assert_eq!(batch.num_rows(), 4);

    let schema = batch.schema();
    // Distinct bands sorted: High -> 0, Low -> 1, Medium -> 2.
    let bands = batch
        .column(schema.index_of("usage_band").unwrap())
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("Expected Int64Array after label encoding");
    let expected_bands = [1, 0, 2, 1];
    for (i, exp) in expected_bands.into_iter().enumerate() {
        assert_eq!(bands.value(i), exp);
    }

    // The unparseable tire size is imputed with the mean of the parsed ones.
    let tire_sizes = batch
        .column(schema.index_of("tire_size").unwrap())
        .as_any()
        .downcast_ref::<Float64Array>()
        .expect("Expected Float64Array after parsing and imputation");
    assert!(!tire_sizes.is_null(2));
    assert_abs_diff_eq!(tire_sizes.value(2), 62.5 / 3.0, epsilon = 1e-9);

    // Hours come out standardized: mean 115, sample std ~12.91.
    let hours = batch
        .column(schema.index_of("hours").unwrap())
        .as_any()
        .downcast_ref::<Float64Array>()
        .expect("Expected Float64Array after scaling");
    let std = (500.0_f64 / 3.0).sqrt();
    let expected_hours = [-15.0 / std, 5.0 / std, -5.0 / std, 15.0 / std];
    for (i, exp) in expected_hours.into_iter().enumerate() {
        assert_abs_diff_eq!(hours.value(i), exp, epsilon = 1e-9);
    }
    Ok(())
}

#[tokio::test]
async fn test_pipeline_applies_frozen_state_at_inference() -> TablePrepResult<()> {
    let df = create_training_df().await;
    let mut pipeline = build_pipeline();
    pipeline.fit(&df).await?;

    // A batch with an unseen band and a missing tire size.
    let new_df = create_df(
        vec![Some("Commercial")],
        vec![Some("None or Unspecified")],
        vec![Some(120.0)],
    )
    .await;
    let transformed = pipeline.transform(new_df).await?;
    let batches = transformed.collect().await?;
    let batch = batches.first().expect("Expected at least one batch");
    assert_eq!(batch.num_rows(), 1);

    let schema = batch.schema();
    let bands = batch
        .column(schema.index_of("usage_band").unwrap())
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(bands.value(0), UNSEEN_SENTINEL);

    let tire_sizes = batch
        .column(schema.index_of("tire_size").unwrap())
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_abs_diff_eq!(tire_sizes.value(0), 62.5 / 3.0, epsilon = 1e-9);

    let hours = batch
        .column(schema.index_of("hours").unwrap())
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    let std = (500.0_f64 / 3.0).sqrt();
    assert_abs_diff_eq!(hours.value(0), 5.0 / std, epsilon = 1e-9);
    Ok(())
}

#[tokio::test]
async fn test_pipeline_drops_outlier_rows_at_inference() -> TablePrepResult<()> {
    let df = create_training_df().await;
    let mut pipeline = build_pipeline();
    pipeline.fit(&df).await?;

    let new_df = create_df(
        vec![Some("Low")],
        vec![Some("13\"")],
        vec![Some(5000.0)],
    )
    .await;
    let transformed = pipeline.transform(new_df).await?;
    let batches = transformed.collect().await?;
    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total_rows, 0);
    Ok(())
}

#[tokio::test]
async fn test_pipeline_transform_is_repeatable() -> TablePrepResult<()> {
    let df = create_training_df().await;
    let mut pipeline = build_pipeline();
    pipeline.fit(&df).await?;

    let batch_a = create_df(
        vec![Some("High")],
        vec![Some("17 inch")],
        vec![Some(110.0)],
    )
    .await;
    let batch_b = create_df(
        vec![Some("High")],
        vec![Some("17 inch")],
        vec![Some(110.0)],
    )
    .await;
    let first = pipeline.transform(batch_a).await?.collect().await?;
    let second = pipeline.transform(batch_b).await?.collect().await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_pipeline_requires_at_least_one_step() -> TablePrepResult<()> {
    let df = create_training_df().await;
    let mut pipeline = Pipeline::new(vec![], false);
    assert!(pipeline.fit(&df).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_pipeline_aborts_on_failing_stage() -> TablePrepResult<()> {
    let df = create_training_df().await;
    // The second stage refers to a column that does not exist, so fit must
    // fail as a whole rather than returning a partially transformed result.
    let mut pipeline = make_pipeline!(
        false,
        (
            "encode_usage_band",
            LabelEncoder::new(vec!["usage_band".to_string()])
        ),
        (
            "drop_serial",
            DropColumns::new(vec!["serial_number".to_string()])
        ),
    );
    assert!(pipeline.fit(&df).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_pipeline_transform_before_fit_fails() -> TablePrepResult<()> {
    let new_df = create_df(vec![Some("Low")], vec![Some("13\"")], vec![Some(100.0)]).await;
    let pipeline = build_pipeline();
    assert!(pipeline.transform(new_df).await.is_err());
    Ok(())
}
