use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::memory::MemTable;
use datafusion::prelude::*;
use std::sync::Arc;

use tableprep::exceptions::{TablePrepError, TablePrepResult};
use tableprep::transformers::outlier_handling::{
    StatsPolicy, ZScoreOutlierRemover, DEFAULT_ZSCORE_THRESHOLD,
};

/// Helper function to create a DataFrame with a single Float64 column "value".
async fn create_df(values: Vec<Option<f64>>) -> DataFrame {
    let schema = Arc::new(Schema::new(vec![Field::new(
        "value",
        DataType::Float64,
        true,
    )]));
    let array: ArrayRef = Arc::new(Float64Array::from(values));
    let batch = RecordBatch::try_new(schema.clone(), vec![array]).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    ctx.table("t").await.unwrap()
}

fn values_of(batch: &RecordBatch, name: &str) -> Vec<f64> {
    let schema = batch.schema();
    let array = batch
        .column(schema.index_of(name).unwrap())
        .as_any()
        .downcast_ref::<Float64Array>()
        .expect("Expected Float64Array");
    (0..array.len()).map(|i| array.value(i)).collect()
}

#[tokio::test]
async fn test_fit_set_stats_remove_extreme_row() -> TablePrepResult<()> {
    // Fit on a tight distribution, then transform a batch with one extreme value.
    let fit_df = create_df((1..=10).map(|v| Some(v as f64)).collect()).await;
    let mut remover =
        ZScoreOutlierRemover::new(DEFAULT_ZSCORE_THRESHOLD, StatsPolicy::FitSet);
    remover.fit(&fit_df).await?;

    let new_df = create_df(vec![
        Some(1.0),
        Some(2.0),
        Some(3.0),
        Some(4.0),
        Some(100.0),
    ])
    .await;
    let transformed = remover.transform(new_df).await?;
    let batches = transformed.collect().await?;
    let batch = batches.first().expect("Expected at least one batch");
    assert_eq!(values_of(batch, "value"), vec![1.0, 2.0, 3.0, 4.0]);

    // The exclusion mask from the call is retained and queryable.
    assert_eq!(
        remover.outlier_mask(),
        Some(vec![false, false, false, false, true])
    );
    Ok(())
}

#[tokio::test]
async fn test_per_batch_stats_recomputed_each_call() -> TablePrepResult<()> {
    // Twenty identical values and one far point: the far point's z-score is ~4.4.
    let mut values: Vec<Option<f64>> = vec![Some(0.0); 20];
    values.push(Some(100.0));
    let df = create_df(values).await;
    let mut remover =
        ZScoreOutlierRemover::new(DEFAULT_ZSCORE_THRESHOLD, StatsPolicy::PerBatch);
    remover.fit(&df).await?;

    let transformed = remover.transform(df).await?;
    let batches = transformed.collect().await?;
    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total_rows, 20);

    let mask = remover.outlier_mask().expect("Mask not retained");
    assert_eq!(mask.len(), 21);
    assert_eq!(mask.iter().filter(|&&flagged| flagged).count(), 1);
    assert!(mask[20]);
    Ok(())
}

#[tokio::test]
async fn test_constant_column_never_flags() -> TablePrepResult<()> {
    let df = create_df(vec![Some(5.0); 4]).await;
    let mut remover =
        ZScoreOutlierRemover::new(DEFAULT_ZSCORE_THRESHOLD, StatsPolicy::PerBatch);
    remover.fit(&df).await?;
    let transformed = remover.transform(df).await?;
    let batches = transformed.collect().await?;
    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total_rows, 4);
    assert_eq!(remover.outlier_mask(), Some(vec![false; 4]));
    Ok(())
}

#[tokio::test]
async fn test_null_values_are_never_flagged() -> TablePrepResult<()> {
    let fit_df = create_df((1..=10).map(|v| Some(v as f64)).collect()).await;
    let mut remover =
        ZScoreOutlierRemover::new(DEFAULT_ZSCORE_THRESHOLD, StatsPolicy::FitSet);
    remover.fit(&fit_df).await?;

    let new_df = create_df(vec![Some(5.0), None, Some(1000.0)]).await;
    let transformed = remover.transform(new_df).await?;
    let batches = transformed.collect().await?;
    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total_rows, 2);
    assert_eq!(remover.outlier_mask(), Some(vec![false, false, true]));
    Ok(())
}

#[tokio::test]
async fn test_zero_surviving_rows_is_valid_output() -> TablePrepResult<()> {
    let fit_df = create_df((1..=10).map(|v| Some(v as f64)).collect()).await;
    let mut remover =
        ZScoreOutlierRemover::new(DEFAULT_ZSCORE_THRESHOLD, StatsPolicy::FitSet);
    remover.fit(&fit_df).await?;

    let new_df = create_df(vec![Some(1000.0), Some(2000.0)]).await;
    let transformed = remover.transform(new_df).await?;
    let batches = transformed.collect().await?;
    let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(total_rows, 0);
    assert_eq!(remover.outlier_mask(), Some(vec![true, true]));
    Ok(())
}

#[tokio::test]
async fn test_auto_detection_skips_non_numeric_columns() -> TablePrepResult<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("label", DataType::Utf8, true),
        Field::new("value", DataType::Float64, true),
    ]));
    let labels: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), Some("b")]));
    let values: ArrayRef = Arc::new(Float64Array::from(vec![Some(1.0), Some(2.0)]));
    let batch = RecordBatch::try_new(schema.clone(), vec![labels, values]).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    let df = ctx.table("t").await.unwrap();

    let mut remover =
        ZScoreOutlierRemover::new(DEFAULT_ZSCORE_THRESHOLD, StatsPolicy::FitSet);
    remover.fit(&df).await?;
    assert_eq!(remover.target_columns, vec!["value".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_transform_before_fit_fails() -> TablePrepResult<()> {
    let df = create_df(vec![Some(1.0)]).await;
    let remover = ZScoreOutlierRemover::new(DEFAULT_ZSCORE_THRESHOLD, StatsPolicy::FitSet);
    assert!(matches!(
        remover.transform(df).await,
        Err(TablePrepError::FitNotCalled)
    ));
    Ok(())
}

#[tokio::test]
async fn test_explicit_columns_are_validated() -> TablePrepResult<()> {
    let df = create_df(vec![Some(1.0)]).await;

    let mut missing = ZScoreOutlierRemover::with_columns(
        vec!["nonexistent".to_string()],
        DEFAULT_ZSCORE_THRESHOLD,
        StatsPolicy::FitSet,
    );
    assert!(matches!(
        missing.fit(&df).await,
        Err(TablePrepError::MissingColumn(_))
    ));

    let mut bad_threshold = ZScoreOutlierRemover::with_columns(
        vec!["value".to_string()],
        -1.0,
        StatsPolicy::FitSet,
    );
    assert!(matches!(
        bad_threshold.fit(&df).await,
        Err(TablePrepError::InvalidParameter(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_explicit_non_numeric_column_rejected() -> TablePrepResult<()> {
    let schema = Arc::new(Schema::new(vec![Field::new("label", DataType::Utf8, true)]));
    let labels: ArrayRef = Arc::new(StringArray::from(vec![Some("a")]));
    let batch = RecordBatch::try_new(schema.clone(), vec![labels]).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    let df = ctx.table("t").await.unwrap();

    let mut remover = ZScoreOutlierRemover::with_columns(
        vec!["label".to_string()],
        DEFAULT_ZSCORE_THRESHOLD,
        StatsPolicy::FitSet,
    );
    assert!(matches!(
        remover.fit(&df).await,
        Err(TablePrepError::InvalidParameter(_))
    ));
    Ok(())
}
