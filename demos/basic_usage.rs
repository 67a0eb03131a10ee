// Run `cargo run --example basic_usage` to execute this example.
//
// Builds a small in-memory table shaped like an equipment auction dataset,
// fits a preprocessing pipeline on it, and prints the model-ready output.

use std::error::Error;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;

use tableprep::make_pipeline;
use tableprep::transformers::categorical_encoding::OneHotEncoder;
use tableprep::transformers::imputation::MeanImputer;
use tableprep::transformers::measurement_parsing::{MeasurementFormat, MeasurementParser};
use tableprep::transformers::outlier_handling::{StatsPolicy, ZScoreOutlierRemover};
use tableprep::transformers::scaling::StandardScaler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("usage_band", DataType::Utf8, true),
        Field::new("tire_size", DataType::Utf8, true),
        Field::new("hours", DataType::Float64, true),
    ]));
    let bands: ArrayRef = Arc::new(StringArray::from(vec![
        Some("low"),
        Some("high"),
        Some("medium"),
        Some("low"),
        Some("high"),
    ]));
    let tire_sizes: ArrayRef = Arc::new(StringArray::from(vec![
        Some("23.5 inch"),
        Some("13\""),
        Some("None or Unspecified"),
        Some("26 inch"),
        Some("17.5 inch"),
    ]));
    let hours: ArrayRef = Arc::new(Float64Array::from(vec![
        Some(1200.0),
        Some(900.0),
        Some(1500.0),
        Some(1100.0),
        Some(1300.0),
    ]));
    let batch = RecordBatch::try_new(schema.clone(), vec![bands, tire_sizes, hours])?;
    let mem_table = MemTable::try_new(schema, vec![vec![batch]])?;
    let ctx = SessionContext::new();
    ctx.register_table("auctions", Arc::new(mem_table))?;
    let df = ctx.table("auctions").await?;

    let mut pipeline = make_pipeline!(
        true,
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
            OneHotEncoder::new(vec!["usage_band".to_string()])
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
    );

    let transformed = pipeline.fit_transform(&df).await?;
    transformed.show().await?;

    Ok(())
}
