//! ## Custom Errors for TablePrep
//!
//! This module defines custom error types for the TablePrep library.
//! It uses the `thiserror` crate to derive the `Error` trait for custom error types.
//! The `TablePrepError` enum includes variants representing different error scenarios
//! encountered throughout the library, making error handling straightforward and clear.
//!
//! The `TablePrepResult` type alias simplifies error handling by providing a convenient
//! alias for results returned by the library.
//!
//! ### Example
//!
//! ```rust
//! use tableprep::exceptions::{TablePrepError, TablePrepResult};
//!
//! fn check_config() -> TablePrepResult<()> {
//!     Err(TablePrepError::MissingColumn("saledate".into()))
//! }
//! ```

use thiserror::Error;

/// Errors specific to the TablePrep library.
#[derive(Debug, Error)]
pub enum TablePrepError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps errors from Parquet.
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Indicates that an invalid parameter was provided (e.g., a malformed
    /// category order or an out-of-range threshold).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Indicates that the specified column does not exist in the DataFrame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Indicates that a category absent from the fit-time vocabulary was
    /// encountered by a transformer configured to reject unknown categories.
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// Indicates the transform method was called before calling fit for a stateful transformer.
    #[error("Transform called before fit for stateful transformer")]
    FitNotCalled,
}

/// A convenient result type for TablePrep operations.
pub type TablePrepResult<T> = std::result::Result<T, TablePrepError>;
