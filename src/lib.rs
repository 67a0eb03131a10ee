//! # TablePrep
//!
//! TablePrep is a tabular data preprocessing library built on top of Apache
//! DataFusion. It provides composable fit/transform components for cleaning
//! and encoding in-memory tables before they are handed to a downstream
//! statistical model:
//!
//! - Column dropping and schema alignment.
//! - Categorical encoding (label, ordinal with an explicit order, one-hot
//!   with optional frequency filtering).
//! - Numeric cleaning (measurement-string parsing, z-score outlier removal,
//!   scaling, imputation).
//! - Datetime feature extraction.
//! - A [`pipeline::Pipeline`] that chains transformers in a fixed order,
//!   fitting each stage on the output of the previous one and applying the
//!   frozen fit-time state at inference time.
//!
//! Every transformer follows the same lifecycle: construct with
//! configuration, `fit` once against a reference DataFrame, then `transform`
//! any number of batches using the frozen fit-time state. Errors are
//! returned as [`exceptions::TablePrepError`] and results are wrapped in
//! [`exceptions::TablePrepResult`].

pub mod exceptions;
pub mod logging;
pub mod pipeline;
pub mod transformers;
