//! Library exports for reuse in tools and tests.
/// Persisted model artifacts (save/load).
pub mod artifact;
/// TOML model configuration.
pub mod config;
/// Training controller orchestration.
pub mod controller;
/// CSV loading and schema inference.
pub mod dataset;
/// Logging setup.
pub mod logging;
/// Estimators and evaluation metrics.
pub mod ml;
/// Feature/model pipeline stages.
pub mod pipeline;
/// Cross-validation search.
pub mod tuning;
