//! Error types shared by the samplers, writers and services.

use crate::distributions::DomainError;
use thiserror::Error;

/// Errors surfaced by `mini_hmc`.
///
/// Distribution validation failures have their own [`DomainError`] so callers can
/// recover the neutral sentinel; everything else funnels through this enum.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error raised by a writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error raised by [`crate::io::csv::CsvWriter`].
    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A distribution received an invalid argument.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The model failed to evaluate its log density.
    #[error("Model error: {0}")]
    Model(String),

    /// The chain could not be started from the supplied position.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Rejected sampler or run configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Step size adaptation could not find a usable step size.
    #[error("Adaptation error: {0}")]
    Adaptation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
