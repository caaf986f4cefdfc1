use thiserror::Error;

/// Errors that can occur while building a [`MetricExporter`].
///
/// [`MetricExporter`]: crate::MetricExporter
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExporterBuildError {
    /// No Http client specified.
    #[error("no http client specified")]
    NoHttpClient,

    /// Invalid URI.
    #[error("invalid URI {0}. Reason {1}")]
    InvalidUri(String, String),

    /// Invalid configuration.
    #[error("{name}: {reason}")]
    InvalidConfig {
        /// The configuration name.
        name: String,
        /// The reason the configuration is invalid.
        reason: String,
    },
}

