use thiserror::Error;

/// Errors caused by malformed arguments to a client operation.
///
/// Transport problems are never reported through this type: they show up as a [`SendOutcome`][crate::SendOutcome]
/// instead, since UDP offers no delivery guarantee to begin with.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// The metric name cannot be written to the wire as-is.
    #[error("invalid metric name '{name}': {reason}")]
    InvalidMetricName {
        /// The offending name.
        name: String,

        /// Why the name was rejected.
        reason: &'static str,
    },

    /// The sample rate is not a number.
    #[error("invalid sample rate: {rate}")]
    InvalidSampleRate {
        /// The offending rate.
        rate: f64,
    },

    /// A timing or gauge value is infinite or not a number.
    #[error("invalid value for metric '{name}': {value}")]
    InvalidValue {
        /// Name of the metric the value was given for.
        name: String,

        /// The offending value.
        value: f64,
    },

    /// The operation was given nothing to report.
    #[error("no metrics given")]
    NoMetrics,
}
