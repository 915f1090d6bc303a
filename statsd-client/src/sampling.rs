//! Per-call random sampling.
//!
//! Sampling is decided once for a whole [`Batch`], never per metric name: either every metric in the batch is sent, or
//! none of them are. Metrics reported together by one call therefore always arrive together, which keeps correlated
//! metrics consistent on the receiving side. Sent metrics carry the sample rate (`|@0.5`) so the daemon can scale them
//! back up.

use rand::Rng;

use crate::{format::append_sample_rate, Batch, Error};

/// Fraction of calls that are actually sent.
///
/// Rates of `1.0` or above mean "always send" and add no annotation to the metrics. Rates of zero or below are valid:
/// a rate of zero only sends on drawing exactly zero, and a negative rate never sends.
///
/// Converts from `f64`, and from `Option<f64>` where `None` means "always send".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleRate(f64);

impl SampleRate {
    /// Always send, without any annotation.
    pub const ALWAYS: SampleRate = SampleRate(1.0);

    /// Creates a `SampleRate` from a fraction of calls to send.
    pub const fn new(rate: f64) -> Self {
        SampleRate(rate)
    }

    /// Returns the rate as a fraction.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Returns `true` if every call is sent.
    pub fn is_always(self) -> bool {
        self.0 >= 1.0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        SampleRate::ALWAYS
    }
}

impl From<f64> for SampleRate {
    fn from(rate: f64) -> Self {
        SampleRate::new(rate)
    }
}

impl From<Option<f64>> for SampleRate {
    fn from(rate: Option<f64>) -> Self {
        rate.map_or(SampleRate::ALWAYS, SampleRate::new)
    }
}

/// Decides whether `batch` is sent at the given rate.
///
/// When the rate is below one, a single uniform value in `[0, 1)` is drawn for the whole batch. If it exceeds the rate,
/// `None` is returned and nothing should be sent. Otherwise every value fragment in the batch is annotated with the
/// rate, and every metric name is kept.
///
/// # Errors
///
/// If the rate is not a number, an error is returned.
pub fn sample<R>(mut batch: Batch, rate: SampleRate, rng: &mut R) -> Result<Option<Batch>, Error>
where
    R: Rng + ?Sized,
{
    let rate = rate.value();
    if rate.is_nan() {
        return Err(Error::InvalidSampleRate { rate });
    }

    if rate >= 1.0 {
        return Ok(Some(batch));
    }

    if rng.random::<f64>() > rate {
        return Ok(None);
    }

    batch.for_each_fragment_mut(|fragment| append_sample_rate(fragment, rate));
    Ok(Some(batch))
}
