use std::{borrow::Cow, time::Duration, time::Instant};

use rand_xoshiro::Xoshiro256StarStar;
use tracing::trace;

use crate::{
    batch::validate_name,
    builder::BuildError,
    format::{format_counter, format_gauge, format_timing},
    sampling::{sample, SampleRate},
    telemetry::{Telemetry, TelemetryUpdate},
    transport::{udp::Transport, SendOutcome, Target},
    Batch, Error,
};

/// One or more metric names, as accepted by the counter operations.
///
/// Converts from a single name (`&str`, `String`) or from an ordered list of names (arrays, slices, and vectors of
/// either).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Names<'a> {
    /// A single metric name.
    Single(Cow<'a, str>),

    /// Several metric names, each of which gets the same update.
    Many(Vec<Cow<'a, str>>),
}

impl<'a> Names<'a> {
    /// Returns the names as a slice.
    pub fn as_slice(&self) -> &[Cow<'a, str>] {
        match self {
            Names::Single(name) => std::slice::from_ref(name),
            Names::Many(names) => names.as_slice(),
        }
    }
}

impl<'a> From<&'a str> for Names<'a> {
    fn from(name: &'a str) -> Self {
        Names::Single(Cow::Borrowed(name))
    }
}

impl<'a> From<&'a String> for Names<'a> {
    fn from(name: &'a String) -> Self {
        Names::Single(Cow::Borrowed(name.as_str()))
    }
}

impl From<String> for Names<'_> {
    fn from(name: String) -> Self {
        Names::Single(Cow::Owned(name))
    }
}

impl<'a> From<&[&'a str]> for Names<'a> {
    fn from(names: &[&'a str]) -> Self {
        Names::Many(names.iter().map(|name| Cow::Borrowed(*name)).collect())
    }
}

impl<'a, const N: usize> From<[&'a str; N]> for Names<'a> {
    fn from(names: [&'a str; N]) -> Self {
        Names::Many(names.into_iter().map(Cow::Borrowed).collect())
    }
}

impl<'a> From<Vec<&'a str>> for Names<'a> {
    fn from(names: Vec<&'a str>) -> Self {
        Names::Many(names.into_iter().map(Cow::Borrowed).collect())
    }
}

impl From<Vec<String>> for Names<'_> {
    fn from(names: Vec<String>) -> Self {
        Names::Many(names.into_iter().map(Cow::Owned).collect())
    }
}

fn validate_value(name: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidValue { name: name.to_string(), value })
    }
}

/// A client that sends counters, timers, and gauges to a statsd daemon over UDP.
///
/// Every operation builds a [`Batch`] of metrics, decides whether to send it based on the sample rate, and then sends
/// one datagram per metric name, all before returning. There is no background thread, no queueing, and no batching
/// across calls.
///
/// A single UDP socket is created on first use and reused for as long as the configured host and port stay the same.
/// Changing either one makes the next send create a new socket for the new target.
///
/// Operations take `&mut self`: to share a client between threads, wrap it in a lock.
///
/// ## Errors and failures
///
/// Operations only return an error for malformed arguments, such as an invalid metric name. Transport problems are
/// reported through the returned [`SendOutcome`], and logged: the first time a socket cannot be created for a given
/// target, a warning is emitted, and subsequent failures for that target are silent.
pub struct StatsdClient {
    target: Target,
    transport: Transport,
    rng: Xoshiro256StarStar,
    telemetry_enabled: bool,
    telemetry: Option<Telemetry>,
}

impl StatsdClient {
    pub(crate) fn new(target: Target, transport: Transport, rng: Xoshiro256StarStar, telemetry_enabled: bool) -> Self {
        StatsdClient { target, transport, rng, telemetry_enabled, telemetry: None }
    }

    /// Returns the host metrics are sent to.
    pub fn host(&self) -> &str {
        self.target.host()
    }

    /// Returns the port metrics are sent to.
    pub fn port(&self) -> u16 {
        self.target.port()
    }

    /// Returns the host and port of the cached socket, if one currently exists.
    ///
    /// This only differs from the configured host and port between a configuration change and the next send.
    pub fn connected_target(&self) -> Option<(&str, u16)> {
        self.transport.connected_target().map(|target| (target.host(), target.port()))
    }

    /// Sets the host metrics are sent to.
    ///
    /// The next send creates a new socket if the host changed.
    pub fn set_host<H>(&mut self, host: H)
    where
        H: Into<String>,
    {
        self.target.set_host(host.into());
    }

    /// Sets the port metrics are sent to.
    ///
    /// The next send creates a new socket if the port changed.
    pub fn set_port(&mut self, port: u16) {
        self.target.set_port(port);
    }

    /// Sets the host and port metrics are sent to, from an address in the format of `<host>:<port>`.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason, and the current configuration is kept.
    pub fn set_remote_address<A>(&mut self, addr: A) -> Result<(), BuildError>
    where
        A: AsRef<str>,
    {
        self.target =
            Target::try_from(addr.as_ref()).map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(())
    }

    /// Increments one or more counters by one.
    ///
    /// # Errors
    ///
    /// If a metric name is invalid, or the sample rate is not a number, an error is returned and nothing is sent.
    pub fn increment<'a, N, R>(&mut self, names: N, sample_rate: R) -> Result<SendOutcome, Error>
    where
        N: Into<Names<'a>>,
        R: Into<SampleRate>,
    {
        self.update(names, 1, sample_rate)
    }

    /// Alias for [`increment`][StatsdClient::increment].
    ///
    /// # Errors
    ///
    /// See [`increment`][StatsdClient::increment].
    pub fn inc<'a, N, R>(&mut self, names: N, sample_rate: R) -> Result<SendOutcome, Error>
    where
        N: Into<Names<'a>>,
        R: Into<SampleRate>,
    {
        self.increment(names, sample_rate)
    }

    /// Decrements one or more counters by one.
    ///
    /// # Errors
    ///
    /// If a metric name is invalid, or the sample rate is not a number, an error is returned and nothing is sent.
    pub fn decrement<'a, N, R>(&mut self, names: N, sample_rate: R) -> Result<SendOutcome, Error>
    where
        N: Into<Names<'a>>,
        R: Into<SampleRate>,
    {
        self.update(names, -1, sample_rate)
    }

    /// Alias for [`decrement`][StatsdClient::decrement].
    ///
    /// # Errors
    ///
    /// See [`decrement`][StatsdClient::decrement].
    pub fn dec<'a, N, R>(&mut self, names: N, sample_rate: R) -> Result<SendOutcome, Error>
    where
        N: Into<Names<'a>>,
        R: Into<SampleRate>,
    {
        self.decrement(names, sample_rate)
    }

    /// Adds `delta` to one or more counters.
    ///
    /// Every name gets the same update, and is sent as its own datagram. Sampling applies to the call as a whole: either
    /// every counter is sent, or none are. An empty list of names sends nothing.
    ///
    /// # Errors
    ///
    /// If a metric name is invalid, or the sample rate is not a number, an error is returned and nothing is sent.
    pub fn update<'a, N, R>(&mut self, names: N, delta: i64, sample_rate: R) -> Result<SendOutcome, Error>
    where
        N: Into<Names<'a>>,
        R: Into<SampleRate>,
    {
        let fragment = format_counter(delta);

        let names: Names<'a> = names.into();

        let mut batch = Batch::new();
        for name in names.as_slice() {
            batch.insert(&**name, fragment.clone())?;
        }

        self.send(batch, sample_rate)
    }

    /// Records a timing, in milliseconds.
    ///
    /// The protocol only carries whole milliseconds, so any fraction is truncated.
    ///
    /// # Errors
    ///
    /// If the metric name is invalid, the time is infinite or not a number, or the sample rate is not a number, an error
    /// is returned and nothing is sent.
    pub fn timing<R>(&mut self, name: &str, time_ms: f64, sample_rate: R) -> Result<SendOutcome, Error>
    where
        R: Into<SampleRate>,
    {
        validate_value(name, time_ms)?;

        let mut batch = Batch::new();
        batch.insert(name, format_timing(time_ms))?;

        self.send(batch, sample_rate)
    }

    /// Records a timing given as a `Duration`.
    ///
    /// # Errors
    ///
    /// If the metric name is invalid, or the sample rate is not a number, an error is returned and nothing is sent.
    pub fn timing_duration<R>(&mut self, name: &str, duration: Duration, sample_rate: R) -> Result<SendOutcome, Error>
    where
        R: Into<SampleRate>,
    {
        self.timing(name, duration.as_secs_f64() * 1000.0, sample_rate)
    }

    /// Runs `f`, and records how long it took as a timing.
    ///
    /// Returns the value returned by `f`, along with the outcome of sending the timing.
    ///
    /// # Errors
    ///
    /// If the metric name is invalid, an error is returned and `f` is not run. If the sample rate is not a number, an
    /// error is returned after `f` has run, and its result is lost.
    pub fn time<R, F, T>(&mut self, name: &str, sample_rate: R, f: F) -> Result<(T, SendOutcome), Error>
    where
        R: Into<SampleRate>,
        F: FnOnce() -> T,
    {
        validate_name(name)?;

        let start = Instant::now();
        let value = f();
        let outcome = self.timing_duration(name, start.elapsed(), sample_rate)?;

        Ok((value, outcome))
    }

    /// Records one or more gauge readings.
    ///
    /// Takes `(name, value)` pairs, where the value is either an `f64` or an `Option<f64>` with `None` reported as zero.
    /// Gauges are never sampled. Readings for the same name within one call are sent together, as separate lines in a
    /// single datagram.
    ///
    /// # Errors
    ///
    /// If no readings are given, a metric name is invalid, or a value is infinite or not a number, an error is returned
    /// and nothing is sent.
    pub fn gauge<I, N, V>(&mut self, readings: I) -> Result<SendOutcome, Error>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Option<f64>>,
    {
        let mut batch = Batch::new();
        for (name, value) in readings {
            let name: String = name.into();
            let value: Option<f64> = value.into();
            if let Some(value) = value {
                validate_value(&name, value)?;
            }

            batch.insert(name, format_gauge(value))?;
        }

        if batch.is_empty() {
            return Err(Error::NoMetrics);
        }

        self.send(batch, SampleRate::ALWAYS)
    }

    /// Sends a batch of pre-formatted metrics at the given sample rate.
    ///
    /// This is what every other operation reduces to, and is available for callers that build their own batches.
    ///
    /// # Errors
    ///
    /// If the sample rate is not a number, an error is returned and nothing is sent.
    pub fn send<R>(&mut self, batch: Batch, sample_rate: R) -> Result<SendOutcome, Error>
    where
        R: Into<SampleRate>,
    {
        let mut telemetry_update = TelemetryUpdate::default();

        let outcome = if let Some(batch) = sample(batch, sample_rate.into(), &mut self.rng)? {
            self.transport.send(&self.target, &batch, &mut telemetry_update)
        } else {
            trace!("Call left out by sampling.");
            telemetry_update.track_sampled_out();
            SendOutcome::Skipped
        };

        self.update_telemetry(&telemetry_update);

        Ok(outcome)
    }

    /// Releases the cached socket.
    ///
    /// The client remains usable: the next send creates a new socket.
    pub fn shutdown(&mut self) {
        self.transport.disconnect();
    }

    /// Forgets which targets a socket creation failure was already logged for, so that the next failure for any target
    /// is logged again.
    pub fn reset_warnings(&mut self) {
        self.transport.reset_warnings();
    }

    fn update_telemetry(&mut self, update: &TelemetryUpdate) {
        // Telemetry handles are registered lazily, so that they go to whichever recorder is installed by the time the
        // client is actually used rather than when it was built.
        if self.telemetry_enabled && update.had_updates() {
            let transport_id = Transport::transport_id();
            let telemetry = self.telemetry.get_or_insert_with(|| Telemetry::new(transport_id));
            telemetry.apply_update(update);
        }
    }
}
