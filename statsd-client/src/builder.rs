use std::time::Duration;

use rand::SeedableRng as _;
use rand_xoshiro::Xoshiro256StarStar;
use thiserror::Error;

use crate::{
    client::StatsdClient,
    transport::{udp::Transport, Target, TransportConfiguration},
};

pub(crate) const DEFAULT_HOST: &str = "localhost";
pub(crate) const DEFAULT_PORT: u16 = 8125;
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_WARNING_CAPACITY: usize = 128;

/// Errors that could occur while configuring a statsd client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },
}

/// Builder for a statsd client.
pub struct StatsdClientBuilder {
    target: Target,
    write_timeout: Duration,
    warning_capacity: usize,
    sampling_seed: Option<u64>,
    telemetry: bool,
}

impl StatsdClientBuilder {
    /// Set the host to send metrics to.
    ///
    /// Either a hostname, which is resolved whenever a socket is created for it, or an IP address.
    ///
    /// Defaults to `localhost`.
    #[must_use]
    pub fn with_host<H>(mut self, host: H) -> Self
    where
        H: Into<String>,
    {
        self.target.set_host(host.into());
        self
    }

    /// Set the port to send metrics to.
    ///
    /// Defaults to 8125.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.target.set_port(port);
        self
    }

    /// Set the remote address to send metrics to.
    ///
    /// The address needs to be in the format of `<host>:<port>`, with IPv6 literals enclosed in brackets, such as
    /// `[::1]:8125`.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.target =
            Target::try_from(addr.as_ref()).map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the write timeout for sending metrics.
    ///
    /// When the write timeout is reached, the packet being sent at the time is dropped without retrying. A zero
    /// timeout disables the timeout entirely.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set how many failing targets are remembered for the purpose of warning only once about each.
    ///
    /// Whenever a socket cannot be created for a target, a warning is logged the first time only. Once more distinct
    /// targets than this have failed, the oldest ones are forgotten, and would be warned about again. A capacity of
    /// zero logs a warning on every failure.
    ///
    /// Defaults to 128.
    #[must_use]
    pub fn with_warning_capacity(mut self, capacity: usize) -> Self {
        self.warning_capacity = capacity;
        self
    }

    /// Seed the random number generator used for sampling.
    ///
    /// With a fixed seed, the sequence of sampling decisions is reproducible from one run to the next.
    ///
    /// Defaults to a seed taken from the thread-local random number generator.
    #[must_use]
    pub fn with_sampling_seed(mut self, seed: u64) -> Self {
        self.sampling_seed = Some(seed);
        self
    }

    /// Sets whether or not to enable telemetry for the client.
    ///
    /// When enabled, the client records metrics about its own operation through the `metrics` facade, under the
    /// `statsd.client` namespace. They end up in whichever recorder the application installed, if any.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Builds the client.
    ///
    /// No socket is created until the first metric is sent.
    pub fn build(self) -> StatsdClient {
        let rng = match self.sampling_seed {
            Some(seed) => Xoshiro256StarStar::seed_from_u64(seed),
            None => Xoshiro256StarStar::from_rng(&mut rand::rng()),
        };

        let transport_config = TransportConfiguration {
            write_timeout: self.write_timeout,
            warning_capacity: self.warning_capacity,
        };

        StatsdClient::new(self.target, Transport::new(transport_config), rng, self.telemetry)
    }
}

impl Default for StatsdClientBuilder {
    fn default() -> Self {
        StatsdClientBuilder {
            target: Target::new(DEFAULT_HOST.to_string(), DEFAULT_PORT),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            warning_capacity: DEFAULT_WARNING_CAPACITY,
            sampling_seed: None,
            telemetry: false,
        }
    }
}
