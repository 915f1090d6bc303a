use metrics::{counter, Counter};

/// Client telemetry.
///
/// `Telemetry` collects information about the client's own behavior and can be optionally enabled to record it through
/// the [`metrics`] facade, into whichever recorder the application has installed.
pub struct Telemetry {
    packets_sent: Counter,
    packets_dropped: Counter,
    bytes_sent: Counter,
    bytes_dropped: Counter,
    socket_errors: Counter,
    calls_sampled_out: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance.
    pub fn new(transport: &'static str) -> Self {
        let base_labels = telemetry_tags!("client_transport" => transport);

        Self {
            packets_sent: counter!("statsd.client.packets_sent", base_labels.iter()),
            packets_dropped: counter!("statsd.client.packets_dropped", base_labels.iter()),
            bytes_sent: counter!("statsd.client.bytes_sent", base_labels.iter()),
            bytes_dropped: counter!("statsd.client.bytes_dropped", base_labels.iter()),
            socket_errors: counter!("statsd.client.socket_errors", base_labels.iter()),
            calls_sampled_out: counter!("statsd.client.calls_sampled_out", base_labels.iter()),
        }
    }

    /// Applies the given telemetry update, updating the internal metrics.
    pub fn apply_update(&mut self, update: &TelemetryUpdate) {
        self.packets_sent.increment(update.packets_sent);
        self.packets_dropped.increment(update.packets_dropped);
        self.bytes_sent.increment(update.bytes_sent);
        self.bytes_dropped.increment(update.bytes_dropped);
        self.socket_errors.increment(update.socket_errors);
        self.calls_sampled_out.increment(update.calls_sampled_out);
    }
}

/// A buffer for collecting telemetry updates over a single call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TelemetryUpdate {
    packets_sent: u64,
    packets_dropped: u64,
    bytes_sent: u64,
    bytes_dropped: u64,
    socket_errors: u64,
    calls_sampled_out: u64,
}

impl TelemetryUpdate {
    /// Returns `true` if any updates have been recorded.
    pub fn had_updates(&self) -> bool {
        *self != TelemetryUpdate::default()
    }

    /// Tracks a successful packet send.
    pub fn track_packet_send_succeeded(&mut self, bytes_len: usize) {
        self.packets_sent += 1;
        self.bytes_sent += bytes_len as u64;
    }

    /// Tracks a failed or truncated packet send.
    pub fn track_packet_send_failed(&mut self, bytes_len: usize) {
        self.packets_dropped += 1;
        self.bytes_dropped += bytes_len as u64;
    }

    /// Tracks a failure to create a socket for the target.
    pub fn track_socket_error(&mut self) {
        self.socket_errors += 1;
    }

    /// Tracks a call that was left out by sampling.
    pub fn track_sampled_out(&mut self) {
        self.calls_sampled_out += 1;
    }
}

macro_rules! _telemetry_tags {
    ($($k:literal => $v:expr),*) => {
        [
            ::metrics::Label::from_static_parts("client", "rust"),
            ::metrics::Label::from_static_parts("client_version", env!("CARGO_PKG_VERSION")),
            $(::metrics::Label::from_static_parts($k, $v),)*
        ]
    };
}

pub(crate) use _telemetry_tags as telemetry_tags;
