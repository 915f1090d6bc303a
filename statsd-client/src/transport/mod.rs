use std::{fmt, time::Duration};

use indexmap::IndexSet;

pub mod udp;

/// Remote `host:port` that metrics are sent to.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) struct Target {
    host: String,
    port: u16,
}

impl Target {
    pub fn new(host: String, port: u16) -> Self {
        Target { host, port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub fn set_host(&mut self, host: String) {
        self.host = host;
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bare IPv6 literals need brackets to stay unambiguous next to the port.
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl<'a> TryFrom<&'a str> for Target {
    type Error = String;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        let (host, port) =
            addr.rsplit_once(':').ok_or_else(|| format!("missing port in '{addr}' (expected '<host>:<port>')"))?;

        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
        if host.is_empty() {
            return Err(format!("missing host in '{addr}' (expected '<host>:<port>')"));
        }
        if host.contains(':') && !addr.starts_with('[') {
            return Err(format!("IPv6 host in '{addr}' must be enclosed in brackets"));
        }

        let port = port.parse::<u16>().map_err(|e| format!("invalid port '{port}': {e}"))?;

        Ok(Target::new(host.to_string(), port))
    }
}

/// Transport configuration.
#[derive(Clone)]
pub struct TransportConfiguration {
    pub write_timeout: Duration,
    pub warning_capacity: usize,
}

/// Targets for which a socket creation failure has already been logged.
///
/// Holds at most `capacity` targets. When full, the target that failed first is forgotten to make room, which means it
/// will be warned about again if it keeps failing.
pub(crate) struct WarnedTargets {
    capacity: usize,
    targets: IndexSet<Target>,
}

impl WarnedTargets {
    pub fn new(capacity: usize) -> Self {
        WarnedTargets { capacity, targets: IndexSet::new() }
    }

    /// Records a failure for `target`, returning `true` if it had not been recorded yet.
    pub fn first_failure(&mut self, target: &Target) -> bool {
        if self.targets.contains(target) {
            return false;
        }

        if self.capacity == 0 {
            return true;
        }

        if self.targets.len() >= self.capacity {
            self.targets.shift_remove_index(0);
        }

        self.targets.insert(target.clone());
        true
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.targets.len()
    }
}

/// Result of sending a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// There was nothing to send: the batch was empty, or sampling left it out.
    Skipped,

    /// Every packet in the batch was handed to the socket in full.
    Sent {
        /// Number of datagrams sent.
        packets: usize,

        /// Total number of bytes sent.
        bytes: usize,
    },

    /// At least one packet could not be sent, or was only partially sent.
    Failed {
        /// Number of datagrams sent in full.
        sent: usize,

        /// Number of datagrams that failed.
        failed: usize,
    },
}

impl SendOutcome {
    /// Returns `true` if every packet was sent.
    ///
    /// A skipped call is neither a success nor a failure.
    pub const fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }

    /// Returns `true` if any packet failed to send.
    pub const fn is_failure(&self) -> bool {
        matches!(self, SendOutcome::Failed { .. })
    }

    /// Returns `true` if nothing was sent because there was nothing to send.
    pub const fn is_skipped(&self) -> bool {
        matches!(self, SendOutcome::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::{SendOutcome, Target, WarnedTargets};

    #[test]
    fn target_parsing() {
        // Cases are defined as: input, expected host and port.
        let cases = [
            ("localhost:8125", Some(("localhost", 8125))),
            ("127.0.0.1:9125", Some(("127.0.0.1", 9125))),
            ("stats.internal.example:1", Some(("stats.internal.example", 1))),
            ("[::1]:8125", Some(("::1", 8125))),
            ("localhost", None),
            (":8125", None),
            ("localhost:", None),
            ("localhost:99999", None),
            ("localhost:port", None),
            ("::1:8125", None),
        ];

        for (input, expected) in cases {
            let actual = Target::try_from(input).ok();
            let actual = actual.as_ref().map(|target| (target.host(), target.port()));
            assert_eq!(actual, expected, "input: {input}");
        }
    }

    #[test]
    fn target_display() {
        assert_eq!(Target::new("localhost".to_string(), 8125).to_string(), "localhost:8125");
        assert_eq!(Target::new("::1".to_string(), 8125).to_string(), "[::1]:8125");
    }

    #[test]
    fn warned_targets_only_warn_once() {
        let a = Target::new("a".to_string(), 1);
        let b = Target::new("b".to_string(), 1);

        let mut warned = WarnedTargets::new(8);
        assert!(warned.first_failure(&a));
        assert!(!warned.first_failure(&a));
        assert!(warned.first_failure(&b));
        assert!(!warned.first_failure(&b));
        assert_eq!(warned.len(), 2);

        warned.clear();
        assert!(warned.first_failure(&a));
    }

    #[test]
    fn warned_targets_evict_oldest() {
        let targets = (0..4).map(|port| Target::new("host".to_string(), port)).collect::<Vec<_>>();

        let mut warned = WarnedTargets::new(3);
        for target in &targets {
            assert!(warned.first_failure(target));
        }
        assert_eq!(warned.len(), 3);

        // The first target was evicted to make room for the fourth, the others are still remembered.
        assert!(!warned.first_failure(&targets[3]));
        assert!(!warned.first_failure(&targets[2]));
        assert!(warned.first_failure(&targets[0]));
    }

    #[test]
    fn warned_targets_without_capacity_always_warn() {
        let target = Target::new("host".to_string(), 1);

        let mut warned = WarnedTargets::new(0);
        assert!(warned.first_failure(&target));
        assert!(warned.first_failure(&target));
        assert_eq!(warned.len(), 0);
    }

    #[test]
    fn outcome_predicates() {
        let skipped = SendOutcome::Skipped;
        let sent = SendOutcome::Sent { packets: 1, bytes: 5 };
        let failed = SendOutcome::Failed { sent: 1, failed: 1 };

        assert!(skipped.is_skipped() && !skipped.is_success() && !skipped.is_failure());
        assert!(sent.is_success() && !sent.is_failure() && !sent.is_skipped());
        assert!(failed.is_failure() && !failed.is_success() && !failed.is_skipped());
    }
}
