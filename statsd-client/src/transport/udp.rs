use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
    time::Duration,
};

use tracing::{debug, trace, warn};

use crate::{batch::Batch, format::write_packet, telemetry::TelemetryUpdate};

use super::{SendOutcome, Target, TransportConfiguration, WarnedTargets};

enum SendError {
    // No socket could be created for the target.
    Connect(io::Error),

    // The socket existed, but the datagram could not be handed to it.
    Transmit(io::Error),
}

fn connect(target: &Target, write_timeout: Duration) -> io::Result<UdpSocket> {
    let mut last_error = None;

    // Bind to the unspecified address of the same family as each resolved address, and take the first one that
    // connects.
    for addr in (target.host(), target.port()).to_socket_addrs()? {
        let local_addr = match addr {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let result = UdpSocket::bind(local_addr).and_then(|socket| {
            socket.connect(addr)?;
            socket.set_write_timeout(Some(write_timeout).filter(|timeout| !timeout.is_zero()))?;
            Ok(socket)
        });

        match result {
            Ok(socket) => return Ok(socket),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "target did not resolve to any address")
    }))
}

enum ClientState {
    // No socket has been created yet, or the last one was dropped.
    Disconnected,

    // Socket connected to the given target, ready to send.
    Ready(Target, UdpSocket),
}

impl ClientState {
    fn try_send(&mut self, target: &Target, write_timeout: Duration, payload: &[u8]) -> Result<usize, SendError> {
        loop {
            let old_state = std::mem::replace(self, ClientState::Disconnected);
            match old_state {
                ClientState::Disconnected => {
                    let socket = connect(target, write_timeout).map_err(SendError::Connect)?;
                    debug!(%target, "Created socket.");
                    *self = ClientState::Ready(target.clone(), socket);
                }
                ClientState::Ready(connected, socket) if connected == *target => {
                    let result = socket.send(payload);
                    if result.is_ok() {
                        *self = ClientState::Ready(connected, socket);
                    }

                    return result.map_err(SendError::Transmit);
                }
                ClientState::Ready(connected, _) => {
                    debug!(previous = %connected, %target, "Target changed, dropping cached socket.");
                }
            }
        }
    }

    fn connected_target(&self) -> Option<&Target> {
        match self {
            ClientState::Disconnected => None,
            ClientState::Ready(target, _) => Some(target),
        }
    }
}

/// UDP transport.
///
/// Holds a single socket, created on first use and reused for as long as the target stays the same. Each metric name
/// in a batch is sent as its own datagram.
pub struct Transport {
    client_state: ClientState,
    config: TransportConfiguration,
    warned_targets: WarnedTargets,
}

impl Transport {
    /// Create a new `Transport`.
    ///
    /// No socket is created until the first send.
    pub fn new(config: TransportConfiguration) -> Self {
        Transport {
            client_state: ClientState::Disconnected,
            warned_targets: WarnedTargets::new(config.warning_capacity),
            config,
        }
    }

    /// Returns the transport ID, as used in telemetry labels.
    pub const fn transport_id() -> &'static str {
        "udp"
    }

    /// Returns the target of the cached socket, if there is one.
    pub(crate) fn connected_target(&self) -> Option<&Target> {
        self.client_state.connected_target()
    }

    /// Drops the cached socket, if any.
    pub fn disconnect(&mut self) {
        self.client_state = ClientState::Disconnected;
    }

    /// Forgets every target that a socket creation failure was logged for.
    pub fn reset_warnings(&mut self) {
        self.warned_targets.clear();
    }

    /// Sends every metric in `batch` to `target`, one datagram per metric name.
    ///
    /// Transport errors are logged and reflected in the returned outcome, never raised.
    pub(crate) fn send(&mut self, target: &Target, batch: &Batch, telemetry: &mut TelemetryUpdate) -> SendOutcome {
        if batch.is_empty() {
            return SendOutcome::Skipped;
        }

        let mut packet = String::new();
        let mut packets_sent = 0;
        let mut packets_failed = 0;
        let mut bytes_sent = 0;

        for (index, (name, fragments)) in batch.iter().enumerate() {
            write_packet(&mut packet, name, fragments);

            match self.client_state.try_send(target, self.config.write_timeout, packet.as_bytes()) {
                Ok(len) if len == packet.len() => {
                    trace!(%target, bytes = len, "Sent packet.");
                    telemetry.track_packet_send_succeeded(len);
                    packets_sent += 1;
                    bytes_sent += len;
                }
                Ok(len) => {
                    debug!(%target, bytes = len, expected = packet.len(), "Packet was only partially sent.");
                    telemetry.track_packet_send_failed(packet.len());
                    packets_failed += 1;
                }
                Err(SendError::Transmit(e)) => {
                    debug!(%target, error = %e, "Failed to send packet.");
                    telemetry.track_packet_send_failed(packet.len());
                    packets_failed += 1;
                }
                Err(SendError::Connect(e)) => {
                    if self.warned_targets.first_failure(target) {
                        warn!(%target, error = %e, "Failed to create socket, metrics for this target are being dropped.");
                    }
                    telemetry.track_socket_error();

                    // Without a socket nothing else in the batch can go out either.
                    telemetry.track_packet_send_failed(packet.len());
                    for (name, fragments) in batch.iter().skip(index + 1) {
                        write_packet(&mut packet, name, fragments);
                        telemetry.track_packet_send_failed(packet.len());
                    }
                    packets_failed += batch.len() - index;
                    break;
                }
            }
        }

        if packets_failed == 0 {
            SendOutcome::Sent { packets: packets_sent, bytes: bytes_sent }
        } else {
            SendOutcome::Failed { sent: packets_sent, failed: packets_failed }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::Transport;
    use crate::{
        telemetry::TelemetryUpdate,
        transport::{SendOutcome, Target, TransportConfiguration},
        Batch,
    };

    fn transport() -> Transport {
        Transport::new(TransportConfiguration { write_timeout: Duration::from_secs(1), warning_capacity: 4 })
    }

    fn receiver() -> (UdpSocket, Target) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, Target::new("127.0.0.1".to_string(), port))
    }

    fn recv_string(socket: &UdpSocket) -> String {
        let mut buf = [0; 1024];
        let len = socket.recv(&mut buf).unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn empty_batch_is_skipped_without_a_socket() {
        let mut transport = transport();
        let mut telemetry = TelemetryUpdate::default();
        let target = Target::new("127.0.0.1".to_string(), 8125);

        let outcome = transport.send(&target, &Batch::new(), &mut telemetry);
        assert_eq!(outcome, SendOutcome::Skipped);
        assert!(transport.connected_target().is_none());
        assert!(!telemetry.had_updates());
    }

    #[test]
    fn one_packet_per_name() {
        let (receiver, target) = receiver();
        let mut transport = transport();
        let mut telemetry = TelemetryUpdate::default();

        let mut batch = Batch::new();
        batch.insert("a", "1|c").unwrap();
        batch.insert("k", "55|g").unwrap();
        batch.insert("k", "56|g").unwrap();

        let outcome = transport.send(&target, &batch, &mut telemetry);
        assert_eq!(outcome, SendOutcome::Sent { packets: 2, bytes: "a:1|c".len() + "k:55|g\nk:56|g".len() });

        assert_eq!(recv_string(&receiver), "a:1|c");
        assert_eq!(recv_string(&receiver), "k:55|g\nk:56|g");
    }

    #[test]
    fn socket_is_reused_until_target_changes() {
        let (first_receiver, first_target) = receiver();
        let (second_receiver, second_target) = receiver();
        let mut transport = transport();
        let mut telemetry = TelemetryUpdate::default();

        let mut batch = Batch::new();
        batch.insert("x", "1|c").unwrap();

        assert!(transport.send(&first_target, &batch, &mut telemetry).is_success());
        assert_eq!(transport.connected_target(), Some(&first_target));
        let first_local = transport_local_addr(&transport);

        assert!(transport.send(&first_target, &batch, &mut telemetry).is_success());
        assert_eq!(transport_local_addr(&transport), first_local);

        assert!(transport.send(&second_target, &batch, &mut telemetry).is_success());
        assert_eq!(transport.connected_target(), Some(&second_target));

        assert_eq!(recv_string(&first_receiver), "x:1|c");
        assert_eq!(recv_string(&first_receiver), "x:1|c");
        assert_eq!(recv_string(&second_receiver), "x:1|c");
    }

    #[test]
    fn unresolvable_target_fails_the_whole_batch() {
        let mut transport = transport();
        let mut telemetry = TelemetryUpdate::default();
        let target = Target::new("host.invalid".to_string(), 8125);

        let mut batch = Batch::new();
        batch.insert("a", "1|c").unwrap();
        batch.insert("b", "1|c").unwrap();

        let outcome = transport.send(&target, &batch, &mut telemetry);
        assert_eq!(outcome, SendOutcome::Failed { sent: 0, failed: 2 });
        assert!(transport.connected_target().is_none());
        assert_eq!(transport.warned_targets.len(), 1);

        // Further failures for the same target are remembered rather than warned about again.
        transport.send(&target, &batch, &mut telemetry);
        assert_eq!(transport.warned_targets.len(), 1);

        transport.reset_warnings();
        assert_eq!(transport.warned_targets.len(), 0);
    }

    #[test]
    fn disconnect_drops_socket() {
        let (_receiver, target) = receiver();
        let mut transport = transport();
        let mut telemetry = TelemetryUpdate::default();

        let mut batch = Batch::new();
        batch.insert("x", "1|c").unwrap();

        transport.send(&target, &batch, &mut telemetry);
        assert!(transport.connected_target().is_some());

        transport.disconnect();
        assert!(transport.connected_target().is_none());
    }

    #[test]
    fn oversized_packet_fails_alone() {
        let (receiver, target) = receiver();
        let mut transport = transport();
        let mut telemetry = TelemetryUpdate::default();

        // Larger than any UDP datagram, so the socket rejects it outright.
        let oversized = format!("{}|g", "9".repeat(70_000));

        let mut batch = Batch::new();
        batch.insert("a", "1|c").unwrap();
        batch.insert("big", oversized.as_str()).unwrap();
        batch.insert("c", "1|c").unwrap();

        let outcome = transport.send(&target, &batch, &mut telemetry);
        assert_eq!(outcome, SendOutcome::Failed { sent: 2, failed: 1 });

        // The socket was dropped by the failure, and recreated for the packet after it.
        assert_eq!(transport.connected_target(), Some(&target));
        assert_eq!(recv_string(&receiver), "a:1|c");
        assert_eq!(recv_string(&receiver), "c:1|c");

        let mut expected = TelemetryUpdate::default();
        expected.track_packet_send_succeeded("a:1|c".len());
        expected.track_packet_send_failed("big:".len() + oversized.len());
        expected.track_packet_send_succeeded("c:1|c".len());
        assert_eq!(telemetry, expected);
    }

    #[test]
    fn unresolvable_target_counts_every_dropped_byte() {
        let mut transport = transport();
        let mut telemetry = TelemetryUpdate::default();
        let target = Target::new("host.invalid".to_string(), 8125);

        let mut batch = Batch::new();
        batch.insert("a", "1|c").unwrap();
        batch.insert("k", "55|g").unwrap();
        batch.insert("k", "56|g").unwrap();

        let outcome = transport.send(&target, &batch, &mut telemetry);
        assert_eq!(outcome, SendOutcome::Failed { sent: 0, failed: 2 });

        let mut expected = TelemetryUpdate::default();
        expected.track_socket_error();
        expected.track_packet_send_failed("a:1|c".len());
        expected.track_packet_send_failed("k:55|g\nk:56|g".len());
        assert_eq!(telemetry, expected);
    }

    fn transport_local_addr(transport: &Transport) -> std::net::SocketAddr {
        match &transport.client_state {
            super::ClientState::Ready(_, socket) => socket.local_addr().unwrap(),
            super::ClientState::Disconnected => panic!("transport has no socket"),
        }
    }
}
