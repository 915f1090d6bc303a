//! A small, synchronous client for sending metrics to a [statsd][statsd] daemon over UDP.
//!
//! [statsd]: https://github.com/statsd/statsd
//!
//! # Usage
//!
//! ```no_run
//! # use statsd_client::StatsdClientBuilder;
//! // First, create a builder.
//! //
//! // The builder can configure the remote host and port, the socket write timeout, sampling, and so on. By default,
//! // metrics are sent to `localhost:8125`.
//! let mut client = StatsdClientBuilder::default()
//!     .with_host("127.0.0.1")
//!     .with_port(8125)
//!     .build();
//!
//! // Counters can be incremented, decremented, or updated by an arbitrary amount, one or several at a time.
//! client.increment("requests", None).expect("valid metric name");
//! client.decrement(["connections.active", "connections.idle"], None).expect("valid metric names");
//! client.update("bytes_received", 1024, None).expect("valid metric name");
//!
//! // Only send about one in ten of these calls. The daemon scales the counts it receives back up.
//! client.increment("cache.lookups", 0.1).expect("valid metric name");
//!
//! // Timings are in whole milliseconds.
//! client.timing("request.duration", 345.0, None).expect("valid metric name");
//!
//! // Gauges are never sampled, and take `(name, value)` pairs.
//! client.gauge([("load", 0.98), ("memory.used", 2048.0)]).expect("valid metric names");
//! ```
//!
//! # Wire format
//!
//! Each metric is sent as a line of the form `<name>:<value>|<type>[|@<sample-rate>]`, where the type is `c` for
//! counters, `ms` for timings, and `g` for gauges. The sample rate is only present when it is below one.
//!
//! Every metric name in a call goes out as its own datagram. Several values for the same name in one call, such as two
//! readings of the same gauge, share their name's datagram as newline-separated lines.
//!
//! # Sampling
//!
//! Sampling is decided once per call: when a call updates several metrics at a sample rate below one, either all of
//! them are sent or none are.
//!
//! # Delivery
//!
//! UDP offers no delivery guarantee, and the client does not try to add one: there are no retries, no acknowledgements,
//! and no queueing. Each operation reports what happened through a [`SendOutcome`], and only returns an error for
//! malformed arguments.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod batch;
pub use self::batch::Batch;

mod builder;
pub use self::builder::{BuildError, StatsdClientBuilder};

mod client;
pub use self::client::{Names, StatsdClient};

mod error;
pub use self::error::Error;

pub mod format;

mod sampling;
pub use self::sampling::{sample, SampleRate};

mod telemetry;
mod transport;
pub use self::transport::SendOutcome;
