//! Rendering of metric updates into statsd line protocol fragments.
//!
//! A full metric line looks like `<name>:<value>|<type>[|@<sample-rate>]`. The functions here produce the part after
//! the colon (the "fragment"), which is what a [`Batch`][crate::Batch] stores per metric name. Framing the name in
//! front of the fragments happens when the transport builds the packet.

/// Largest magnitude below which every integral `f64` is exactly representable as an `i64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Metric type, as carried in the type tag of a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricType {
    /// Counter, tagged `c`.
    Counter,

    /// Timer in whole milliseconds, tagged `ms`.
    Timing,

    /// Gauge, tagged `g`.
    Gauge,
}

impl MetricType {
    /// Returns the protocol type tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "c",
            MetricType::Timing => "ms",
            MetricType::Gauge => "g",
        }
    }
}

#[derive(Clone, Copy)]
enum MetricValue {
    Integer(i64),
    FloatingPoint(f64),
}

struct MetricValueFormatter {
    int_writer: itoa::Buffer,
    float_writer: ryu::Buffer,
}

impl MetricValueFormatter {
    fn new() -> Self {
        Self { int_writer: itoa::Buffer::new(), float_writer: ryu::Buffer::new() }
    }

    fn format(&mut self, value: MetricValue) -> &str {
        match value {
            MetricValue::Integer(v) => self.int_writer.format(v),
            // Integral floats go out as `55` rather than `55.0`, everything else as the shortest decimal that
            // round-trips.
            MetricValue::FloatingPoint(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT_INTEGER => {
                self.int_writer.format(v as i64)
            }
            MetricValue::FloatingPoint(v) => self.float_writer.format(v),
        }
    }
}

fn fragment(value: MetricValue, metric_type: MetricType) -> String {
    let mut formatter = MetricValueFormatter::new();
    let value_str = formatter.format(value);
    let type_str = metric_type.as_str();

    let mut buf = String::with_capacity(value_str.len() + type_str.len() + 1);
    buf.push_str(value_str);
    buf.push('|');
    buf.push_str(type_str);
    buf
}

/// Formats a counter update, such as `1|c` or `-1|c`.
pub fn format_counter(delta: i64) -> String {
    fragment(MetricValue::Integer(delta), MetricType::Counter)
}

/// Formats a timing, such as `345|ms`.
///
/// The protocol carries no fractional timings, so the value is truncated toward zero.
pub fn format_timing(time_ms: f64) -> String {
    fragment(MetricValue::Integer(time_ms.trunc() as i64), MetricType::Timing)
}

/// Formats a gauge reading, such as `0.98|g`.
///
/// A missing value is reported as `0`.
pub fn format_gauge(value: Option<f64>) -> String {
    fragment(MetricValue::FloatingPoint(value.unwrap_or(0.0)), MetricType::Gauge)
}

/// Appends the sample rate annotation (`|@<rate>`) to a fragment.
pub(crate) fn append_sample_rate(fragment: &mut String, rate: f64) {
    let mut float_writer = ryu::Buffer::new();
    fragment.push_str("|@");
    fragment.push_str(float_writer.format(rate));
}

/// Writes the packet for a single metric name.
///
/// Each value becomes its own `<name>:<value>` line, and lines are separated by a newline, so several readings for the
/// same name travel together in one datagram.
pub(crate) fn write_packet(buf: &mut String, name: &str, values: &[String]) {
    buf.clear();

    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }

        buf.push_str(name);
        buf.push(':');
        buf.push_str(value);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{append_sample_rate, format_counter, format_gauge, format_timing, write_packet, MetricType};

    #[test]
    fn counter() {
        // Cases are defined as: delta, expected output.
        let cases = [(1, "1|c"), (-1, "-1|c"), (0, "0|c"), (42, "42|c"), (i64::MIN, "-9223372036854775808|c")];

        for (delta, expected) in cases {
            assert_eq!(format_counter(delta), expected);
        }
    }

    #[test]
    fn timing() {
        // Cases are defined as: time in milliseconds, expected output.
        let cases = [
            (345.0, "345|ms"),
            (345.9, "345|ms"),
            (0.4, "0|ms"),
            (-12.7, "-12|ms"),
            (1_000_000.0, "1000000|ms"),
        ];

        for (time_ms, expected) in cases {
            assert_eq!(format_timing(time_ms), expected);
        }
    }

    #[test]
    fn gauge() {
        // Cases are defined as: gauge value, expected output.
        let cases = [
            (Some(0.98), "0.98|g"),
            (Some(55.0), "55|g"),
            (Some(-3.5), "-3.5|g"),
            (Some(0.0), "0|g"),
            (Some(-0.0), "0|g"),
            (Some(1e300), "1e300|g"),
            (Some(1.5e-7), "1.5e-7|g"),
            (None, "0|g"),
        ];

        for (value, expected) in cases {
            assert_eq!(format_gauge(value), expected);
        }
    }

    #[test]
    fn sample_rate_annotation() {
        // Cases are defined as: fragment, sample rate, expected output.
        let cases = [
            ("1|c", 0.5, "1|c|@0.5"),
            ("1|c", 0.999999, "1|c|@0.999999"),
            ("345|ms", 0.1, "345|ms|@0.1"),
            ("-1|c", 0.0, "-1|c|@0.0"),
        ];

        for (fragment, rate, expected) in cases {
            let mut fragment = fragment.to_string();
            append_sample_rate(&mut fragment, rate);
            assert_eq!(fragment, expected);
        }
    }

    #[test]
    fn packet_framing() {
        let mut buf = String::from("leftovers");

        write_packet(&mut buf, "x", &["1|c".to_string()]);
        assert_eq!(buf, "x:1|c");

        write_packet(&mut buf, "k", &["55|g".to_string(), "56|g".to_string()]);
        assert_eq!(buf, "k:55|g\nk:56|g");
    }

    #[test]
    fn type_tags() {
        assert_eq!(MetricType::Counter.as_str(), "c");
        assert_eq!(MetricType::Timing.as_str(), "ms");
        assert_eq!(MetricType::Gauge.as_str(), "g");
    }

    proptest! {
        #[test]
        fn gauge_round_trips(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let fragment = format_gauge(Some(value));
            let (value_str, type_str) = fragment.split_once('|').unwrap();

            prop_assert_eq!(type_str, "g");
            prop_assert_eq!(value_str.parse::<f64>().unwrap(), value);
        }

        #[test]
        fn timing_is_always_integral(time_ms in -1e12f64..1e12f64) {
            let fragment = format_timing(time_ms);
            let (value_str, type_str) = fragment.split_once('|').unwrap();

            prop_assert_eq!(type_str, "ms");
            prop_assert_eq!(value_str.parse::<i64>().unwrap(), time_ms.trunc() as i64);
        }
    }
}
