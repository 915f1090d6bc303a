use std::time::Duration;

use rand::Rng as _;
use statsd_client::StatsdClientBuilder;

fn main() {
    tracing_subscriber::fmt::init();

    let mut client = StatsdClientBuilder::default()
        .with_remote_address("localhost:8125")
        .expect("failed to parse remote address")
        .with_write_timeout(Duration::from_millis(250))
        .build();

    client.increment("idle_metric", None).expect("invalid metric name");

    let mut rng = rand::rng();

    // Loop over and over, pretending to do some work.
    loop {
        client.increment(["server.loops", "server.ticks"], None).expect("invalid metric names");

        let (_, outcome) = client
            .time("server.loop_duration", 0.5, || std::thread::sleep(Duration::from_millis(rng.random_range(10..50))))
            .expect("invalid metric name");
        if outcome.is_failure() {
            println!("failed to send timing, is a statsd daemon listening?");
        }

        client.gauge([("server.load", rng.random_range(0.0..1.0))]).expect("invalid gauge reading");

        if rng.random_bool(0.25) {
            client.decrement("server.lucky_iterations", None).expect("invalid metric name");
        }

        std::thread::sleep(Duration::from_secs(1));
    }
}
