use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub quotes_published: IntCounterVec,
    pub publish_errors: IntCounterVec,
    pub fetch_errors: IntCounter,
    pub fetch_misses: IntCounter,
    pub reconnects: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let quotes_published = IntCounterVec::new(
            Opts::new(
                "bridge_quotes_published_total",
                "Quotes forwarded to both sink channels",
            ),
            &["symbol"],
        )
        .unwrap();

        let publish_errors = IntCounterVec::new(
            Opts::new(
                "bridge_publish_errors_total",
                "Non-fatal sink write failures",
            ),
            &["op"],
        )
        .unwrap();

        let fetch_errors = IntCounter::new(
            "bridge_fetch_errors_total",
            "Non-fatal tick fetch failures reported by the gateway",
        )
        .unwrap();

        let fetch_misses = IntCounter::new(
            "bridge_fetch_misses_total",
            "Polls that returned no tick for an instrument",
        )
        .unwrap();

        let reconnects = IntCounterVec::new(
            Opts::new("bridge_reconnects_total", "Successful reconnects"),
            &["endpoint"],
        )
        .unwrap();

        registry.register(Box::new(quotes_published.clone())).unwrap();
        registry.register(Box::new(publish_errors.clone())).unwrap();
        registry.register(Box::new(fetch_errors.clone())).unwrap();
        registry.register(Box::new(fetch_misses.clone())).unwrap();
        registry.register(Box::new(reconnects.clone())).unwrap();

        Self {
            registry,
            quotes_published,
            publish_errors,
            fetch_errors,
            fetch_misses,
            reconnects,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_registered() {
        let metrics = Metrics::new();
        metrics.quotes_published.with_label_values(&["EURUSD"]).inc();
        metrics.reconnects.with_label_values(&["terminal"]).inc();
        metrics.fetch_misses.inc();

        let families = metrics.registry.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"bridge_quotes_published_total"));
        assert!(names.contains(&"bridge_fetch_misses_total"));
        assert!(names.contains(&"bridge_reconnects_total"));
    }
}
