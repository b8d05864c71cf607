//! Request counters rendered in Prometheus text exposition format.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    /// Create a counter starting at zero.
    #[must_use]
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicU64::new(0),
        }
    }

    /// Add one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Metric name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Append this counter to a Prometheus exposition.
    pub fn write_prometheus(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} counter", self.name);
        let _ = writeln!(out, "{} {}", self.name, self.get());
    }
}

/// Render several counters as one exposition.
#[must_use]
pub fn render_prometheus<'a, I>(counters: I) -> String
where
    I: IntoIterator<Item = &'a Counter>,
{
    let mut out = String::new();
    for counter in counters {
        counter.write_prometheus(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new("mock_server_requests_total", "Requests received");
        assert_eq!(counter.get(), 0);

        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.name(), "mock_server_requests_total");
    }

    #[test]
    fn test_prometheus_format() {
        let hits = Counter::new("hits_total", "Hits");
        let misses = Counter::new("misses_total", "Misses");
        hits.inc();

        let output = render_prometheus([&hits, &misses]);
        assert!(output.contains("# HELP hits_total Hits\n"));
        assert!(output.contains("# TYPE misses_total counter\n"));
        assert!(output.contains("hits_total 1\n"));
        assert!(output.contains("misses_total 0\n"));
    }
}
