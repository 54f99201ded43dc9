pub trait Metrics: Send + Sync + 'static {
    /// Record a counter metric
    fn increment_counter(&self, name: &str, value: u64, labels: &[(&str, &str)]);

    /// Record a gauge metric (value that can go up and down)
    fn record_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Record a timing metric in milliseconds
    fn record_timing(&self, name: &str, value_ms: u64, labels: &[(&str, &str)]);

    /// Record the current queue depth (number of items waiting)
    fn record_queue_depth(&self, queue_name: &str, depth: u64) {
        self.record_gauge("queue_depth", depth as f64, &[("queue", queue_name)]);
    }

    /// Record when an item is enqueued
    fn record_item_pushed(&self, queue_name: &str) {
        self.increment_counter("item_pushed", 1, &[("queue", queue_name)]);
    }

    /// Record when an item is dequeued
    fn record_item_popped(&self, queue_name: &str) {
        self.increment_counter("item_popped", 1, &[("queue", queue_name)]);
    }

    /// Record a push rejected because the item was already queued
    fn record_duplicate_rejected(&self, queue_name: &str) {
        self.increment_counter("item_duplicate", 1, &[("queue", queue_name)]);
    }

    /// Record how long a successful push waited for capacity
    fn record_push_wait(&self, queue_name: &str, wait_ms: u64) {
        self.record_timing("push_wait", wait_ms, &[("queue", queue_name)]);
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment_counter(&self, _name: &str, _value: u64, _labels: &[(&str, &str)]) {}
    fn record_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
    fn record_timing(&self, _name: &str, _value_ms: u64, _labels: &[(&str, &str)]) {}
}
