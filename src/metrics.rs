//! Metrics collection and export for the pool

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of pool activity counters.
///
/// # Examples
///
/// ```
/// use repool::{ManualScheduler, Pool, PoolConfig, PoolResult};
/// use std::sync::Arc;
///
/// let scheduler = Arc::new(ManualScheduler::new());
/// let pool = Pool::with_scheduler(
///     || PoolResult::Ok(0u64),
///     PoolConfig::default().with_max_idle(4),
///     scheduler,
/// )
/// .unwrap();
///
/// let object = pool.borrow_object().unwrap();
/// pool.return_object(object);
///
/// let metrics = pool.metrics();
/// assert_eq!(metrics.total_borrowed, 1);
/// assert_eq!(metrics.total_returned, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Objects created by the factory, on demand or during top-up.
    pub total_created: usize,

    /// Objects handed out by `borrow_object`.
    pub total_borrowed: usize,

    /// Objects handed back via `return_object` or a guard drop.
    pub total_returned: usize,

    /// Objects dropped by maintenance trims or a full bounded queue.
    pub total_discarded: usize,

    /// Factory calls that failed.
    pub factory_failures: usize,

    /// Idle objects at snapshot time (approximate).
    pub idle_objects: usize,
}

impl PoolMetrics {
    /// Export metrics as a string map.
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_discarded".to_string(), self.total_discarded.to_string());
        metrics.insert("factory_failures".to_string(), self.factory_failures.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics
    }
}

/// Exporter for the Prometheus exposition format.
pub struct MetricsExporter;

impl MetricsExporter {
    /// Render a snapshot in Prometheus exposition format.
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        output.push_str("# HELP pool_objects_idle Idle objects currently held by the pool\n");
        output.push_str("# TYPE pool_objects_idle gauge\n");
        output.push_str(&format!("pool_objects_idle{{{}}} {}\n", labels, metrics.idle_objects));

        output.push_str("# HELP pool_objects_created_total Objects created by the factory\n");
        output.push_str("# TYPE pool_objects_created_total counter\n");
        output.push_str(&format!(
            "pool_objects_created_total{{{}}} {}\n",
            labels, metrics.total_created
        ));

        output.push_str("# HELP pool_objects_borrowed_total Objects handed out to callers\n");
        output.push_str("# TYPE pool_objects_borrowed_total counter\n");
        output.push_str(&format!(
            "pool_objects_borrowed_total{{{}}} {}\n",
            labels, metrics.total_borrowed
        ));

        output.push_str("# HELP pool_objects_returned_total Objects handed back to the pool\n");
        output.push_str("# TYPE pool_objects_returned_total counter\n");
        output.push_str(&format!(
            "pool_objects_returned_total{{{}}} {}\n",
            labels, metrics.total_returned
        ));

        output.push_str("# HELP pool_objects_discarded_total Objects dropped by trims or a full queue\n");
        output.push_str("# TYPE pool_objects_discarded_total counter\n");
        output.push_str(&format!(
            "pool_objects_discarded_total{{{}}} {}\n",
            labels, metrics.total_discarded
        ));

        output.push_str("# HELP pool_factory_failures_total Factory calls that failed\n");
        output.push_str("# TYPE pool_factory_failures_total counter\n");
        output.push_str(&format!(
            "pool_factory_failures_total{{{}}} {}\n",
            labels, metrics.factory_failures
        ));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal counter store, shared by the hot paths and the maintenance
/// task.
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub total_borrowed: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub total_discarded: AtomicUsize,
    pub factory_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, idle_objects: usize) -> PoolMetrics {
        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_discarded: self.total_discarded.load(Ordering::Relaxed),
            factory_failures: self.factory_failures.load(Ordering::Relaxed),
            idle_objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_covers_every_counter() {
        let tracker = MetricsTracker::new();
        tracker.total_created.store(7, Ordering::Relaxed);
        tracker.factory_failures.store(2, Ordering::Relaxed);

        let exported = tracker.snapshot(3).export();
        assert_eq!(exported["total_created"], "7");
        assert_eq!(exported["factory_failures"], "2");
        assert_eq!(exported["idle_objects"], "3");
        assert_eq!(exported.len(), 6);
    }

    #[test]
    fn prometheus_output_carries_labels() {
        let metrics = MetricsTracker::new().snapshot(1);

        let mut tags = HashMap::new();
        tags.insert("service".to_string(), "api".to_string());

        let output = MetricsExporter::export_prometheus(&metrics, "buffers", Some(&tags));
        assert!(output.contains("pool_objects_idle"));
        assert!(output.contains("pool=\"buffers\""));
        assert!(output.contains("service=\"api\""));
    }
}
