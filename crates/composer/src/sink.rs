//! Collecting performance records in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use pipeline::{PerformanceRecord, PerformanceSink};

/// Keeps every [`PerformanceRecord`] for later inspection.
#[derive(Debug, Default)]
pub struct InMemoryPerformanceSink {
    records: Mutex<Vec<PerformanceRecord>>,
}

impl InMemoryPerformanceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PerformanceRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Aggregates the records per component.
    ///
    /// Components are keyed by name, or by instance id when unnamed, and
    /// returned in key order.
    pub fn summary(&self) -> Vec<ComponentSummary> {
        let mut by_component: BTreeMap<String, ComponentSummary> = BTreeMap::new();
        for record in self.lock().iter() {
            let key = record
                .component
                .as_ref()
                .map_or_else(|| record.instance.to_string(), |name| name.to_string());
            let entry = by_component
                .entry(key.clone())
                .or_insert_with(|| ComponentSummary::new(key));
            entry.documents += 1;
            if !record.success {
                entry.failures += 1;
            }
            entry.total_wait += record.wait;
            entry.total_process += record.process;
        }
        by_component.into_values().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PerformanceRecord>> {
        // A panicking recorder leaves the vector intact.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PerformanceSink for InMemoryPerformanceSink {
    fn record(&self, record: PerformanceRecord) {
        self.lock().push(record);
    }
}

/// Totals for one component across a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSummary {
    pub component: String,
    /// Documents processed, counting each retry attempt separately.
    pub documents: usize,
    pub failures: usize,
    pub total_wait: Duration,
    pub total_process: Duration,
}

impl ComponentSummary {
    fn new(component: String) -> Self {
        Self {
            component,
            documents: 0,
            failures: 0,
            total_wait: Duration::ZERO,
            total_process: Duration::ZERO,
        }
    }

    pub fn mean_wait(&self) -> Duration {
        mean(self.total_wait, self.documents)
    }

    pub fn mean_process(&self) -> Duration {
        mean(self.total_process, self.documents)
    }
}

fn mean(total: Duration, count: usize) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(count) => total / count,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

impl fmt::Display for ComponentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} documents, {} failed, mean wait {:?}, mean process {:?}",
            self.component,
            self.documents,
            self.failures,
            self.mean_wait(),
            self.mean_process()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{ComponentName, DocumentId, InstanceId, Timestamp};

    fn record(component: Option<&str>, instance: InstanceId, process_ms: u64, success: bool) -> PerformanceRecord {
        PerformanceRecord {
            instance,
            component: component.and_then(ComponentName::new),
            document: DocumentId::new("d").unwrap(),
            wait: Duration::from_millis(2),
            process: Duration::from_millis(process_ms),
            success,
            finished_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_summary_groups_by_component() {
        let sink = InMemoryPerformanceSink::new();
        let unnamed = InstanceId::new_random();
        sink.record(record(Some("ner"), InstanceId::new_random(), 10, true));
        sink.record(record(Some("ner"), InstanceId::new_random(), 30, false));
        sink.record(record(None, unnamed, 5, true));

        let summary = sink.summary();
        assert_eq!(summary.len(), 2);
        let ner = summary.iter().find(|s| s.component == "ner").unwrap();
        assert_eq!(ner.documents, 2);
        assert_eq!(ner.failures, 1);
        assert_eq!(ner.total_process, Duration::from_millis(40));
        assert_eq!(ner.mean_process(), Duration::from_millis(20));
        assert_eq!(ner.mean_wait(), Duration::from_millis(2));
        assert!(summary.iter().any(|s| s.component == unnamed.to_string()));
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_empty_summary() {
        let sink = InMemoryPerformanceSink::new();
        assert!(sink.is_empty());
        assert!(sink.summary().is_empty());
        assert_eq!(ComponentSummary::new("x".into()).mean_wait(), Duration::ZERO);
    }
}
