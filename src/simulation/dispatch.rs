//! Recent-dispatch log: a bounded, newest-first record of where requests went.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::core::types::Server;

/// Capacity of each A/B group's log
pub const GROUP_LOG_CAPACITY: usize = 100;
/// Capacity of the single-pool dispatcher's log
pub const DISPATCHER_LOG_CAPACITY: usize = 40;

/// One processed request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRecord {
    pub request_id: u64,
    pub server_id: String,
    pub server_label: String,
    pub host: String,
    pub weight: u32,
    pub region: String,
    pub latency_ms: u64,
    pub is_error: bool,
    pub at: DateTime<Utc>,
}

impl DispatchRecord {
    pub fn new(request_id: u64, server: &Server, latency_ms: u64, is_error: bool) -> Self {
        Self {
            request_id,
            server_id: server.id.clone(),
            server_label: server.label.clone(),
            host: server.host.clone(),
            weight: server.weight,
            region: server.region.clone(),
            latency_ms,
            is_error,
            at: Utc::now(),
        }
    }
}

/// Fixed-capacity log; once full, the oldest entry is evicted per insert
#[derive(Debug, Clone)]
pub struct DispatchLog {
    entries: VecDeque<DispatchRecord>,
    capacity: usize,
}

impl DispatchLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest if the log is full
    pub fn record(&mut self, record: DispatchRecord) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(record);
        self.entries.truncate(self.capacity);
    }

    /// Up to `limit` most recent records, newest first
    pub fn recent(&self, limit: usize) -> Vec<DispatchRecord> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DispatchRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::default_upstream_pool;

    fn record(request_id: u64) -> DispatchRecord {
        let server = Server::from_spec(&default_upstream_pool()[0]);
        DispatchRecord::new(request_id, &server, 40, false)
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut log = DispatchLog::with_capacity(5);
        for id in 1..=12 {
            log.record(record(id));
            assert!(log.len() <= 5);
        }
        let ids: Vec<u64> = log.iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec![12, 11, 10, 9, 8]);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = DispatchLog::with_capacity(GROUP_LOG_CAPACITY);
        for id in 1..=30 {
            log.record(record(id));
        }
        let recent = log.recent(20);
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].request_id, 30);
        assert_eq!(recent[19].request_id, 11);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut log = DispatchLog::with_capacity(0);
        log.record(record(1));
        assert!(log.is_empty());
    }

    #[test]
    fn test_record_copies_target() {
        let entry = record(3);
        assert_eq!(entry.server_id, "backend-1");
        assert_eq!(entry.host, "backend1:4000");
        assert_eq!(entry.weight, 5);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["requestId"], 3);
        assert_eq!(json["isError"], false);
    }
}
