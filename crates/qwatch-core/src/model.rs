// ── Queue-tree domain types ──
//
// Raw records as read from the device, the derived per-queue stats, and
// the immutable snapshot that the cache and the feed hand out.

use qwatch_api::Record;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One queue-tree entry as reported by the device, fields verbatim.
///
/// Missing attributes become empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueRecord {
    pub name: String,
    pub rate: String,
    pub max_limit: String,
    pub limit_at: String,
    pub bytes: String,
    pub packets: String,
}

impl QueueRecord {
    pub fn from_record(record: &Record) -> Self {
        let field = |key: &str| record.get(key).unwrap_or_default().to_owned();
        Self {
            name: field("name"),
            rate: field("rate"),
            max_limit: field("max-limit"),
            limit_at: field("limit-at"),
            bytes: field("bytes"),
            packets: field("packets"),
        }
    }
}

/// Utilization band of a queue.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QueueStatus {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// Derived statistics for one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStat {
    pub name: String,
    pub bytes: u64,
    pub packets: u64,
    /// Current rate, as reported.
    pub rate: String,
    pub max_limit: String,
    pub limit_at: String,
    /// Percent of `max_limit` in use. May exceed 100.
    pub utilization: f64,
    pub status: QueueStatus,
}

/// Totals across every queue in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStat {
    pub total_queues: usize,
    /// Formatted sum of upload-queue rates, e.g. `"5.0 Mbps"`.
    pub total_upload: String,
    pub total_download: String,
    /// Queues above 80% utilization.
    pub high_utilization: usize,
    pub average_utilization: f64,
}

/// One complete poll result. Never mutated after construction; a newer
/// snapshot replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Device report order.
    pub queues: Vec<QueueStat>,
    pub system_stats: SystemStat,
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_fields_default_to_empty() {
        let record: Record = [("name", "A_OUT"), ("max-limit", "10M"), ("bytes", "100")]
            .into_iter()
            .collect();

        assert_eq!(
            QueueRecord::from_record(&record),
            QueueRecord {
                name: "A_OUT".into(),
                max_limit: "10M".into(),
                bytes: "100".into(),
                ..QueueRecord::default()
            }
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&QueueStatus::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(QueueStatus::Warning.to_string(), "warning");
    }

    #[test]
    fn snapshot_json_shape() {
        let snapshot = Snapshot {
            queues: vec![QueueStat {
                name: "A_OUT".into(),
                bytes: 100,
                packets: 10,
                rate: "5M".into(),
                max_limit: "10M".into(),
                limit_at: String::new(),
                utilization: 50.0,
                status: QueueStatus::Normal,
            }],
            system_stats: SystemStat {
                total_queues: 1,
                total_upload: "5.0 Mbps".into(),
                total_download: "0 bps".into(),
                high_utilization: 0,
                average_utilization: 50.0,
            },
            timestamp: 1_760_000_000,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "queues": [{
                    "name": "A_OUT", "bytes": 100, "packets": 10, "rate": "5M",
                    "max_limit": "10M", "limit_at": "", "utilization": 50.0,
                    "status": "normal"
                }],
                "system_stats": {
                    "total_queues": 1, "total_upload": "5.0 Mbps",
                    "total_download": "0 bps", "high_utilization": 0,
                    "average_utilization": 50.0
                },
                "timestamp": 1_760_000_000
            })
        );
    }
}
