// ── Stat derivation ──
//
// Pure functions from raw queue records to classified stats and totals.
// Nothing here fails: unparsable numbers degrade to zero.

use crate::config::{DirectionTokens, NameMatch};
use crate::model::{QueueRecord, QueueStat, QueueStatus, Snapshot, SystemStat};

const CRITICAL_ABOVE: f64 = 90.0;
const WARNING_ABOVE: f64 = 70.0;
const HIGH_UTILIZATION_ABOVE: f64 = 80.0;

// ── Rates ────────────────────────────────────────────────────────────

/// Parse a RouterOS rate string (`"5M"`, `"1.5Mbps"`, `"800k"`, `"1000"`)
/// into bits per second.
///
/// Unit text (`bps`, `ps`) is stripped first. One multiplier applies,
/// checked in the order `k`/`K`, `M`, `G`. Anything that does not parse
/// afterwards, or parses to a negative or non-finite value, yields 0.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn parse_rate(text: &str) -> u64 {
    if text.is_empty() || text == "0" {
        return 0;
    }

    let mut s = text.replace("bps", "").replace("ps", "");
    let mut multiplier = 1.0_f64;

    if s.contains(['k', 'K']) {
        multiplier = 1e3;
        s = s.replace(['k', 'K'], "");
    } else if s.contains('M') {
        multiplier = 1e6;
        s = s.replace('M', "");
    } else if s.contains('G') {
        multiplier = 1e9;
        s = s.replace('G', "");
    }

    match s.trim().parse::<f64>() {
        Ok(value) => {
            let bps = value * multiplier;
            if bps.is_finite() && bps >= 0.0 {
                bps as u64
            } else {
                0
            }
        }
        Err(_) => 0,
    }
}

/// Human-readable rate with one decimal place, e.g. `"1.5 Gbps"`.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn format_rate(bps: u64) -> String {
    let value = bps as f64;
    if bps >= 1_000_000_000 {
        format!("{:.1} Gbps", value / 1e9)
    } else if bps >= 1_000_000 {
        format!("{:.1} Mbps", value / 1e6)
    } else if bps >= 1_000 {
        format!("{:.1} kbps", value / 1e3)
    } else {
        format!("{bps} bps")
    }
}

// ── Per-queue ────────────────────────────────────────────────────────

/// Current rate as a percentage of the max limit; 0 when the limit is
/// absent or zero.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn utilization(current: &str, max: &str) -> f64 {
    let max = parse_rate(max);
    if max == 0 {
        return 0.0;
    }
    parse_rate(current) as f64 / max as f64 * 100.0
}

pub fn classify(utilization: f64) -> QueueStatus {
    if utilization > CRITICAL_ABOVE {
        QueueStatus::Critical
    } else if utilization > WARNING_ABOVE {
        QueueStatus::Warning
    } else {
        QueueStatus::Normal
    }
}

pub fn derive(record: QueueRecord) -> QueueStat {
    let utilization = utilization(&record.rate, &record.max_limit);
    QueueStat {
        bytes: record.bytes.trim().parse().unwrap_or(0),
        packets: record.packets.trim().parse().unwrap_or(0),
        utilization,
        status: classify(utilization),
        name: record.name,
        rate: record.rate,
        max_limit: record.max_limit,
        limit_at: record.limit_at,
    }
}

// ── Totals ───────────────────────────────────────────────────────────

pub fn name_matches(name: &str, token: &str, mode: NameMatch) -> bool {
    match mode {
        NameMatch::SuffixOrPrefix => name.ends_with(token) || name.starts_with(token),
        NameMatch::Suffix => name.ends_with(token),
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn aggregate(stats: &[QueueStat], tokens: &DirectionTokens) -> SystemStat {
    let mut upload = 0_u64;
    let mut download = 0_u64;
    let mut high = 0;
    let mut utilization_sum = 0.0;

    for stat in stats {
        let rate = parse_rate(&stat.rate);
        if name_matches(&stat.name, &tokens.upload, tokens.match_mode) {
            upload = upload.saturating_add(rate);
        } else if name_matches(&stat.name, &tokens.download, tokens.match_mode) {
            download = download.saturating_add(rate);
        }

        if stat.utilization > HIGH_UTILIZATION_ABOVE {
            high += 1;
        }
        utilization_sum += stat.utilization;
    }

    let average_utilization = if stats.is_empty() {
        0.0
    } else {
        utilization_sum / stats.len() as f64
    };

    SystemStat {
        total_queues: stats.len(),
        total_upload: format_rate(upload),
        total_download: format_rate(download),
        high_utilization: high,
        average_utilization,
    }
}

/// Derive every record and aggregate them into a snapshot stamped with
/// `timestamp`. Record order is preserved.
pub fn build_snapshot(
    records: Vec<QueueRecord>,
    tokens: &DirectionTokens,
    timestamp: i64,
) -> Snapshot {
    let queues: Vec<QueueStat> = records.into_iter().map(derive).collect();
    let system_stats = aggregate(&queues, tokens);
    Snapshot {
        queues,
        system_stats,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(name: &str, rate: &str, max_limit: &str) -> QueueRecord {
        QueueRecord {
            name: name.into(),
            rate: rate.into(),
            max_limit: max_limit.into(),
            ..QueueRecord::default()
        }
    }

    #[test]
    fn parse_rate_units() {
        assert_eq!(parse_rate("10M"), 10_000_000);
        assert_eq!(parse_rate("1.5Mbps"), 1_500_000);
        assert_eq!(parse_rate("800k"), 800_000);
        assert_eq!(parse_rate("800Kbps"), 800_000);
        assert_eq!(parse_rate("2G"), 2_000_000_000);
        assert_eq!(parse_rate("1000"), 1000);
        assert_eq!(parse_rate(" 64 kbps "), 64_000);
    }

    #[test]
    fn parse_rate_degrades_to_zero() {
        assert_eq!(parse_rate(""), 0);
        assert_eq!(parse_rate("0"), 0);
        assert_eq!(parse_rate("abc"), 0);
        assert_eq!(parse_rate("-5M"), 0);
        assert_eq!(parse_rate("inf"), 0);
        assert_eq!(parse_rate("NaN"), 0);
    }

    #[test]
    fn format_rate_thresholds() {
        assert_eq!(format_rate(0), "0 bps");
        assert_eq!(format_rate(999), "999 bps");
        assert_eq!(format_rate(1_000), "1.0 kbps");
        assert_eq!(format_rate(1_500_000), "1.5 Mbps");
        assert_eq!(format_rate(24_000_000), "24.0 Mbps");
        assert_eq!(format_rate(2_500_000_000), "2.5 Gbps");
    }

    #[test]
    fn utilization_and_status() {
        assert!((utilization("5M", "10M") - 50.0).abs() < 1e-9);
        assert!((utilization("19M", "20M") - 95.0).abs() < 1e-9);
        assert!(utilization("5M", "").abs() < f64::EPSILON);
        assert!(utilization("5M", "0").abs() < f64::EPSILON);
        assert!(utilization("30M", "20M") > 100.0);

        assert_eq!(classify(90.0), QueueStatus::Warning);
        assert_eq!(classify(90.1), QueueStatus::Critical);
        assert_eq!(classify(70.0), QueueStatus::Normal);
        assert_eq!(classify(70.5), QueueStatus::Warning);
    }

    #[test]
    fn derive_zeroes_bad_counters() {
        let stat = derive(QueueRecord {
            bytes: "12x".into(),
            packets: "42".into(),
            ..record("A_OUT", "5M", "10M")
        });
        assert_eq!(stat.bytes, 0);
        assert_eq!(stat.packets, 42);
        assert_eq!(stat.status, QueueStatus::Normal);
        assert_eq!(stat.rate, "5M");
    }

    #[test]
    fn aggregate_empty() {
        let totals = aggregate(&[], &DirectionTokens::default());
        assert_eq!(
            totals,
            SystemStat {
                total_queues: 0,
                total_upload: "0 bps".into(),
                total_download: "0 bps".into(),
                high_utilization: 0,
                average_utilization: 0.0,
            }
        );
    }

    #[test]
    fn two_queue_snapshot() {
        let snapshot = build_snapshot(
            vec![record("A_OUT", "5M", "10M"), record("B_IN", "19M", "20M")],
            &DirectionTokens::default(),
            1_700_000_000,
        );

        let names: Vec<_> = snapshot.queues.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, ["A_OUT", "B_IN"]);
        assert_eq!(snapshot.queues[0].status, QueueStatus::Normal);
        assert_eq!(snapshot.queues[1].status, QueueStatus::Critical);

        let totals = &snapshot.system_stats;
        assert_eq!(totals.total_queues, 2);
        assert_eq!(totals.total_upload, "5.0 Mbps");
        assert_eq!(totals.total_download, "19.0 Mbps");
        assert_eq!(totals.high_utilization, 1);
        assert!((totals.average_utilization - 72.5).abs() < 1e-9);
        assert_eq!(snapshot.timestamp, 1_700_000_000);
    }

    #[test]
    fn upload_wins_and_prefix_matches() {
        let tokens = DirectionTokens::default();
        let stats: Vec<_> = [
            record("_IN_X_OUT", "1M", "10M"),
            record("_OUT_lan", "2M", "10M"),
            record("wan_IN", "4M", "10M"),
            record("OTHER", "8M", "10M"),
        ]
        .into_iter()
        .map(derive)
        .collect();

        let totals = aggregate(&stats, &tokens);
        assert_eq!(totals.total_upload, "3.0 Mbps");
        assert_eq!(totals.total_download, "4.0 Mbps");
    }

    #[test]
    fn suffix_mode_ignores_prefix() {
        let tokens = DirectionTokens {
            match_mode: NameMatch::Suffix,
            ..DirectionTokens::default()
        };
        let stats = vec![derive(record("_OUT_lan", "2M", "10M"))];
        assert_eq!(aggregate(&stats, &tokens).total_upload, "0 bps");
        assert!(name_matches("lan_OUT", "_OUT", NameMatch::Suffix));
    }
}
