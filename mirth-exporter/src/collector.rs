//! Per-scrape collection of Mirth channel metrics.
//!
//! Every call to [`MirthCollector::collect`] runs the fetcher once and turns
//! the report into samples. Nothing is kept between scrapes.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::exposition::{MetricDesc, MetricType, Sample, render};
use crate::fetcher::ReportFetcher;
use crate::parser::{ChannelStat, ChannelStatus, parse_channel_stats, parse_status};

pub static UP: MetricDesc = MetricDesc {
    name: "mirth_up",
    help: "Was the last Mirth query successful.",
    metric_type: MetricType::Gauge,
    label: None,
};

pub static CHANNELS_DEPLOYED: MetricDesc = MetricDesc {
    name: "mirth_channels_deployed",
    help: "How many channels are deployed.",
    metric_type: MetricType::Gauge,
    label: None,
};

pub static CHANNELS_STARTED: MetricDesc = MetricDesc {
    name: "mirth_channels_started",
    help: "How many of the deployed channels are started.",
    metric_type: MetricType::Gauge,
    label: None,
};

pub static MESSAGES_RECEIVED: MetricDesc = MetricDesc {
    name: "mirth_messages_received_total",
    help: "How many messages have been received (per channel).",
    metric_type: MetricType::Counter,
    label: Some("channel"),
};

pub static MESSAGES_FILTERED: MetricDesc = MetricDesc {
    name: "mirth_messages_filtered_total",
    help: "How many messages have been filtered (per channel).",
    metric_type: MetricType::Counter,
    label: Some("channel"),
};

pub static MESSAGES_QUEUED: MetricDesc = MetricDesc {
    name: "mirth_messages_queued",
    help: "How many messages are currently queued (per channel).",
    metric_type: MetricType::Gauge,
    label: Some("channel"),
};

pub static MESSAGES_SENT: MetricDesc = MetricDesc {
    name: "mirth_messages_sent_total",
    help: "How many messages have been sent (per channel).",
    metric_type: MetricType::Counter,
    label: Some("channel"),
};

pub static MESSAGES_ERRORED: MetricDesc = MetricDesc {
    name: "mirth_messages_errored_total",
    help: "How many messages have errored (per channel).",
    metric_type: MetricType::Counter,
    label: Some("channel"),
};

pub static DEGRADED_FIELDS: MetricDesc = MetricDesc {
    name: "mirth_exporter_degraded_fields",
    help: "Numeric fields in the last report that could not be parsed and were exported as zero.",
    metric_type: MetricType::Gauge,
    label: None,
};

/// All metric families, in exposition order.
static SCHEMA: [&MetricDesc; 9] = [
    &UP,
    &CHANNELS_DEPLOYED,
    &CHANNELS_STARTED,
    &MESSAGES_RECEIVED,
    &MESSAGES_FILTERED,
    &MESSAGES_QUEUED,
    &MESSAGES_SENT,
    &MESSAGES_ERRORED,
    &DEGRADED_FIELDS,
];

/// Collector that turns one Mirth CLI report into metric samples per scrape.
pub struct MirthCollector<F> {
    fetcher: F,
}

/// Create a shareable collector handle.
pub type SharedCollector<F> = Arc<MirthCollector<F>>;

impl<F: ReportFetcher> MirthCollector<F> {
    /// Create a new collector using the given report source.
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// The fixed metric schema.
    pub fn describe(&self) -> &'static [&'static MetricDesc] {
        &SCHEMA
    }

    /// Run one fetch-and-parse cycle.
    ///
    /// Always yields exactly one `mirth_up` sample. Status and channel
    /// samples follow only when the fetch succeeded.
    pub async fn collect(&self) -> Vec<Sample> {
        let started = Instant::now();

        let lines = match self.fetcher.fetch().await {
            Ok(lines) => lines,
            Err(e) => {
                error!(kind = e.kind(), "Mirth query failed: {}", e);
                return vec![Sample::new(&UP, 0.0)];
            }
        };

        let status = parse_status(&lines);
        let stats = parse_channel_stats(&lines);

        let mut samples = Vec::with_capacity(4 + stats.len() * 5);
        samples.push(Sample::new(&UP, 1.0));
        samples.extend(status_samples(status));

        let mut degraded = 0;
        for stat in &stats {
            degraded += stat.degraded_fields;
            samples.extend(channel_samples(stat));
        }
        samples.push(Sample::new(&DEGRADED_FIELDS, degraded as f64));

        debug!(
            deployed = status.deployed,
            started = status.started,
            channels = stats.len(),
            degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collected Mirth metrics"
        );

        samples
    }

    /// Collect and render in Prometheus exposition format.
    pub async fn scrape(&self) -> String {
        let samples = self.collect().await;
        render(self.describe(), &samples)
    }
}

fn status_samples(status: ChannelStatus) -> [Sample; 2] {
    [
        Sample::new(&CHANNELS_DEPLOYED, status.deployed as f64),
        Sample::new(&CHANNELS_STARTED, status.started as f64),
    ]
}

fn channel_samples(stat: &ChannelStat) -> [Sample; 5] {
    let channel = &stat.channel;
    [
        Sample::labeled(&MESSAGES_RECEIVED, channel, stat.received),
        Sample::labeled(&MESSAGES_FILTERED, channel, stat.filtered),
        Sample::labeled(&MESSAGES_QUEUED, channel, stat.queued),
        Sample::labeled(&MESSAGES_SENT, channel, stat.sent),
        Sample::labeled(&MESSAGES_ERRORED, channel, stat.errored),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher returning a canned report.
    struct StaticFetcher {
        lines: Vec<String>,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ReportFetcher for StaticFetcher {
        async fn fetch(&self) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.lines.clone())
        }
    }

    /// Fetcher that always fails.
    struct FailingFetcher;

    impl ReportFetcher for FailingFetcher {
        async fn fetch(&self) -> Result<Vec<String>> {
            Err(FetchError::UnexpectedOutput(String::new()))
        }
    }

    const REPORT: &[&str] = &[
        "Connected to Mirth Connect server @ https://127.0.0.1:8443 (3.12.0)",
        "ID                                   Status      Name",
        "3a9f1c00-1111-2222-3333-444455556666 Started     ADT Inbound",
        "7b2e4d10-aaaa-bbbb-cccc-ddddeeeeffff Stopped     Lab Results",
        "Received\tFiltered\tQueued\tSent\tErrored\tName",
        "1500\t0\t3\t1497\t0\tADT Inbound",
        "10\t2\t0\t8\t0\tLab Results",
        "",
    ];

    fn find<'a>(samples: &'a [Sample], name: &str, channel: Option<&str>) -> Option<&'a Sample> {
        samples
            .iter()
            .find(|s| s.desc.name == name && s.label_value.as_deref() == channel)
    }

    #[test]
    fn test_describe_schema() {
        let collector = MirthCollector::new(FailingFetcher);
        let names: Vec<&str> = collector.describe().iter().map(|d| d.name).collect();

        assert_eq!(
            names,
            vec![
                "mirth_up",
                "mirth_channels_deployed",
                "mirth_channels_started",
                "mirth_messages_received_total",
                "mirth_messages_filtered_total",
                "mirth_messages_queued",
                "mirth_messages_sent_total",
                "mirth_messages_errored_total",
                "mirth_exporter_degraded_fields",
            ]
        );
    }

    #[test]
    fn test_schema_types_and_labels() {
        for desc in SCHEMA {
            let per_channel = desc.name.starts_with("mirth_messages_");
            assert_eq!(desc.label.is_some(), per_channel, "{}", desc.name);

            let expected = if desc.name.ends_with("_total") {
                MetricType::Counter
            } else {
                MetricType::Gauge
            };
            assert_eq!(desc.metric_type, expected, "{}", desc.name);
        }
    }

    #[tokio::test]
    async fn test_collect_failure_emits_only_up() {
        let collector = MirthCollector::new(FailingFetcher);
        let samples = collector.collect().await;

        assert_eq!(samples, vec![Sample::new(&UP, 0.0)]);
    }

    #[tokio::test]
    async fn test_collect_success() {
        let collector = MirthCollector::new(StaticFetcher::new(REPORT));
        let samples = collector.collect().await;

        // up + 2 status + 2 channels * 5 + degraded
        assert_eq!(samples.len(), 14);
        assert_eq!(samples[0], Sample::new(&UP, 1.0));

        assert_eq!(find(&samples, "mirth_channels_deployed", None).unwrap().value, 2.0);
        assert_eq!(find(&samples, "mirth_channels_started", None).unwrap().value, 1.0);

        let received = find(&samples, "mirth_messages_received_total", Some("ADT Inbound"));
        assert_eq!(received.unwrap().value, 1500.0);
        let queued = find(&samples, "mirth_messages_queued", Some("ADT Inbound"));
        assert_eq!(queued.unwrap().value, 3.0);
        let filtered = find(&samples, "mirth_messages_filtered_total", Some("Lab Results"));
        assert_eq!(filtered.unwrap().value, 2.0);
        let sent = find(&samples, "mirth_messages_sent_total", Some("Lab Results"));
        assert_eq!(sent.unwrap().value, 8.0);
        let errored = find(&samples, "mirth_messages_errored_total", Some("Lab Results"));
        assert_eq!(errored.unwrap().value, 0.0);

        assert_eq!(find(&samples, "mirth_exporter_degraded_fields", None).unwrap().value, 0.0);
    }

    #[tokio::test]
    async fn test_collect_ignores_non_ascii_rows() {
        let collector = MirthCollector::new(StaticFetcher::new(&[
            "header",
            "١٢ ٣ ٠ ٨ ٠ Ghost",
            "10\u{a0}2\u{a0}0\u{a0}8\u{a0}0\u{a0}Nbsp",
            "10 2 0 8 0 Lab Results",
            "",
        ]));
        let samples = collector.collect().await;

        // up + 2 status + 1 channel * 5 + degraded
        assert_eq!(samples.len(), 9);
        assert!(find(&samples, "mirth_messages_received_total", Some("Ghost")).is_none());
        assert!(find(&samples, "mirth_messages_received_total", Some("Nbsp")).is_none());
        assert_eq!(find(&samples, "mirth_exporter_degraded_fields", None).unwrap().value, 0.0);
    }

    #[tokio::test]
    async fn test_collect_report_without_channels() {
        let collector = MirthCollector::new(StaticFetcher::new(&["a", "b", "c"]));
        let samples = collector.collect().await;

        let names: Vec<&str> = samples.iter().map(|s| s.desc.name).collect();
        assert_eq!(
            names,
            vec![
                "mirth_up",
                "mirth_channels_deployed",
                "mirth_channels_started",
                "mirth_exporter_degraded_fields",
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_fetches_once_per_call() {
        let collector = MirthCollector::new(StaticFetcher::new(REPORT));
        collector.collect().await;
        collector.collect().await;

        assert_eq!(collector.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_channel_samples_keep_report_order() {
        let collector = MirthCollector::new(StaticFetcher::new(&["5 0 0 5 0 B", "1 0 0 1 0 A", ""]));
        let samples = collector.collect().await;

        let channels: Vec<&str> = samples
            .iter()
            .filter(|s| s.desc.name == "mirth_messages_received_total")
            .filter_map(|s| s.label_value.as_deref())
            .collect();
        assert_eq!(channels, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_scrape_failure_renders_up_only() {
        let collector = MirthCollector::new(FailingFetcher);
        let output = collector.scrape().await;

        assert_eq!(
            output,
            "# HELP mirth_up Was the last Mirth query successful.\n\
             # TYPE mirth_up gauge\n\
             mirth_up 0\n"
        );
    }

    #[tokio::test]
    async fn test_scrape_success_renders_all_families() {
        let collector = MirthCollector::new(StaticFetcher::new(REPORT));
        let output = collector.scrape().await;

        assert!(output.contains("mirth_up 1\n"));
        assert!(output.contains("# TYPE mirth_channels_deployed gauge\nmirth_channels_deployed 2\n"));
        assert!(output.contains("mirth_channels_started 1\n"));
        assert!(output.contains("# TYPE mirth_messages_received_total counter\n"));
        assert!(output.contains("mirth_messages_received_total{channel=\"ADT Inbound\"} 1500\n"));
        assert!(output.contains("# TYPE mirth_messages_queued gauge\n"));
        assert!(output.contains("mirth_messages_queued{channel=\"Lab Results\"} 0\n"));
        assert!(output.contains("mirth_messages_errored_total{channel=\"ADT Inbound\"} 0\n"));
        assert!(output.contains("mirth_exporter_degraded_fields 0\n"));
    }
}
