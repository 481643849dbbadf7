//! Metric descriptors, samples and the Prometheus text exposition format.

use std::fmt::Write;

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Static description of one metric family.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    /// Fully qualified metric name.
    pub name: &'static str,
    /// HELP text.
    pub help: &'static str,
    pub metric_type: MetricType,
    /// Name of the single variable label, if the family has one.
    pub label: Option<&'static str>,
}

/// One value of a metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: &'static MetricDesc,
    /// Value of `desc.label`, present iff the family is labeled.
    pub label_value: Option<String>,
    pub value: f64,
}

impl Sample {
    /// Create an unlabeled sample.
    pub fn new(desc: &'static MetricDesc, value: f64) -> Self {
        Self {
            desc,
            label_value: None,
            value,
        }
    }

    /// Create a sample carrying the family's label.
    pub fn labeled(desc: &'static MetricDesc, label_value: impl Into<String>, value: f64) -> Self {
        Self {
            desc,
            label_value: Some(label_value.into()),
            value,
        }
    }

    /// Format the label set for Prometheus exposition format.
    pub fn format_labels(&self) -> String {
        match (self.desc.label, &self.label_value) {
            (Some(name), Some(value)) => format!("{{{}=\"{}\"}}", name, escape_label_value(value)),
            _ => String::new(),
        }
    }
}

/// Render samples in Prometheus text exposition format.
///
/// Families are written in the order given by `schema`; families without
/// samples are omitted. Within a family, samples keep their input order.
pub fn render(schema: &[&'static MetricDesc], samples: &[Sample]) -> String {
    let mut output = String::with_capacity(samples.len() * 80);

    for desc in schema {
        let mut family = samples.iter().filter(|s| s.desc == *desc).peekable();
        if family.peek().is_none() {
            continue;
        }

        writeln!(output, "# HELP {} {}", desc.name, escape_help(desc.help)).ok();
        writeln!(output, "# TYPE {} {}", desc.name, desc.metric_type.as_str()).ok();

        for sample in family {
            writeln!(
                output,
                "{}{} {}",
                desc.name,
                sample.format_labels(),
                format_value(sample.value)
            )
            .ok();
        }
    }

    output
}

/// Escape a label value: backslash, double quote and newline.
fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Escape HELP text: backslash and newline.
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Whole numbers are written without a fractional part.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PLAIN: MetricDesc = MetricDesc {
        name: "test_plain",
        help: "A plain gauge.",
        metric_type: MetricType::Gauge,
        label: None,
    };

    static LABELED: MetricDesc = MetricDesc {
        name: "test_labeled_total",
        help: "A labeled counter.",
        metric_type: MetricType::Counter,
        label: Some("channel"),
    };

    #[test]
    fn test_render_family_header_and_samples() {
        let samples = vec![
            Sample::new(&PLAIN, 1.0),
            Sample::labeled(&LABELED, "A", 10.0),
            Sample::labeled(&LABELED, "B", 2.5),
        ];
        let output = render(&[&PLAIN, &LABELED], &samples);

        assert_eq!(
            output,
            "# HELP test_plain A plain gauge.\n\
             # TYPE test_plain gauge\n\
             test_plain 1\n\
             # HELP test_labeled_total A labeled counter.\n\
             # TYPE test_labeled_total counter\n\
             test_labeled_total{channel=\"A\"} 10\n\
             test_labeled_total{channel=\"B\"} 2.5\n"
        );
    }

    #[test]
    fn test_render_follows_schema_order() {
        let samples = vec![Sample::labeled(&LABELED, "A", 1.0), Sample::new(&PLAIN, 0.0)];
        let output = render(&[&PLAIN, &LABELED], &samples);

        let plain_pos = output.find("# TYPE test_plain").unwrap();
        let labeled_pos = output.find("# TYPE test_labeled_total").unwrap();
        assert!(plain_pos < labeled_pos);
    }

    #[test]
    fn test_render_skips_empty_families() {
        let output = render(&[&PLAIN, &LABELED], &[Sample::new(&PLAIN, 0.0)]);
        assert!(!output.contains("test_labeled_total"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[&PLAIN], &[]), "");
    }

    #[test]
    fn test_format_labels_escapes_value() {
        let sample = Sample::labeled(&LABELED, "Lab \"Results\"\n", 1.0);
        assert_eq!(sample.format_labels(), "{channel=\"Lab \\\"Results\\\"\\n\"}");
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("simple"), "simple");
        assert_eq!(escape_label_value("with\"quote"), "with\\\"quote");
        assert_eq!(escape_label_value("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_label_value("with\nnewline"), "with\\nnewline");
        assert_eq!(escape_label_value("a\\\"b"), "a\\\\\\\"b");
    }

    #[test]
    fn test_escape_help() {
        assert_eq!(escape_help("a\\b\nc"), "a\\\\b\\nc");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(3.25), "3.25");
        assert_eq!(format_value(12345678901.0), "12345678901");
    }

    #[test]
    fn test_metric_type_as_str() {
        assert_eq!(MetricType::Counter.as_str(), "counter");
        assert_eq!(MetricType::Gauge.as_str(), "gauge");
    }
}
