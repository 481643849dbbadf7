//! Parsers for the `status` and `channel stats` sections of a Mirth CLI report.
//!
//! Both parsers are pure functions over the same set of lines. They never
//! fail: lines that do not match a row pattern are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

// Digit and whitespace classes are ASCII-only: `\d` and `\s` would also
// accept other Unicode digits and separators such as NBSP.

// <channel id> <state> ...
static DEPLOYED_ROW_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f-]{36}(?-u:\s)+[a-zA-Z]+(?-u:\s)+").unwrap());

static STARTED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\s)+Started(?-u:\s)+").unwrap());

// <received> <filtered> <queued> <sent> <errored> <channel name>
static STAT_ROW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^([0-9]+)(?-u:\s)+([0-9]+)(?-u:\s)+([0-9]+)(?-u:\s)+",
        r"([0-9]+)(?-u:\s)+([0-9]+)(?-u:\s)+(.+)$",
    ))
    .unwrap()
});

/// Aggregate deployment state of the channels listed by `status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStatus {
    /// Channels loaded in the Mirth runtime.
    pub deployed: usize,
    /// Deployed channels that are currently started.
    pub started: usize,
}

/// Message statistics of one channel, as listed by `channel stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStat {
    /// Channel display name, taken verbatim from the row.
    pub channel: String,
    pub received: f64,
    pub filtered: f64,
    pub queued: f64,
    pub sent: f64,
    pub errored: f64,
    /// Number of numeric fields that could not be parsed and were set to zero.
    pub degraded_fields: usize,
}

/// Check whether a line is a deployed-channel row of the `status` section.
pub fn is_deployed_row(line: &str) -> bool {
    DEPLOYED_ROW_REGEX.is_match(line)
}

/// Check whether a line mentions the `Started` state as a standalone token.
pub fn is_started_row(line: &str) -> bool {
    STARTED_REGEX.is_match(line)
}

/// Count deployed and started channels.
pub fn parse_status<S: AsRef<str>>(lines: &[S]) -> ChannelStatus {
    let mut status = ChannelStatus::default();

    for line in lines {
        let line: &str = line.as_ref();
        if is_deployed_row(line) {
            status.deployed += 1;
            if is_started_row(line) {
                status.started += 1;
            }
        }
    }

    status
}

/// Extract the statistics of a single `channel stats` row.
///
/// Returns `None` if the line is not a statistics row.
pub fn parse_channel_stat_line(line: &str) -> Option<ChannelStat> {
    let caps = STAT_ROW_REGEX.captures(line)?;

    let mut degraded_fields = 0;
    let received = parse_count(&caps[1], &mut degraded_fields);
    let filtered = parse_count(&caps[2], &mut degraded_fields);
    let queued = parse_count(&caps[3], &mut degraded_fields);
    let sent = parse_count(&caps[4], &mut degraded_fields);
    let errored = parse_count(&caps[5], &mut degraded_fields);

    Some(ChannelStat {
        channel: caps[6].to_string(),
        received,
        filtered,
        queued,
        sent,
        errored,
        degraded_fields,
    })
}

/// Parse one numeric field, falling back to zero and counting the failure.
fn parse_count(text: &str, degraded: &mut usize) -> f64 {
    match text.parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            *degraded += 1;
            0.0
        }
    }
}

/// Extract the statistics of every channel, in report order.
pub fn parse_channel_stats<S: AsRef<str>>(lines: &[S]) -> Vec<ChannelStat> {
    lines
        .iter()
        .filter_map(|line| parse_channel_stat_line(line.as_ref()))
        .collect()
}
