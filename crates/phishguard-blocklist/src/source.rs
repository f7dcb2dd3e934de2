//! Fixed table of blocklist sources and their fetch/parse formats.

use std::time::Duration;

/// Wire format a source's response is parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// One entry per line, blank lines and `#`-comments skipped.
    LineList,
    /// CSV with the entry in a named column.
    Csv {
        /// Zero-based column index holding the entry.
        column: usize,
    },
}

/// One configured remote blocklist source.
#[derive(Debug, Clone)]
pub struct BlocklistSource {
    /// Human-readable source name, recorded on matches.
    pub name: &'static str,
    /// URL to fetch.
    pub fetch_url: &'static str,
    /// Response format.
    pub format: SourceFormat,
    /// How often this source is considered stale.
    pub refresh_interval: Duration,
}

/// Per-fetch timeout, independent of the refresh interval.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Minimum time between refresh attempts, independent of per-source intervals.
pub const GLOBAL_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// The fixed table of sources this cache refreshes from.
#[must_use]
pub fn sources() -> &'static [BlocklistSource] {
    const SOURCES: &[BlocklistSource] = &[
        BlocklistSource {
            name: "openphish",
            fetch_url: "https://openphish.com/feed.txt",
            format: SourceFormat::LineList,
            refresh_interval: Duration::from_secs(3600),
        },
        BlocklistSource {
            name: "phishtank",
            fetch_url: "https://data.phishtank.com/data/online-valid.csv",
            format: SourceFormat::Csv { column: 1 },
            refresh_interval: Duration::from_secs(3600),
        },
        BlocklistSource {
            name: "urlhaus",
            fetch_url: "https://urlhaus.abuse.ch/downloads/text_online/",
            format: SourceFormat::LineList,
            refresh_interval: Duration::from_secs(3600),
        },
    ];
    SOURCES
}

/// Parse a fetched body according to its source's format into raw entry
/// strings (still un-normalised, un-classified as URL vs domain).
#[must_use]
pub fn parse_body(body: &str, format: SourceFormat) -> Vec<String> {
    match format {
        SourceFormat::LineList => body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect(),
        SourceFormat::Csv { column } => body
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').nth(column))
            .map(|s| s.trim().trim_matches('"').to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }
}
