//! Normalization and classification of inbound log events.

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_LOG_LINES: usize = 500;

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x1B\x9B][\[()#;?]*(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-ORZcf-nqry=><]")
        .expect("ansi escape pattern")
});

/// Teardown noise emitted during an intentional stop, dropped entirely.
const IGNORE_KEYWORDS: [&str; 5] = [
    "forcibly closed",
    "connection upload closed",
    "raw-read tcp",
    "use of closed network connection",
    "context canceled",
];

const ERROR_MARKERS: [&str; 4] = [
    "ERROR",
    "FATAL",
    "bind: address already in use",
    "Access is denied",
];

pub fn clean_log(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    Benign,
    Error,
    Normal,
}

/// Classifies an already-cleaned log line.
pub fn classify_log_line(cleaned: &str) -> LogClass {
    if IGNORE_KEYWORDS
        .iter()
        .any(|keyword| cleaned.contains(keyword))
    {
        return LogClass::Benign;
    }

    if ERROR_MARKERS.iter().any(|marker| cleaned.contains(marker))
        || cleaned.starts_with("Error:")
        || cleaned.contains("failed")
    {
        return LogClass::Error;
    }

    LogClass::Normal
}

#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    lines: Vec<String>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
        if self.lines.len() > MAX_LOG_LINES {
            self.lines.remove(0);
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}
