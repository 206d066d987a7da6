use std::time::Duration;

/// Output budget for stored result text.
pub const MAX_STORE_CHARS: usize = 65_536;

/// Request timeout applied to scan queries that have no explicit timeout.
pub const SCAN_DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub max_store_chars: usize,
    pub scan_default_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_store_chars: MAX_STORE_CHARS,
            scan_default_timeout: SCAN_DEFAULT_TIMEOUT,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn with_max_store_chars(mut self, max_store_chars: usize) -> Self {
        self.max_store_chars = max_store_chars;
        self
    }

    #[must_use]
    pub const fn with_scan_default_timeout(mut self, timeout: Duration) -> Self {
        self.scan_default_timeout = timeout;
        self
    }
}
