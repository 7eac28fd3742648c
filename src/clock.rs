//! Wall-clock abstraction for the `Date` header of decoy pages.

use chrono::{DateTime, Utc};

/// HTTP date layout (RFC 1123, always GMT).
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Clock trait so decoy pages can be rendered byte-for-byte in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current time formatted as an HTTP `Date` header value.
    ///
    /// Example: `Sun, 06 Nov 1994 08:49:37 GMT`
    fn http_date(&self) -> String {
        format_http_date(&self.now_utc())
    }
}

/// Format a timestamp the way HTTP servers write the `Date` header.
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format(HTTP_DATE_FORMAT).to_string()
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Frozen clock for deterministic decoy output.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: DateTime<Utc>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self {
            now: DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        }
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now
    }
}
