use chrono::{DateTime, Utc};

/// `Date` header layout, RFC 1123 in GMT.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Time source for the freshness window and for outgoing `Date` headers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// Parses an RFC 1123 / RFC 2822 date, falling back to RFC 3339.
pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|time| time.with_timezone(&Utc))
}
