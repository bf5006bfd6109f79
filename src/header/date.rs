//! HTTP dates. RFC 1123, RFC 1036 and ANSI C `asctime()` forms are read,
//! RFC 1123 is written.
use std::time::SystemTime;

use crate::header::HeaderParseError;

pub fn read_date(date: &str) -> Result<SystemTime, HeaderParseError> {
    httpdate::parse_http_date(date.trim())
        .map_err(|e| HeaderParseError::new("date", &format!("{} in '{}'", e, date)))
}

pub fn format_date(date: SystemTime) -> String {
    httpdate::fmt_http_date(date)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_date_formats() {
        let expected = UNIX_EPOCH + Duration::from_secs(784111777);
        assert_eq!(read_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap(), expected);
        assert_eq!(read_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap(), expected);
        assert_eq!(read_date("Sun Nov  6 08:49:37 1994").unwrap(), expected);
        assert_eq!(format_date(expected), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert!(read_date("yesterday").is_err());
    }
}
