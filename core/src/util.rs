//! Small helpers shared across the crate.

use std::sync::OnceLock;
use std::time::Instant;

/// Split `src` on `delim`, keeping empty elements.
///
/// An empty input has no elements; a trailing delimiter yields a final empty
/// element, so `"a:b:"` splits into `["a", "b", ""]`.
pub fn split(src: &str, delim: char) -> Vec<&str> {
    if src.is_empty() {
        Vec::new()
    } else {
        src.split(delim).collect()
    }
}

/// Microseconds on a monotonic clock, counted from the first call.
pub fn timestamp_us() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// Parse a float the way option values are read: surrounding whitespace is
/// ignored and anything unparsable reads as zero.
pub fn parse_f64_or_zero(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty("", vec![])]
    #[case::single("a", vec!["a"])]
    #[case::trailing("a:b:", vec!["a", "b", ""])]
    #[case::inner_empty("a::b", vec!["a", "", "b"])]
    #[case::only_delim(":", vec!["", ""])]
    fn test_split(#[case] src: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split(src, ':'), expected);
    }

    #[test]
    fn test_timestamp_is_monotonic() {
        let a = timestamp_us();
        let b = timestamp_us();
        assert!(b >= a);
    }

    #[test]
    fn test_parse_f64_or_zero() {
        assert_eq!(parse_f64_or_zero("2.5"), 2.5);
        assert_eq!(parse_f64_or_zero(" 10 "), 10.0);
        assert_eq!(parse_f64_or_zero("ten"), 0.0);
    }
}
