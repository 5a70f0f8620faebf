use lazy_regex::regex_is_match;

/// Parses an integer literal. In strict mode only the canonical form
/// (`0` or an optional `-` followed by a digit string without leading zeros) is
/// accepted. A leading `+` is never accepted.
pub fn parse_int(token: &str, strict: bool) -> Option<i64> {
    if token.starts_with('+') {
        return None;
    }
    if strict && !regex_is_match!(r"^(0|-?[1-9][0-9]*)$", token) {
        return None;
    }
    token.parse().ok()
}

/// Parses a finite real literal. Strict mode additionally rejects exponents,
/// leading zeros, bare dots and negative zero.
pub fn parse_real(token: &str, strict: bool) -> Option<f64> {
    if token.starts_with('+') {
        return None;
    }
    if strict {
        if !regex_is_match!(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?$", token) {
            return None;
        }
        if token.starts_with('-') && token[1..].chars().all(|c| c == '0' || c == '.') {
            return None;
        }
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_strict_int() {
        assert_eq!(parse_int("0", true), Some(0));
        assert_eq!(parse_int("-12", true), Some(-12));
        assert_eq!(parse_int("9223372036854775807", true), Some(i64::MAX));
        for bad in ["-0", "007", "+1", "1e3", "", "-", "9223372036854775808"] {
            assert_eq!(parse_int(bad, true), None, "{bad:?}");
        }
    }

    #[test]
    fn test_lenient_int() {
        assert_eq!(parse_int("007", false), Some(7));
        assert_eq!(parse_int("-0", false), Some(0));
        assert_eq!(parse_int("+1", false), None);
    }

    #[test]
    fn test_strict_real() {
        assert_eq!(parse_real("0", true), Some(0.0));
        assert_eq!(parse_real("-1.25", true), Some(-1.25));
        assert_eq!(parse_real("10.0", true), Some(10.0));
        for bad in ["-0", "-0.000", "01.5", ".5", "1.", "1e5", "+2.0", "nan", "inf"] {
            assert_eq!(parse_real(bad, true), None, "{bad:?}");
        }
    }

    #[test]
    fn test_lenient_real() {
        assert_eq!(parse_real("1e3", false), Some(1000.0));
        assert_eq!(parse_real(".5", false), Some(0.5));
        assert_eq!(parse_real("inf", false), None);
    }
}
