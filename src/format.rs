//! Compact number formatting for popups and logs

const BASE_UNITS: [&str; 6] = ["", "k", "M", "B", "T", "Q"];

/// Suffix for the `idx`-th power of 1000: k, M, B, T, Q, then AA..ZZ
fn unit_suffix(idx: usize) -> String {
    if let Some(unit) = BASE_UNITS.get(idx) {
        return (*unit).to_string();
    }
    let pair = (idx - BASE_UNITS.len()).min(26 * 26 - 1);
    let first = char::from(b'A' + (pair / 26) as u8);
    let second = char::from(b'A' + (pair % 26) as u8);
    format!("{first}{second}")
}

const MAX_UNIT_INDEX: usize = BASE_UNITS.len() + 26 * 26 - 1;

/// Format an amount like `1.25M` or `42`
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return "0".to_string();
    }
    let sign = if n < 0.0 { "-" } else { "" };
    let mut n = n.abs();

    let mut idx = 0;
    while n >= 1000.0 && idx < MAX_UNIT_INDEX {
        n /= 1000.0;
        idx += 1;
    }

    let digits = if idx == 0 {
        format!("{}", n.floor())
    } else {
        let truncated = (n * 100.0).floor() / 100.0;
        let text = format!("{truncated:.2}");
        text.strip_suffix(".00").map(str::to_string).unwrap_or(text)
    };
    format!("{sign}{digits}{}", unit_suffix(idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_numbers_are_whole() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.9), "999");
        assert_eq!(format_number(-12.0), "-12");
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(format_number(1000.0), "1k");
        assert_eq!(format_number(1_250_000.0), "1.25M");
        assert_eq!(format_number(3_000_000_000.0), "3B");
        assert_eq!(format_number(1e18), "1AA");
        assert_eq!(format_number(1e21), "1AB");
    }

    #[test]
    fn test_non_finite() {
        assert_eq!(format_number(f64::NAN), "0");
        assert_eq!(format_number(f64::INFINITY), "0");
    }
}
