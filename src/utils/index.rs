/// Formats an atomic amount with thousands separators, e.g. `12345607` with two decimal places
/// becomes `"123,456.07 TRTL"`.
pub fn pretty_print_amount(amount: i64, decimal_places: u32, ticker: &str) -> String {
    let divisor = 10u128.pow(decimal_places);
    let magnitude = u128::from(amount.unsigned_abs());
    let whole = (magnitude / divisor).to_string();
    let fraction = magnitude % divisor;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0 { "-" } else { "" };
    if decimal_places == 0 {
        format!("{}{} {}", sign, grouped, ticker)
    } else {
        format!(
            "{}{}.{:0width$} {}",
            sign,
            grouped,
            fraction,
            ticker,
            width = decimal_places as usize
        )
    }
}

pub fn is_hex64(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Seconds since the unix epoch.
pub fn unix_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_print_amount() {
        assert_eq!(pretty_print_amount(12345607, 2, "TRTL"), "123,456.07 TRTL");
        assert_eq!(pretty_print_amount(0, 2, "TRTL"), "0.00 TRTL");
        assert_eq!(pretty_print_amount(-1234, 2, "TRTL"), "-12.34 TRTL");
        assert_eq!(pretty_print_amount(100, 2, "TRTL"), "1.00 TRTL");
        assert_eq!(pretty_print_amount(1000000, 0, "XYZ"), "1,000,000 XYZ");
        assert_eq!(pretty_print_amount(i64::MIN, 2, "TRTL"), "-92,233,720,368,547,758.08 TRTL");
    }

    #[test]
    fn test_is_hex64() {
        assert!(is_hex64(&"a".repeat(64)));
        assert!(is_hex64(
            "b23df6e84c1dd619d3601a28e5948d92a0d096aea1621969c591a90e986794a0"
        ));
        assert!(!is_hex64(&"a".repeat(63)));
        assert!(!is_hex64(&"g".repeat(64)));
        assert!(!is_hex64(""));
    }
}
