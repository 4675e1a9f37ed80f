/// Format a floating-point number with thousands separators and a fixed
/// number of decimal places.
///
/// # Examples
///
/// ```
/// use monitor_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Round at the target precision before splitting integer and fraction,
    // nudged by half an ULP so binary midpoints round the expected way.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // frac_str is "0.xy"; keep only the ".xy" suffix.
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Insert `,` separators into an unsigned decimal digit string.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - offset) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a monetary amount as a USD string with two decimal places.
///
/// # Examples
///
/// ```
/// use monitor_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(0.0), "$0.00");
/// ```
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("$-{}", format_number(amount.abs(), 2))
    } else {
        format!("${}", format_number(amount, 2))
    }
}

/// Format a duration in minutes as a compact human-readable string.
///
/// # Examples
///
/// ```
/// use monitor_core::formatting::format_time;
///
/// assert_eq!(format_time(45.0), "45m");
/// assert_eq!(format_time(60.0), "1h");
/// assert_eq!(format_time(225.0), "3h 45m");
/// ```
pub fn format_time(minutes: f64) -> String {
    let total_mins = minutes.round() as i64;
    if total_mins < 60 {
        format!("{}m", total_mins)
    } else {
        let hours = total_mins / 60;
        let mins = total_mins % 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Compact token count: raw below 1 000, `k` below 1 000 000, `M` above.
///
/// # Examples
///
/// ```
/// use monitor_core::formatting::format_tokens;
///
/// assert_eq!(format_tokens(812), "812");
/// assert_eq!(format_tokens(44_000), "44.0k");
/// assert_eq!(format_tokens(1_250_000), "1.25M");
/// ```
pub fn format_tokens(tokens: u64) -> String {
    if tokens < 1_000 {
        tokens.to_string()
    } else if tokens < 1_000_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        format!("{:.2}M", tokens as f64 / 1_000_000.0)
    }
}

/// `(part / whole) * 100`, or 0.0 when `whole` is zero.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    (part / whole) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_grouping() {
        assert_eq!(format_number(1_000_000.0, 0), "1,000,000");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(1_000.0, 0), "1,000");
        assert_eq!(format_number(12.0, 0), "12");
    }

    #[test]
    fn test_format_number_decimals() {
        assert_eq!(format_number(0.1305, 4), "0.1305");
        assert_eq!(format_number(2.5, 2), "2.50");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(92.0), "$92.00");
        assert_eq!(format_currency(0.1305), "$0.13");
        assert_eq!(format_currency(-3.5), "$-3.50");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0m");
        assert_eq!(format_time(32.0), "32m");
        assert_eq!(format_time(300.0), "5h");
        assert_eq!(format_time(192.0), "3h 12m");
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(44_000), "44.0k");
        assert_eq!(format_tokens(220_000), "220.0k");
        assert_eq!(format_tokens(2_000_000), "2.00M");
    }

    #[test]
    fn test_percentage() {
        assert!((percentage(920_000.0, 1_000_000.0) - 92.0).abs() < 1e-9);
        assert_eq!(percentage(5.0, 0.0), 0.0);
    }
}
