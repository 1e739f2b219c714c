//! Text helpers for prompts and report lines

/// Longest prefix of `s` holding at most `max_chars` characters.
///
/// Counts `char`s, not bytes, so multi-byte text is never split.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &s[..byte_index],
        None => s,
    }
}

/// `$1,234.56` style amount. Negative amounts keep a leading minus.
pub fn format_usd(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}${}.{:02}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_ascii() {
        assert_eq!(truncate_chars("hello world", 5), "hello");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn truncate_multibyte() {
        assert_eq!(truncate_chars("ab—cd", 3), "ab—");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }

    #[test]
    fn usd_grouping() {
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(150.0), "$150.00");
        assert_eq!(format_usd(4500.0), "$4,500.00");
        assert_eq!(format_usd(75_000.0), "$75,000.00");
        assert_eq!(format_usd(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_usd(-2300.5), "-$2,300.50");
    }
}
