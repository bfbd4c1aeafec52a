/// Compact dollar amount: `$1.2B`, `$3.4M`, `$5.6K`, otherwise whole dollars
/// with thousands separators.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "$0".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();

    // The suffix is chosen after rounding so 999_950 reads `$1.0M`.
    let mut shown = magnitude.round();
    let mut suffix = "";
    for (scale, unit) in [(1e3, "K"), (1e6, "M"), (1e9, "B")] {
        if shown < 1000.0 {
            break;
        }
        shown = (magnitude / (scale / 10.0)).round() / 10.0;
        suffix = unit;
    }

    if suffix.is_empty() {
        format!("{sign}${}", group_thousands(shown as u64))
    } else {
        format!("{sign}${shown:.1}{suffix}")
    }
}

pub fn format_number(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    let whole = magnitude.trunc();
    let cents = ((magnitude - whole) * 100.0).round() as u64;
    if cents == 0 || cents == 100 {
        let whole = if cents == 100 { whole + 1.0 } else { whole };
        return format!("{sign}{}", group_thousands(whole as u64));
    }
    let fraction = format!("{cents:02}");
    format!(
        "{sign}{}.{}",
        group_thousands(whole as u64),
        fraction.trim_end_matches('0')
    )
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
