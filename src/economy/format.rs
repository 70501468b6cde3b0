//! Formatting helpers for outcome texts.

use chrono::Duration;
use rust_decimal::Decimal;

/// `$1,234` or `$1,234.50`.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2).normalize();
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = rounded.abs().to_string();
    let (integer, fraction) = match digits.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (digits.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, ch) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match fraction {
        Some(fraction) => format!("{}${}.{:0<2}", sign, grouped, fraction),
        None => format!("{}${}", sign, grouped),
    }
}

/// Remaining cooldown rounded up to the minute: `42m`, `3h 5m`, `24h`.
pub fn format_wait(remaining: Duration) -> String {
    let seconds = remaining.num_seconds().max(0);
    let mut hours = seconds / 3600;
    let mut minutes = (seconds % 3600 + 59) / 60;
    if minutes == 60 {
        hours += 1;
        minutes = 0;
    }

    match (hours, minutes) {
        (0, minutes) => format!("{}m", minutes.max(1)),
        (hours, 0) => format!("{}h", hours),
        (hours, minutes) => format!("{}h {}m", hours, minutes),
    }
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }

    result
}

/// Text progress bar, e.g. `███░░░░░░░`.
pub fn progress_bar(current: u64, max: u64, length: usize) -> String {
    let filled = if max == 0 {
        length
    } else {
        let ratio = current.min(max) as f64 / max as f64;
        ((ratio * length as f64).floor() as usize).min(length)
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(length - filled))
}
