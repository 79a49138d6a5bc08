/// Millisecond sentinel meaning "never expires".
pub const PERMANENT: i64 = -1;

/// Parse a penalty duration: `<integer><unit>` with unit one of `ms`, `s`,
/// `m`, `h`, `d`, `w` (a bare integer means minutes), or a permanence
/// keyword. Returns `None` on malformed input so the caller can re-prompt.
pub fn parse_duration_ms(input: &str) -> Option<i64> {
    let input = input.trim().to_ascii_lowercase();
    if matches!(input.as_str(), "perm" | "permanent") {
        return Some(PERMANENT);
    }

    let (digits, scale) = if let Some(value) = input.strip_suffix("ms") {
        (value, 1)
    } else if let Some(value) = input.strip_suffix('s') {
        (value, 1_000)
    } else if let Some(value) = input.strip_suffix('m') {
        (value, 60_000)
    } else if let Some(value) = input.strip_suffix('h') {
        (value, 3_600_000)
    } else if let Some(value) = input.strip_suffix('d') {
        (value, 86_400_000)
    } else if let Some(value) = input.strip_suffix('w') {
        (value, 604_800_000)
    } else {
        (input.as_str(), 60_000)
    };

    let value: u64 = digits.parse().ok()?;
    i64::try_from(value).ok()?.checked_mul(scale)
}

/// Human-readable rendering used when substituting penalty commands.
pub fn format_duration_human(ms: i64) -> String {
    if ms < 0 {
        return "permanent".to_string();
    }
    if ms == 0 {
        return "0".to_string();
    }
    let seconds = ms / 1_000;
    if seconds < 60 {
        return pluralize(seconds, "second");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return pluralize(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return pluralize(hours, "hour");
    }
    let days = hours / 24;
    if days < 30 {
        return pluralize(days, "day");
    }
    pluralize(days / 30, "month")
}

fn pluralize(value: i64, unit: &str) -> String {
    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}
