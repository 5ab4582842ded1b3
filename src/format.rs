//! Human-readable durations, sizes and paths.

const BYTE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// `H시간 M분 S초`, dropping leading zero units. Seconds are always shown.
pub fn format_duration_secs(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}시간 {minutes}분 {seconds}초")
    } else if minutes > 0 {
        format!("{minutes}분 {seconds}초")
    } else {
        format!("{seconds}초")
    }
}

/// Server durations are nanoseconds; round to whole seconds first.
pub fn format_duration_nanos(nanos: u64) -> String {
    format_duration_secs((nanos as f64 / 1e9).round() as u64)
}

/// Binary (1024) units, promoted once the value reaches 1.0 in the next unit.
pub fn format_bytes(bytes: f64) -> String {
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", BYTE_UNITS[unit])
}

pub fn format_speed(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Keep the last two components: `/a/b/c/d` -> `.../c/d`.
pub fn short_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() <= 2 {
        return path.to_string();
    }
    format!(".../{}", parts[parts.len() - 2..].join("/"))
}
