//! Human-readable sizes and durations for log output.

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format a duration in milliseconds, switching to seconds and minutes as it grows
pub fn format_duration_ms(millis: u128) -> String {
    let seconds = (millis / 1000) as u64;
    if millis < 1000 {
        format!("{}ms", millis)
    } else if seconds < 60 {
        format!("{:.1}s", millis as f64 / 1000.0)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
