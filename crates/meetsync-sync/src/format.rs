use chrono::{DateTime, Utc};

/// Human-readable time until `start`, e.g. `Starts in 1 hour 5 minutes`.
pub fn format_time_until(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if start <= now {
        return "In progress".to_string();
    }
    let minutes = (start - now).num_minutes();
    if minutes < 60 {
        return format!("Starts in {}", plural(minutes, "minute"));
    }
    let hours = minutes / 60;
    if hours < 24 {
        let rest = minutes % 60;
        return if rest == 0 {
            format!("Starts in {}", plural(hours, "hour"))
        } else {
            format!("Starts in {} {}", plural(hours, "hour"), plural(rest, "minute"))
        };
    }
    format!("Starts in {}", plural(hours / 24, "day"))
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
