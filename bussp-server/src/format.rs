//! Display helpers for riders.
//!
//! Labels are in Brazilian Portuguese, matching the SPTrans data.

use chrono::{DateTime, Utc};

/// `"{code} - {description}"`
pub fn line_label(code: i64, description: &str) -> String {
    format!("{code} - {description}")
}

/// Metres below 1 km, otherwise kilometres with one decimal.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Minutes until a bus arrives.
pub fn format_arrival_time(minutes: i64) -> String {
    match minutes {
        m if m <= 0 => "Chegando".to_string(),
        1 => "1 minuto".to_string(),
        m => format!("{m} minutos"),
    }
}

/// How long ago `then` was, relative to `now`.
pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 60 {
        return "agora".to_string();
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes} min atrás");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h atrás");
    }

    format!("{}d atrás", hours / 24)
}
