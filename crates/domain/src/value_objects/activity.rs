//! How busy a channel looks, derived from recent message timestamps.

use chrono::{DateTime, Duration, Utc};

/// Number of recent messages inspected when describing activity.
pub const ACTIVITY_SAMPLE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    SomewhatActive,
    FairlyBusy,
    ExtremelyLively,
}

impl ActivityLevel {
    fn from_count(count: usize) -> Self {
        let ratio = count as f64 / ACTIVITY_SAMPLE_SIZE as f64;
        if ratio < 0.1 {
            Self::SomewhatActive
        } else if ratio < 0.5 {
            Self::FairlyBusy
        } else {
            Self::ExtremelyLively
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SomewhatActive => "somewhat active",
            Self::FairlyBusy => "fairly busy",
            Self::ExtremelyLively => "extremely lively",
        }
    }
}

/// Footer text for the status embed.
pub fn describe_activity(timestamps: &[DateTime<Utc>], now: DateTime<Utc>) -> String {
    let within = |window: Duration| {
        timestamps
            .iter()
            .filter(|ts| now.signed_duration_since(**ts) <= window)
            .count()
    };
    let last_hour = within(Duration::hours(1));
    let last_day = within(Duration::days(1));
    let last_week = within(Duration::weeks(1));

    if last_hour > 1 {
        format!(
            "Looks like it's been {} here very recently.",
            ActivityLevel::from_count(last_hour).as_str()
        )
    } else if last_day > 0 {
        format!(
            "Looks like it's been {} here over the past day.",
            ActivityLevel::from_count(last_day).as_str()
        )
    } else if last_week > 0 {
        format!(
            "Looks like it's been {} here over the past week.",
            ActivityLevel::from_count(last_week).as_str()
        )
    } else {
        "Looks it's been very quiet here recently.".to_string()
    }
}
