use std::fmt;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Deadline {
    pub title: String,
    pub course_code: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Overdue,
    Critical,
    Soon,
    Upcoming,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Urgency::Overdue => "overdue",
            Urgency::Critical => "critical",
            Urgency::Soon => "soon",
            Urgency::Upcoming => "upcoming",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub urgency: Urgency,
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let span = format!("{}d {}h {}m", self.days, self.hours, self.minutes);
        match self.urgency {
            Urgency::Overdue => write!(f, "overdue by {span}"),
            _ => write!(f, "{span} left"),
        }
    }
}

const DAY_SECS: i64 = 24 * 60 * 60;

pub fn urgency(remaining_secs: i64) -> Urgency {
    match remaining_secs {
        i64::MIN..=-1 => Urgency::Overdue,
        0..=86_399 => Urgency::Critical,
        86_400..=604_800 => Urgency::Soon,
        _ => Urgency::Upcoming,
    }
}

pub fn countdown(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Countdown {
    let remaining = (due_at - now).num_seconds();
    let span = remaining.abs();

    Countdown {
        days: span / DAY_SECS,
        hours: (span % DAY_SECS) / 3600,
        minutes: (span % 3600) / 60,
        urgency: urgency(remaining),
    }
}

/// Deadlines paired with their countdown, soonest due first.
pub fn schedule(deadlines: &[Deadline], now: DateTime<Utc>) -> Vec<(Deadline, Countdown)> {
    let mut ordered = deadlines.to_vec();
    ordered.sort_by(|a, b| a.due_at.cmp(&b.due_at));
    ordered
        .into_iter()
        .map(|deadline| {
            let countdown = countdown(deadline.due_at, now);
            (deadline, countdown)
        })
        .collect()
}

pub fn load_csv(csv_path: &Path) -> anyhow::Result<Vec<Deadline>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut deadlines = Vec::new();

    for result in reader.deserialize::<Deadline>() {
        deadlines.push(result.context("malformed deadline row")?);
    }

    Ok(deadlines)
}
