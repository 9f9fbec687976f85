use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Unit {
    Itaqua,
    Poa,
    Suzano,
}

impl Unit {
    pub const ALL: [Unit; 3] = [Unit::Itaqua, Unit::Poa, Unit::Suzano];
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Unit::Itaqua => "ITAQUA",
            Unit::Poa => "POA",
            Unit::Suzano => "SUZANO",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourierStatus {
    Available,
    Called,
    Delivering,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BagType {
    #[default]
    Normal,
    Large,
}

/// Workday flags, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workdays(pub [bool; 7]);

impl Default for Workdays {
    fn default() -> Self {
        Workdays([true; 7])
    }
}

impl Workdays {
    pub fn allows(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_monday() as usize]
    }
}

/// A daily shift window. `end < start` means the window crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ShiftWindow {
    /// Inclusive on both boundaries.
    pub fn contains(&self, at: NaiveTime) -> bool {
        let minutes = |t: NaiveTime| t.hour() * 60 + t.minute();
        let (start, end, now) = (minutes(self.start), minutes(self.end), minutes(at));

        if end < start {
            now >= start || now <= end
        } else {
            now >= start && now <= end
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub unit: Unit,
    pub status: CourierStatus,
    pub active: bool,
    /// Ordering key for the available queue; smaller = called sooner.
    pub queue_position: DateTime<Utc>,
    pub workdays: Workdays,
    pub use_default_shift: bool,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
    pub departure_time: Option<DateTime<Utc>>,
    pub bag_type: BagType,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    /// Effective shift window: the courier's own window when configured,
    /// otherwise the process-wide default.
    pub fn shift_window(&self, default_shift: &ShiftWindow) -> ShiftWindow {
        if self.use_default_shift {
            return *default_shift;
        }

        match (self.shift_start, self.shift_end) {
            (Some(start), Some(end)) => ShiftWindow { start, end },
            _ => *default_shift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ShiftWindow;
    use chrono::NaiveTime;

    fn window(start: &str, end: &str) -> ShiftWindow {
        ShiftWindow {
            start: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
        }
    }

    fn at(hhmm: &str) -> NaiveTime {
        NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap()
    }

    #[test]
    fn daytime_window_contains_midday() {
        let w = window("09:00", "18:00");
        assert!(w.contains(at("12:00")));
        assert!(!w.contains(at("20:00")));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let w = window("16:00", "02:00");
        assert!(w.contains(at("23:00")));
        assert!(w.contains(at("01:30")));
        assert!(!w.contains(at("10:00")));
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let w = window("16:00", "02:00");
        assert!(w.contains(at("16:00")));
        assert!(w.contains(at("02:00")));
    }
}
