use chrono::{Datelike, NaiveDateTime};

use crate::models::courier::{Courier, ShiftWindow};

/// Whether the courier should currently appear in the rotation. Pure; the
/// caller re-evaluates on every poll because shift boundaries move with the
/// wall clock, not with events.
pub fn is_eligible(courier: &Courier, now: NaiveDateTime, default_shift: &ShiftWindow) -> bool {
    if !courier.active {
        return false;
    }

    if !courier.workdays.allows(now.weekday()) {
        return false;
    }

    courier.shift_window(default_shift).contains(now.time())
}
