use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::engine::eligibility::is_eligible;
use crate::models::courier::{Courier, CourierStatus, ShiftWindow};

/// The ordered available queue: status Available, eligible, ascending
/// `queue_position`. The position timestamp is the sole ordering signal.
pub fn available_queue(
    couriers: &[Courier],
    now: NaiveDateTime,
    default_shift: &ShiftWindow,
) -> Vec<Courier> {
    let mut queue: Vec<Courier> = couriers
        .iter()
        .filter(|c| c.status == CourierStatus::Available && is_eligible(c, now, default_shift))
        .cloned()
        .collect();

    queue.sort_by_key(|c| c.queue_position);
    queue
}

/// New strictly increasing positions anchored at `now`, one per id in the
/// requested order. Reordering is a full-queue rewrite, not a rank column.
pub fn reorder_positions(ordered_ids: &[Uuid], now: DateTime<Utc>) -> Vec<(Uuid, DateTime<Utc>)> {
    ordered_ids
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, now + Duration::milliseconds(index as i64)))
        .collect()
}

/// 1-based rank of a courier in the ordered queue.
pub fn position_of(queue: &[Courier], courier_id: Uuid) -> Option<usize> {
    queue
        .iter()
        .position(|c| c.id == courier_id)
        .map(|index| index + 1)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};
    use uuid::Uuid;

    use super::{available_queue, position_of, reorder_positions};
    use crate::models::courier::{
        BagType, Courier, CourierStatus, ShiftWindow, Unit, Workdays,
    };

    fn all_day_shift() -> ShiftWindow {
        ShiftWindow {
            start: NaiveTime::parse_from_str("00:00", "%H:%M").unwrap(),
            end: NaiveTime::parse_from_str("23:59", "%H:%M").unwrap(),
        }
    }

    fn at_noon() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-02 12:00", "%Y-%m-%d %H:%M").unwrap()
    }

    fn courier(name: &str, position_offset_secs: i64) -> Courier {
        Courier {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: "11999990000".to_string(),
            unit: Unit::Itaqua,
            status: CourierStatus::Available,
            active: true,
            queue_position: Utc::now() + Duration::seconds(position_offset_secs),
            workdays: Workdays::default(),
            use_default_shift: true,
            shift_start: None,
            shift_end: None,
            departure_time: None,
            bag_type: BagType::Normal,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn orders_by_ascending_position() {
        let a = courier("A", 10);
        let b = courier("B", 0);
        let c = courier("C", 20);

        let queue = available_queue(&[a.clone(), b.clone(), c.clone()], at_noon(), &all_day_shift());

        assert_eq!(
            queue.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![b.id, a.id, c.id]
        );
        assert_eq!(position_of(&queue, c.id), Some(3));
    }

    #[test]
    fn excludes_non_available_and_inactive() {
        let mut delivering = courier("D", 0);
        delivering.status = CourierStatus::Delivering;
        let mut inactive = courier("I", 1);
        inactive.active = false;
        let available = courier("A", 2);

        let queue = available_queue(
            &[delivering, inactive, available.clone()],
            at_noon(),
            &all_day_shift(),
        );

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, available.id);
    }

    #[test]
    fn reorder_rewrites_strictly_increasing_positions() {
        let a = courier("A", 0);
        let b = courier("B", 1);
        let c = courier("C", 2);
        let now = Utc::now();

        let rewritten = reorder_positions(&[c.id, a.id, b.id], now);

        assert_eq!(rewritten[0].0, c.id);
        assert!(rewritten[0].1 < rewritten[1].1);
        assert!(rewritten[1].1 < rewritten[2].1);
        assert_eq!(rewritten[0].1, now);
    }
}
