use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveTime, Timelike};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::{schema::APPOINTMENTS, DataStore, Query};
use shared_models::schedule::{format_date, format_time, is_in_future, parse_date};

use crate::models::{AvailabilityWindow, DayAvailability, DaySlot, DoctorError};
use crate::services::doctor::DoctorService;

const MAX_WINDOWS: usize = 50;

pub struct AvailabilityService {
    store: Arc<dyn DataStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Bookable slot starts for one calendar day, each flagged as taken when
    /// a non-cancelled appointment already holds it or it has already begun.
    pub async fn day_availability(&self, doctor_id: Uuid, date: &str) -> Result<DayAvailability, DoctorError> {
        let date = parse_date(date).map_err(DoctorError::ValidationError)?;
        let doctor = DoctorService::new(self.store.clone()).get_doctor(doctor_id).await?;

        let windows: Vec<AvailabilityWindow> = doctor.windows_on(date).copied().collect();
        let starts = generate_slots(&windows, doctor.slot_minutes);

        let booked = self.booked_times(doctor_id, &format_date(date)).await?;
        debug!("Doctor {} has {} slots and {} bookings on {}", doctor_id, starts.len(), booked.len(), date);

        let slots = starts
            .into_iter()
            .map(|start| {
                let time = format_time(start);
                DaySlot { available: is_in_future(date, start) && !booked.contains(&time), time }
            })
            .collect();

        Ok(DayAvailability {
            doctor_id,
            date: format_date(date),
            slot_minutes: doctor.slot_minutes,
            slots,
        })
    }

    async fn booked_times(&self, doctor_id: Uuid, date: &str) -> Result<HashSet<String>, DoctorError> {
        let query = Query::new()
            .eq("doctor_id", doctor_id)
            .eq("date", date)
            .neq("status", "cancelled");

        let rows = self.store.select(APPOINTMENTS, &query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("time").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }
}

/// Slot starts at `slot_minutes` steps through each window; a slot must end
/// by the window end.
pub fn generate_slots(windows: &[AvailabilityWindow], slot_minutes: u32) -> Vec<NaiveTime> {
    let mut starts = Vec::new();
    if slot_minutes == 0 {
        return starts;
    }

    for window in windows {
        let end = minutes_of(window.end_time);
        let mut current = minutes_of(window.start_time);

        while current + slot_minutes <= end {
            if let Some(start) = NaiveTime::from_hms_opt(current / 60, current % 60, 0) {
                starts.push(start);
            }
            current += slot_minutes;
        }
    }

    starts.sort();
    starts.dedup();
    starts
}

/// Checks day range, ordering and per-day overlap; returns the windows
/// sorted by day and start time.
pub fn validate_windows(mut windows: Vec<AvailabilityWindow>) -> Result<Vec<AvailabilityWindow>, DoctorError> {
    if windows.len() > MAX_WINDOWS {
        return Err(DoctorError::ValidationError(format!("At most {} availability windows are allowed", MAX_WINDOWS)));
    }

    for window in &windows {
        if !(0..=6).contains(&window.day_of_week) {
            return Err(DoctorError::ValidationError(format!(
                "day_of_week must be between 0 (Sunday) and 6 (Saturday), got {}",
                window.day_of_week
            )));
        }
        if window.start_time >= window.end_time {
            return Err(DoctorError::ValidationError(format!(
                "Window start {} must be before end {}",
                format_time(window.start_time),
                format_time(window.end_time)
            )));
        }
    }

    windows.sort_by_key(|w| (w.day_of_week, w.start_time));

    for pair in windows.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if previous.day_of_week == next.day_of_week && previous.end_time > next.start_time {
            return Err(DoctorError::ValidationError(format!(
                "Windows {}-{} and {}-{} overlap on day {}",
                format_time(previous.start_time),
                format_time(previous.end_time),
                format_time(next.start_time),
                format_time(next.end_time),
                next.day_of_week
            )));
        }
    }

    Ok(windows)
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(day: i32, start: NaiveTime, end: NaiveTime) -> AvailabilityWindow {
        AvailabilityWindow { day_of_week: day, start_time: start, end_time: end }
    }

    #[test]
    fn slots_must_end_inside_window() {
        let slots = generate_slots(&[window(1, t(9, 0), t(10, 45))], 30);
        assert_eq!(slots, vec![t(9, 0), t(9, 30), t(10, 0)]);
    }

    #[test]
    fn slots_from_split_day_are_sorted() {
        let windows = [window(1, t(14, 0), t(15, 0)), window(1, t(8, 0), t(9, 0))];
        let slots = generate_slots(&windows, 60);
        assert_eq!(slots, vec![t(8, 0), t(14, 0)]);
    }

    #[test]
    fn late_window_does_not_wrap_past_midnight() {
        let slots = generate_slots(&[window(5, t(23, 0), t(23, 59))], 30);
        assert_eq!(slots, vec![t(23, 0)]);
    }

    #[test]
    fn rejects_bad_windows() {
        assert_matches!(
            validate_windows(vec![window(7, t(9, 0), t(10, 0))]),
            Err(DoctorError::ValidationError(_))
        );
        assert_matches!(
            validate_windows(vec![window(1, t(10, 0), t(9, 0))]),
            Err(DoctorError::ValidationError(_))
        );
        assert_matches!(
            validate_windows(vec![window(1, t(9, 0), t(12, 0)), window(1, t(11, 0), t(13, 0))]),
            Err(DoctorError::ValidationError(_))
        );
    }

    #[test]
    fn accepts_adjacent_and_cross_day_windows() {
        let windows = validate_windows(vec![
            window(2, t(9, 0), t(12, 0)),
            window(1, t(13, 0), t(17, 0)),
            window(1, t(9, 0), t(13, 0)),
        ])
        .unwrap();

        assert_eq!(windows[0], window(1, t(9, 0), t(13, 0)));
        assert_eq!(windows[2].day_of_week, 2);
    }
}
