use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    OnTime,
    Late,
}

/// Where a day-record sits in the check-in / check-out lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    Empty,
    CheckedIn,
    CheckedOut,
}

/// One side of a day-record: everything captured at check-in or check-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckPoint {
    #[schema(example = "2026-01-05T08:02:11", format = "date-time", value_type = String)]
    pub time: NaiveDateTime,
    #[schema(example = 20.962448)]
    pub latitude: f64,
    #[schema(example = 105.790762)]
    pub longitude: f64,
    #[schema(example = "1 Office Street", nullable = true)]
    pub address: Option<String>,
    #[schema(example = "http://localhost:8001/uploads/attendance/checkin/2026-01-05/selfie_1.jpg")]
    pub evidence_url: String,
    #[schema(example = "iPhone 15")]
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceDayRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub day: NaiveDate,
    pub checkin: Option<CheckPoint>,
    pub checkout: Option<CheckPoint>,
    #[schema(example = 1, nullable = true)]
    pub shift_id: Option<u64>,
    pub work_status: Option<WorkStatus>,
    #[schema(nullable = true)]
    pub leave_status: Option<String>,
}

impl AttendanceDayRecord {
    pub fn state(&self) -> DayState {
        match (&self.checkin, &self.checkout) {
            (None, _) => DayState::Empty,
            (Some(_), None) => DayState::CheckedIn,
            (Some(_), Some(_)) => DayState::CheckedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Shift {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Morning")]
    pub name: String,
    #[schema(example = "08:00:00", format = "time", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "17:00:00", format = "time", value_type = String)]
    pub end_time: NaiveTime,
    /// Grace period after `start_time` before a check-in counts as late
    #[schema(example = 15)]
    pub late_after_min: u32,
}

impl Shift {
    /// Latest instant on `day` that still counts as on time.
    pub fn late_cutoff(&self, day: NaiveDate) -> NaiveDateTime {
        day.and_time(self.start_time) + TimeDelta::minutes(i64::from(self.late_after_min))
    }

    pub fn work_status_at(&self, checked_in_at: NaiveDateTime) -> WorkStatus {
        if checked_in_at > self.late_cutoff(checked_in_at.date()) {
            WorkStatus::Late
        } else {
            WorkStatus::OnTime
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn morning_shift() -> Shift {
        Shift {
            id: 1,
            name: "Morning".into(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            late_after_min: 15,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn check_in_within_grace_period_is_on_time() {
        let shift = morning_shift();
        assert_eq!(shift.work_status_at(at(7, 55, 0)), WorkStatus::OnTime);
        assert_eq!(shift.work_status_at(at(8, 15, 0)), WorkStatus::OnTime);
    }

    #[test]
    fn check_in_after_cutoff_is_late() {
        let shift = morning_shift();
        assert_eq!(shift.work_status_at(at(8, 15, 1)), WorkStatus::Late);
        assert_eq!(shift.work_status_at(at(13, 0, 0)), WorkStatus::Late);
    }

    #[test]
    fn grace_period_crossing_midnight_does_not_wrap() {
        let shift = Shift {
            start_time: NaiveTime::from_hms_opt(23, 50, 0).unwrap(),
            late_after_min: 30,
            ..morning_shift()
        };
        assert_eq!(shift.work_status_at(at(23, 59, 59)), WorkStatus::OnTime);
    }

    #[test]
    fn work_status_uses_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&WorkStatus::OnTime).unwrap(), "\"ON_TIME\"");
        assert_eq!(WorkStatus::Late.to_string(), "LATE");
        assert_eq!("ON_TIME".parse::<WorkStatus>().unwrap(), WorkStatus::OnTime);
    }

    #[test]
    fn state_follows_populated_sides() {
        let point = CheckPoint {
            time: at(8, 0, 0),
            latitude: 0.0,
            longitude: 0.0,
            address: None,
            evidence_url: "u".into(),
            device: "d".into(),
        };
        let mut record = AttendanceDayRecord {
            id: 1,
            employee_id: 7,
            day: at(0, 0, 0).date(),
            checkin: None,
            checkout: None,
            shift_id: None,
            work_status: None,
            leave_status: None,
        };
        assert_eq!(record.state(), DayState::Empty);
        record.checkin = Some(point.clone());
        assert_eq!(record.state(), DayState::CheckedIn);
        record.checkout = Some(point);
        assert_eq!(record.state(), DayState::CheckedOut);
    }
}
