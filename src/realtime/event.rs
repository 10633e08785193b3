use serde::Serialize;
use strum_macros::IntoStaticStr;

use crate::model::{attendance::AttendanceDayRecord, leave_request::LeaveRequest};

/// Domain change pushed to every live subscriber.
///
/// On the wire: `{"type": "<NAME>", "data": <payload>}`.
#[derive(Debug, Clone, Serialize, IntoStaticStr)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    #[serde(rename = "ATTENDANCE_CHECKIN")]
    #[strum(serialize = "ATTENDANCE_CHECKIN")]
    AttendanceCheckedIn(AttendanceDayRecord),

    #[serde(rename = "ATTENDANCE_CHECKOUT")]
    #[strum(serialize = "ATTENDANCE_CHECKOUT")]
    AttendanceCheckedOut(AttendanceDayRecord),

    #[serde(rename = "CREATE_LEAVE_REQUEST")]
    #[strum(serialize = "CREATE_LEAVE_REQUEST")]
    LeaveCreated(LeaveRequest),

    #[serde(rename = "LEAVE_APPROVED")]
    #[strum(serialize = "LEAVE_APPROVED")]
    LeaveApproved(LeaveRequest),

    #[serde(rename = "LEAVE_REJECTED")]
    #[strum(serialize = "LEAVE_REJECTED")]
    LeaveRejected(LeaveRequest),

    #[serde(rename = "LEAVE_CANCELED")]
    #[strum(serialize = "LEAVE_CANCELED")]
    LeaveCanceled(LeaveRequest),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::{LeaveStatus, LeaveType};
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::Value;

    fn leave() -> LeaveRequest {
        LeaveRequest {
            id: 9,
            employee_id: 1000,
            leave_type: LeaveType::Sick,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
            reason: Some("flu".into()),
            status: LeaveStatus::Approved,
            reviewed_by: Some(1),
            reviewed_at: Some(Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()),
            created_at: Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn envelope_carries_type_and_data() {
        let event = DomainEvent::LeaveApproved(leave());
        let wire: Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();

        assert_eq!(wire["type"], "LEAVE_APPROVED");
        assert_eq!(wire["data"], serde_json::to_value(leave()).unwrap());
    }

    #[test]
    fn names_match_wire_types() {
        let record = AttendanceDayRecord {
            id: 1,
            employee_id: 1000,
            day: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            checkin: None,
            checkout: None,
            shift_id: None,
            work_status: None,
            leave_status: None,
        };
        let events = [
            DomainEvent::AttendanceCheckedIn(record.clone()),
            DomainEvent::AttendanceCheckedOut(record),
            DomainEvent::LeaveCreated(leave()),
            DomainEvent::LeaveRejected(leave()),
            DomainEvent::LeaveCanceled(leave()),
        ];
        for event in events {
            let wire: Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
            assert_eq!(wire["type"], event.name());
        }
    }
}
