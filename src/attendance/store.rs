//! Persistence boundary for day-records and shifts.

use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, MySqlPool};

use super::error::StoreError;
use crate::model::attendance::{AttendanceDayRecord, CheckPoint, Shift, WorkStatus};

/// Check-in side of a day-record, ready to be written.
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub employee_id: u64,
    pub day: NaiveDate,
    pub point: CheckPoint,
    pub shift_id: u64,
    pub work_status: WorkStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub employee_id: Option<u64>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub limit: u64,
    pub offset: u64,
}

/// Storage for day-records.
///
/// Implementations must enforce uniqueness of `(employee_id, day)`:
/// `insert_check_in` reports a second record for the same identity as
/// [`StoreError::UniqueViolation`]. The guarded updates return `None` when
/// their guard no longer holds, so concurrent writers cannot overwrite a
/// side that is already populated.
pub trait AttendanceStore: Send + Sync {
    fn find_by_employee_and_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Option<AttendanceDayRecord>, StoreError>> + Send;

    fn find_shift(
        &self,
        shift_id: u64,
    ) -> impl Future<Output = Result<Option<Shift>, StoreError>> + Send;

    /// Every shift, earliest start first.
    fn list_shifts(&self) -> impl Future<Output = Result<Vec<Shift>, StoreError>> + Send;

    fn insert_check_in(
        &self,
        new: NewCheckIn,
    ) -> impl Future<Output = Result<AttendanceDayRecord, StoreError>> + Send;

    /// Fills the check-in side of `record_id` if it is still empty.
    fn fill_check_in(
        &self,
        record_id: u64,
        new: NewCheckIn,
    ) -> impl Future<Output = Result<Option<AttendanceDayRecord>, StoreError>> + Send;

    /// Fills the check-out side of `record_id` if it is checked in and not yet out.
    fn record_check_out(
        &self,
        record_id: u64,
        point: CheckPoint,
    ) -> impl Future<Output = Result<Option<AttendanceDayRecord>, StoreError>> + Send;

    /// Records in the window, newest first, plus the total matching count.
    fn history(
        &self,
        query: HistoryQuery,
    ) -> impl Future<Output = Result<(Vec<AttendanceDayRecord>, i64), StoreError>> + Send;
}

const RECORD_COLUMNS: &str = r#"
    id, employee_id, day,
    checkin_time, checkin_latitude, checkin_longitude, checkin_address, checkin_evidence, checkin_device,
    checkout_time, checkout_latitude, checkout_longitude, checkout_address, checkout_evidence, checkout_device,
    shift_id, work_status, leave_status
"#;

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    employee_id: u64,
    day: NaiveDate,
    checkin_time: Option<NaiveDateTime>,
    checkin_latitude: Option<f64>,
    checkin_longitude: Option<f64>,
    checkin_address: Option<String>,
    checkin_evidence: Option<String>,
    checkin_device: Option<String>,
    checkout_time: Option<NaiveDateTime>,
    checkout_latitude: Option<f64>,
    checkout_longitude: Option<f64>,
    checkout_address: Option<String>,
    checkout_evidence: Option<String>,
    checkout_device: Option<String>,
    shift_id: Option<u64>,
    work_status: Option<String>,
    leave_status: Option<String>,
}

/// A side exists exactly when its timestamp is set.
fn check_point(
    time: Option<NaiveDateTime>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    evidence_url: Option<String>,
    device: Option<String>,
) -> Option<CheckPoint> {
    Some(CheckPoint {
        time: time?,
        latitude: latitude.unwrap_or_default(),
        longitude: longitude.unwrap_or_default(),
        address,
        evidence_url: evidence_url.unwrap_or_default(),
        device: device.unwrap_or_default(),
    })
}

impl From<AttendanceRow> for AttendanceDayRecord {
    fn from(row: AttendanceRow) -> Self {
        AttendanceDayRecord {
            id: row.id,
            employee_id: row.employee_id,
            day: row.day,
            checkin: check_point(
                row.checkin_time,
                row.checkin_latitude,
                row.checkin_longitude,
                row.checkin_address,
                row.checkin_evidence,
                row.checkin_device,
            ),
            checkout: check_point(
                row.checkout_time,
                row.checkout_latitude,
                row.checkout_longitude,
                row.checkout_address,
                row.checkout_evidence,
                row.checkout_device,
            ),
            shift_id: row.shift_id,
            work_status: row.work_status.and_then(|s| s.parse().ok()),
            leave_status: row.leave_status,
        }
    }
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Date(NaiveDate),
}

#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<AttendanceDayRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE id = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }
}

impl AttendanceStore for MySqlAttendanceStore {
    async fn find_by_employee_and_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceDayRecord>, StoreError> {
        let sql =
            format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE employee_id = ? AND day = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(day)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_shift(&self, shift_id: u64) -> Result<Option<Shift>, StoreError> {
        let shift = sqlx::query_as::<_, Shift>(
            r#"
            SELECT id, name, start_time, end_time, late_after_min
            FROM shifts
            WHERE id = ?
            "#,
        )
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(shift)
    }

    async fn list_shifts(&self) -> Result<Vec<Shift>, StoreError> {
        let shifts = sqlx::query_as::<_, Shift>(
            r#"
            SELECT id, name, start_time, end_time, late_after_min
            FROM shifts
            ORDER BY start_time, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(shifts)
    }

    async fn insert_check_in(&self, new: NewCheckIn) -> Result<AttendanceDayRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, day, checkin_time, checkin_latitude, checkin_longitude,
                 checkin_address, checkin_evidence, checkin_device, shift_id, work_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.day)
        .bind(new.point.time)
        .bind(new.point.latitude)
        .bind(new.point.longitude)
        .bind(&new.point.address)
        .bind(&new.point.evidence_url)
        .bind(&new.point.device)
        .bind(new.shift_id)
        .bind(new.work_status.as_ref())
        .execute(&self.pool)
        .await?;

        self.find_by_id(result.last_insert_id())
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn fill_check_in(
        &self,
        record_id: u64,
        new: NewCheckIn,
    ) -> Result<Option<AttendanceDayRecord>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET checkin_time = ?, checkin_latitude = ?, checkin_longitude = ?,
                checkin_address = ?, checkin_evidence = ?, checkin_device = ?,
                shift_id = ?, work_status = ?, updated_at = NOW()
            WHERE id = ?
            AND checkin_time IS NULL
            "#,
        )
        .bind(new.point.time)
        .bind(new.point.latitude)
        .bind(new.point.longitude)
        .bind(&new.point.address)
        .bind(&new.point.evidence_url)
        .bind(&new.point.device)
        .bind(new.shift_id)
        .bind(new.work_status.as_ref())
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(record_id).await
    }

    async fn record_check_out(
        &self,
        record_id: u64,
        point: CheckPoint,
    ) -> Result<Option<AttendanceDayRecord>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET checkout_time = ?, checkout_latitude = ?, checkout_longitude = ?,
                checkout_address = ?, checkout_evidence = ?, checkout_device = ?,
                updated_at = NOW()
            WHERE id = ?
            AND checkin_time IS NOT NULL
            AND checkout_time IS NULL
            "#,
        )
        .bind(point.time)
        .bind(point.latitude)
        .bind(point.longitude)
        .bind(&point.address)
        .bind(&point.evidence_url)
        .bind(&point.device)
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(record_id).await
    }

    async fn history(
        &self,
        query: HistoryQuery,
    ) -> Result<(Vec<AttendanceDayRecord>, i64), StoreError> {
        // -------------------------
        // WHERE clause
        // -------------------------
        let mut where_sql = String::from(" WHERE day BETWEEN ? AND ?");
        let mut args = vec![FilterValue::Date(query.from), FilterValue::Date(query.to)];

        if let Some(employee_id) = query.employee_id {
            where_sql.push_str(" AND employee_id = ?");
            args.push(FilterValue::U64(employee_id));
        }

        // -------------------------
        // COUNT query
        // -------------------------
        let count_sql = format!("SELECT COUNT(*) FROM attendance{where_sql}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Date(d) => count_q.bind(*d),
            };
        }
        let total = count_q.fetch_one(&self.pool).await?;

        // -------------------------
        // DATA query
        // -------------------------
        let data_sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance{where_sql} ORDER BY day DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut data_q = sqlx::query_as::<_, AttendanceRow>(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Date(d) => data_q.bind(d),
            };
        }
        let rows = data_q
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> AttendanceRow {
        AttendanceRow {
            id: 3,
            employee_id: 1000,
            day: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            checkin_time: NaiveDate::from_ymd_opt(2026, 1, 5)
                .unwrap()
                .and_hms_opt(8, 20, 0),
            checkin_latitude: Some(20.962448),
            checkin_longitude: Some(105.790762),
            checkin_address: None,
            checkin_evidence: Some("http://x/uploads/a.jpg".into()),
            checkin_device: Some("Pixel 8".into()),
            checkout_time: None,
            checkout_latitude: None,
            checkout_longitude: None,
            checkout_address: None,
            checkout_evidence: None,
            checkout_device: None,
            shift_id: Some(1),
            work_status: Some("LATE".into()),
            leave_status: None,
        }
    }

    #[test]
    fn row_without_checkout_time_maps_to_checked_in_record() {
        let record = AttendanceDayRecord::from(row());

        let checkin = record.checkin.as_ref().unwrap();
        assert_eq!(checkin.device, "Pixel 8");
        assert_eq!(checkin.evidence_url, "http://x/uploads/a.jpg");
        assert!(record.checkout.is_none());
        assert_eq!(record.work_status, Some(WorkStatus::Late));
    }

    #[test]
    fn unknown_work_status_is_dropped() {
        let record = AttendanceDayRecord::from(AttendanceRow {
            work_status: Some("SOMETIMES".into()),
            ..row()
        });
        assert_eq!(record.work_status, None);
    }
}
