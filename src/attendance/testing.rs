//! In-memory doubles shared by the attendance tests.

use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, codecs::jpeg::JpegEncoder};

use super::{
    error::StoreError,
    evidence::{CaptureContext, CaptureKind, EvidenceFormat, EvidenceStore},
    geofence::GeoCoordinate,
    service::Clock,
    store::{AttendanceStore, HistoryQuery, NewCheckIn},
};
use crate::model::attendance::{AttendanceDayRecord, CheckPoint, Shift};

pub const OFFICE: GeoCoordinate = GeoCoordinate {
    latitude: 20.962448,
    longitude: 105.790762,
};

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_hms_opt(h, m, s).unwrap()
}

pub fn sample_context() -> CaptureContext {
    CaptureContext {
        employee_name: "Nguyen Van A".to_string(),
        timestamp: at(8, 2, 11),
        coordinate: OFFICE,
        address: Some("1 Office Street".to_string()),
        device: "Pixel 8".to_string(),
        kind: CaptureKind::CheckIn,
    }
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 128])
    })
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, 90))
        .unwrap();
    out.into_inner()
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Stall(Duration),
}

type Call = (String, EvidenceFormat, Vec<u8>);

/// Keeps every object it is handed and answers with a `memory://` URL.
#[derive(Clone)]
pub struct RecordingEvidenceStore {
    calls: Arc<Mutex<Vec<Call>>>,
    behavior: Behavior,
}

impl Default for RecordingEvidenceStore {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            behavior: Behavior::Succeed,
        }
    }
}

impl RecordingEvidenceStore {
    pub fn failing() -> Self {
        Self {
            behavior: Behavior::Fail,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            behavior: Behavior::Stall(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl EvidenceStore for RecordingEvidenceStore {
    type Error = std::io::Error;

    async fn store(
        &self,
        bytes: Vec<u8>,
        key: &str,
        format: EvidenceFormat,
    ) -> Result<String, Self::Error> {
        self.calls
            .lock()
            .unwrap()
            .push((key.to_string(), format, bytes));

        match self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail => return Err(std::io::Error::other("bucket offline")),
            Behavior::Stall(delay) => tokio::time::sleep(delay).await,
        }
        Ok(format!("memory://{key}.{}", format.extension()))
    }
}

pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn morning_shift() -> Shift {
    Shift {
        id: 1,
        name: "Morning".to_string(),
        start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        late_after_min: 15,
    }
}

/// Day-record store with the same uniqueness and guard rules as MySQL.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    records: Mutex<Vec<AttendanceDayRecord>>,
    shifts: Mutex<HashMap<u64, Shift>>,
    next_id: AtomicU64,
    /// Lookups by employee and day miss, as if another request had not
    /// committed yet.
    stale_reads: AtomicBool,
}

impl MemoryAttendanceStore {
    pub fn with_shift(shift: Shift) -> Self {
        let store = Self::default();
        store.shifts.lock().unwrap().insert(shift.id, shift);
        store
    }

    pub fn add_shift(&self, shift: Shift) {
        self.shifts.lock().unwrap().insert(shift.id, shift);
    }

    pub fn seed(&self, record: AttendanceDayRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<AttendanceDayRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn serve_stale_reads(&self) {
        self.stale_reads.store(true, Ordering::SeqCst);
    }

    fn update(
        &self,
        record_id: u64,
        apply: impl FnOnce(&mut AttendanceDayRecord) -> bool,
    ) -> Option<AttendanceDayRecord> {
        let mut records = self.records.lock().unwrap();
        let record = records.iter_mut().find(|r| r.id == record_id)?;
        apply(record).then(|| record.clone())
    }
}

impl AttendanceStore for MemoryAttendanceStore {
    async fn find_by_employee_and_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceDayRecord>, StoreError> {
        if self.stale_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.employee_id == employee_id && r.day == day)
            .cloned())
    }

    async fn find_shift(&self, shift_id: u64) -> Result<Option<Shift>, StoreError> {
        Ok(self.shifts.lock().unwrap().get(&shift_id).cloned())
    }

    async fn list_shifts(&self) -> Result<Vec<Shift>, StoreError> {
        let mut shifts: Vec<Shift> = self.shifts.lock().unwrap().values().cloned().collect();
        shifts.sort_by_key(|s| (s.start_time, s.id));
        Ok(shifts)
    }

    async fn insert_check_in(&self, new: NewCheckIn) -> Result<AttendanceDayRecord, StoreError> {
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.employee_id == new.employee_id && r.day == new.day)
        {
            return Err(StoreError::UniqueViolation);
        }
        let record = AttendanceDayRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            employee_id: new.employee_id,
            day: new.day,
            checkin: Some(new.point),
            checkout: None,
            shift_id: Some(new.shift_id),
            work_status: Some(new.work_status),
            leave_status: None,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn fill_check_in(
        &self,
        record_id: u64,
        new: NewCheckIn,
    ) -> Result<Option<AttendanceDayRecord>, StoreError> {
        Ok(self.update(record_id, |record| {
            if record.checkin.is_some() {
                return false;
            }
            record.checkin = Some(new.point);
            record.shift_id = Some(new.shift_id);
            record.work_status = Some(new.work_status);
            true
        }))
    }

    async fn record_check_out(
        &self,
        record_id: u64,
        point: CheckPoint,
    ) -> Result<Option<AttendanceDayRecord>, StoreError> {
        Ok(self.update(record_id, |record| {
            if record.checkin.is_none() || record.checkout.is_some() {
                return false;
            }
            record.checkout = Some(point);
            true
        }))
    }

    async fn history(
        &self,
        query: HistoryQuery,
    ) -> Result<(Vec<AttendanceDayRecord>, i64), StoreError> {
        let mut matching: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.day >= query.from && r.day <= query.to)
            .filter(|r| query.employee_id.is_none_or(|id| r.employee_id == id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.day.cmp(&a.day).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }
}
