//! Check-in / check-out state machine over one day-record per employee per day.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::{error, info, warn};

use super::{
    error::{AttendanceError, ConflictError, StoreError},
    evidence::{CaptureContext, CaptureKind, EvidencePipeline, EvidenceStore, EvidenceUpload},
    geofence::{GeoCoordinate, GeofenceValidator},
    store::{AttendanceStore, HistoryQuery, NewCheckIn},
};
use crate::{
    model::attendance::{AttendanceDayRecord, CheckPoint, DayState, Shift},
    realtime::{event::DomainEvent, hub::HubHandle},
};

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Office-local wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A check-in or check-out attempt.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub employee_id: u64,
    pub employee_name: String,
    pub coordinate: GeoCoordinate,
    pub address: Option<String>,
    pub device: String,
    /// Required for check-in. Ignored on check-out; the shift is fixed when
    /// the day starts.
    pub shift_id: Option<u64>,
    pub image: EvidenceUpload,
}

pub struct AttendanceService<S, E> {
    store: S,
    evidence: EvidencePipeline<E>,
    geofence: GeofenceValidator,
    hub: HubHandle,
    clock: Arc<dyn Clock>,
    evidence_deadline: Duration,
}

impl<S: AttendanceStore, E: EvidenceStore> AttendanceService<S, E> {
    pub fn new(
        store: S,
        evidence: EvidencePipeline<E>,
        geofence: GeofenceValidator,
        hub: HubHandle,
        evidence_deadline: Duration,
    ) -> Self {
        Self {
            store,
            evidence,
            geofence,
            hub,
            clock: Arc::new(SystemClock),
            evidence_deadline,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    pub async fn check_in(&self, req: CheckRequest) -> Result<AttendanceDayRecord, AttendanceError> {
        validate(&req)?;
        let shift_id = req
            .shift_id
            .ok_or_else(|| AttendanceError::Validation("shift_id is required".to_string()))?;

        let now = self.clock.now();
        let day = now.date();

        let existing = self
            .store
            .find_by_employee_and_day(req.employee_id, day)
            .await?;
        if existing.as_ref().is_some_and(|r| r.checkin.is_some()) {
            warn!(employee_id = req.employee_id, %day, "Duplicate check-in");
            return Err(ConflictError::DuplicateCheckIn.into());
        }

        self.admit(req.employee_id, req.coordinate)?;

        let shift = self.store.find_shift(shift_id).await?.ok_or_else(|| {
            AttendanceError::Validation(format!("Shift {shift_id} does not exist"))
        })?;

        let (employee_id, point) = self.capture(req, now, CaptureKind::CheckIn).await?;
        let new = NewCheckIn {
            employee_id,
            day,
            point,
            shift_id,
            work_status: shift.work_status_at(now),
        };

        let record = match existing {
            Some(empty) => self
                .store
                .fill_check_in(empty.id, new)
                .await?
                .ok_or(ConflictError::DuplicateCheckIn)?,
            None => match self.store.insert_check_in(new).await {
                Ok(record) => record,
                // lost the race to a concurrent check-in for the same day
                Err(StoreError::UniqueViolation) => {
                    warn!(employee_id, %day, "Concurrent duplicate check-in");
                    return Err(ConflictError::DuplicateCheckIn.into());
                }
                Err(e) => return Err(e.into()),
            },
        };

        info!(
            employee_id,
            record_id = record.id,
            work_status = ?record.work_status,
            "Checked in"
        );
        self.hub
            .publish(DomainEvent::AttendanceCheckedIn(record.clone()));
        Ok(record)
    }

    pub async fn check_out(&self, req: CheckRequest) -> Result<AttendanceDayRecord, AttendanceError> {
        validate(&req)?;

        let now = self.clock.now();
        let day = now.date();

        let record = match self
            .store
            .find_by_employee_and_day(req.employee_id, day)
            .await?
        {
            Some(record) if record.state() == DayState::CheckedIn => record,
            Some(record) if record.state() == DayState::CheckedOut => {
                warn!(employee_id = req.employee_id, %day, "Duplicate check-out");
                return Err(ConflictError::AlreadyCheckedOut.into());
            }
            _ => return Err(ConflictError::NotCheckedInYet.into()),
        };

        self.admit(req.employee_id, req.coordinate)?;

        let (employee_id, point) = self.capture(req, now, CaptureKind::CheckOut).await?;
        let record = self
            .store
            .record_check_out(record.id, point)
            .await?
            .ok_or(ConflictError::AlreadyCheckedOut)?;

        info!(employee_id, record_id = record.id, "Checked out");
        self.hub
            .publish(DomainEvent::AttendanceCheckedOut(record.clone()));
        Ok(record)
    }

    pub async fn get_by_employee_and_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceDayRecord>, AttendanceError> {
        Ok(self.store.find_by_employee_and_day(employee_id, day).await?)
    }

    pub async fn history(
        &self,
        query: HistoryQuery,
    ) -> Result<(Vec<AttendanceDayRecord>, i64), AttendanceError> {
        if query.from > query.to {
            return Err(AttendanceError::Validation(
                "from_date must not be after to_date".to_string(),
            ));
        }
        Ok(self.store.history(query).await?)
    }

    pub async fn shifts(&self) -> Result<Vec<Shift>, AttendanceError> {
        Ok(self.store.list_shifts().await?)
    }

    pub async fn shift(&self, shift_id: u64) -> Result<Shift, AttendanceError> {
        self.store
            .find_shift(shift_id)
            .await?
            .ok_or(AttendanceError::ShiftNotFound(shift_id))
    }

    fn admit(&self, employee_id: u64, coordinate: GeoCoordinate) -> Result<(), AttendanceError> {
        let decision = self.geofence.evaluate(coordinate);
        if decision.within_radius {
            return Ok(());
        }
        warn!(
            employee_id,
            distance_meters = decision.distance_meters,
            radius_meters = self.geofence.radius_meters(),
            "Outside office geofence"
        );
        Err(AttendanceError::Geofence {
            distance_meters: decision.distance_meters,
        })
    }

    /// Runs the evidence pipeline and assembles the side to be written.
    async fn capture(
        &self,
        req: CheckRequest,
        now: NaiveDateTime,
        kind: CaptureKind,
    ) -> Result<(u64, CheckPoint), AttendanceError> {
        let ctx = CaptureContext {
            employee_name: req.employee_name,
            timestamp: now,
            coordinate: req.coordinate,
            address: req.address,
            device: req.device,
            kind,
        };
        let evidence_url = self
            .evidence
            .process(req.image, &ctx, self.evidence_deadline)
            .await?;

        Ok((
            req.employee_id,
            CheckPoint {
                time: now,
                latitude: ctx.coordinate.latitude,
                longitude: ctx.coordinate.longitude,
                address: ctx.address,
                evidence_url,
                device: ctx.device,
            },
        ))
    }
}

impl<S, E> AttendanceService<S, E>
where
    S: AttendanceStore + 'static,
    E: EvidenceStore + 'static,
{
    /// [`check_in`](Self::check_in) on its own task. Once started it runs to
    /// completion even if the caller stops waiting, so a client hanging up
    /// cannot abandon a half-stored photo or a half-written day.
    pub async fn check_in_detached(
        self: Arc<Self>,
        req: CheckRequest,
    ) -> Result<AttendanceDayRecord, AttendanceError> {
        detach(async move { self.check_in(req).await }).await
    }

    /// [`check_out`](Self::check_out) on its own task.
    pub async fn check_out_detached(
        self: Arc<Self>,
        req: CheckRequest,
    ) -> Result<AttendanceDayRecord, AttendanceError> {
        detach(async move { self.check_out(req).await }).await
    }
}

async fn detach<T, F>(op: F) -> Result<T, AttendanceError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, AttendanceError>> + Send + 'static,
{
    tokio::spawn(op).await.map_err(|e| {
        error!(error = %e, "Attendance task did not finish");
        AttendanceError::Interrupted(e.to_string())
    })?
}

fn validate(req: &CheckRequest) -> Result<(), AttendanceError> {
    if req.device.trim().is_empty() {
        return Err(AttendanceError::Validation("device is required".to_string()));
    }
    if !req.coordinate.is_valid() {
        return Err(AttendanceError::Validation(
            "latitude/longitude out of range".to_string(),
        ));
    }
    Ok(())
}
