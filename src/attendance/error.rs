use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::error::error_response;

/// State-machine guard violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("already checked in today")]
    DuplicateCheckIn,
    #[error("not checked in today")]
    NotCheckedInYet,
    #[error("already checked out today")]
    AlreadyCheckedOut,
}

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("{0}")]
    Validation(String),
    #[error("could not decode evidence image: {0}")]
    Decode(String),
    #[error("could not encode evidence image: {0}")]
    Encode(String),
    #[error("evidence store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Failures of the day-record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a record already exists for this employee and day")]
    UniqueViolation,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation;
            }
        }
        StoreError::Database(e)
    }
}

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("{0}")]
    Validation(String),
    #[error("location is {distance_meters:.0}m from the office, outside the permitted radius")]
    Geofence { distance_meters: f64 },
    #[error(transparent)]
    Evidence(EvidenceError),
    #[error("Shift {0} not found")]
    ShiftNotFound(u64),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The task running the operation panicked or was shut down.
    #[error("attendance task failed: {0}")]
    Interrupted(String),
}

impl From<EvidenceError> for AttendanceError {
    fn from(e: EvidenceError) -> Self {
        match e {
            EvidenceError::Validation(message) => AttendanceError::Validation(message),
            other => AttendanceError::Evidence(other),
        }
    }
}

impl AttendanceError {
    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceError::Validation(_) => "ValidationError",
            AttendanceError::Geofence { .. } => "GeofenceError",
            AttendanceError::Evidence(EvidenceError::Validation(_)) => "ValidationError",
            AttendanceError::Evidence(EvidenceError::Decode(_)) => "DecodeError",
            AttendanceError::Evidence(EvidenceError::Encode(_)) => "EncodeError",
            AttendanceError::Evidence(EvidenceError::StoreUnavailable(_)) => "StoreUnavailable",
            AttendanceError::ShiftNotFound(_) => "NotFound",
            AttendanceError::Conflict(ConflictError::DuplicateCheckIn) => "DuplicateCheckIn",
            AttendanceError::Conflict(ConflictError::NotCheckedInYet) => "NotCheckedInYet",
            AttendanceError::Conflict(ConflictError::AlreadyCheckedOut) => "AlreadyCheckedOut",
            AttendanceError::Store(_) => "StoreError",
            AttendanceError::Interrupted(_) => "InternalError",
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
            AttendanceError::Geofence { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::Evidence(EvidenceError::Validation(_))
            | AttendanceError::Evidence(EvidenceError::Decode(_)) => StatusCode::BAD_REQUEST,
            AttendanceError::Evidence(EvidenceError::Encode(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AttendanceError::Evidence(EvidenceError::StoreUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AttendanceError::ShiftNotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::Conflict(_) => StatusCode::CONFLICT,
            AttendanceError::Store(_) | AttendanceError::Interrupted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // storage details stay in the logs
            AttendanceError::Store(e) => {
                tracing::error!(error = %e, "Attendance store failure");
                "Internal Server Error".to_string()
            }
            AttendanceError::Interrupted(e) => {
                tracing::error!(error = %e, "Attendance task failed");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        error_response(self.status_code(), self.kind(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn evidence_validation_surfaces_as_validation_error() {
        let err: AttendanceError = EvidenceError::Validation("too big".into()).into();
        assert!(matches!(err, AttendanceError::Validation(_)));
        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn kinds_and_statuses() {
        let cases: Vec<(AttendanceError, &str, StatusCode)> = vec![
            (
                AttendanceError::Geofence { distance_meters: 151.7 },
                "GeofenceError",
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                EvidenceError::StoreUnavailable("timeout".into()).into(),
                "StoreUnavailable",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ConflictError::AlreadyCheckedOut.into(),
                "AlreadyCheckedOut",
                StatusCode::CONFLICT,
            ),
            (
                StoreError::UniqueViolation.into(),
                "StoreError",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AttendanceError::ShiftNotFound(7),
                "NotFound",
                StatusCode::NOT_FOUND,
            ),
            (
                AttendanceError::Interrupted("task panicked".into()),
                "InternalError",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status_code(), status);
        }
    }

    #[actix_web::test]
    async fn response_body_carries_kind_and_message() {
        let err = AttendanceError::Geofence { distance_meters: 151.7 };
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["kind"], "GeofenceError");
        assert_eq!(
            json["message"],
            "location is 152m from the office, outside the permitted radius"
        );
    }

    #[actix_web::test]
    async fn store_failures_do_not_leak_details() {
        let err = AttendanceError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["kind"], "StoreError");
        assert_eq!(json["message"], "Internal Server Error");
    }
}
