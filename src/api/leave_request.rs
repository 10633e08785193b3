use crate::auth::auth::AuthUser;
use crate::error::{ErrorBody, error_response};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::realtime::{event::DomainEvent, hub::HubHandle};
use crate::utils::pagination::Page;
use actix_web::{HttpResponse, Responder, ResponseError, http::StatusCode, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, prelude::FromRow};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

const MAX_REASON_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum LeaveError {
    #[error("{0}")]
    Validation(String),
    #[error("Leave request not found")]
    NotFound,
    #[error("{0}")]
    Forbidden(String),
    #[error("Leave request is already {0}")]
    InvalidTransition(LeaveStatus),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl ResponseError for LeaveError {
    fn status_code(&self) -> StatusCode {
        match self {
            LeaveError::Validation(_) => StatusCode::BAD_REQUEST,
            LeaveError::NotFound => StatusCode::NOT_FOUND,
            LeaveError::Forbidden(_) => StatusCode::FORBIDDEN,
            LeaveError::InvalidTransition(_) => StatusCode::CONFLICT,
            LeaveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (kind, message) = match self {
            LeaveError::Validation(m) => ("ValidationError", m.clone()),
            LeaveError::NotFound => ("NotFound", self.to_string()),
            LeaveError::Forbidden(m) => ("Forbidden", m.clone()),
            LeaveError::InvalidTransition(_) => ("InvalidTransition", self.to_string()),
            LeaveError::Store(e) => {
                tracing::error!(error = %e, "Leave store failure");
                ("StoreError", "Internal Server Error".to_string())
            }
        };
        error_response(self.status_code(), kind, message)
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    #[schema(example = "flu")]
    pub reason: Option<String>,
}

impl CreateLeave {
    fn validate(&self) -> Result<(), LeaveError> {
        if self.start_date > self.end_date {
            return Err(LeaveError::Validation(
                "start_date cannot be after end_date".to_string(),
            ));
        }
        if self
            .reason
            .as_deref()
            .is_some_and(|r| r.chars().count() > MAX_REASON_CHARS)
        {
            return Err(LeaveError::Validation(format!(
                "reason must be at most {MAX_REASON_CHARS} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = 123)]
    /// Filter by employee ID (supervisors only)
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>, // 1-based
    #[schema(example = 3)]
    /// Pagination per page number
    pub per_page: Option<u64>, // items per page
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(&'static str),
}

const LEAVE_COLUMNS: &str = r#"
    id, employee_id, leave_type, start_date, end_date, reason,
    status, reviewed_by, reviewed_at, created_at
"#;

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    employee_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: Option<String>,
    status: String,
    reviewed_by: Option<u64>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = strum::ParseError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type: row.leave_type.parse()?,
            start_date: row.start_date,
            end_date: row.end_date,
            reason: row.reason,
            status: row.status.parse()?,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
        })
    }
}

fn decode(row: LeaveRow) -> Result<LeaveRequest, LeaveError> {
    LeaveRequest::try_from(row).map_err(|e| LeaveError::Store(sqlx::Error::Decode(Box::new(e))))
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> Result<Option<LeaveRequest>, LeaveError> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
    let row = sqlx::query_as::<_, LeaveRow>(&sql)
        .bind(leave_id)
        .fetch_optional(pool)
        .await?;
    row.map(decode).transpose()
}

/// A guarded update matched nothing: work out why.
async fn explain_no_transition(
    pool: &MySqlPool,
    leave_id: u64,
    owner: Option<u64>,
) -> LeaveError {
    match fetch_leave(pool, leave_id).await {
        Ok(None) => LeaveError::NotFound,
        Ok(Some(leave)) if owner.is_some_and(|id| id != leave.employee_id) => {
            LeaveError::Forbidden("Only the requester can cancel a leave request".to_string())
        }
        Ok(Some(leave)) => LeaveError::InvalidTransition(leave.status),
        Err(e) => e,
    }
}

/* =========================
Create leave request
========================= */
/// Swagger doc for create_leave endpoint
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted successfully", body = LeaveRequest),
        (status = 400, description = "Bad request", body = ErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<HubHandle>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;
    payload.validate()?;

    let reason = payload
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type, start_date, end_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to create leave request");
        LeaveError::Store(e)
    })?;

    let leave = fetch_leave(pool.get_ref(), result.last_insert_id())
        .await?
        .ok_or(LeaveError::NotFound)?;

    tracing::info!(leave_id = leave.id, employee_id, "Leave request submitted");
    hub.publish(DomainEvent::LeaveCreated(leave.clone()));

    Ok(HttpResponse::Created().json(leave))
}

/// Moves a pending request to `approved` or `rejected`.
async fn review_leave(
    auth: AuthUser,
    pool: &MySqlPool,
    hub: &HubHandle,
    leave_id: u64,
    decision: LeaveStatus,
) -> actix_web::Result<HttpResponse> {
    auth.require_supervisor()?;

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, reviewed_by = ?, reviewed_at = UTC_TIMESTAMP()
        WHERE id = ?
        AND status = 'pending'
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.user_id)
    .bind(leave_id)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, %decision, "Review leave failed");
        LeaveError::Store(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(explain_no_transition(pool, leave_id, None).await.into());
    }

    let leave = fetch_leave(pool, leave_id)
        .await?
        .ok_or(LeaveError::NotFound)?;

    tracing::info!(leave_id, reviewer = auth.user_id, %decision, "Leave reviewed");
    let event = match decision {
        LeaveStatus::Approved => DomainEvent::LeaveApproved(leave.clone()),
        _ => DomainEvent::LeaveRejected(leave.clone()),
    };
    hub.publish(event);

    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Approve leave (supervisors)
========================= */
/// Swagger doc for approve_leave endpoint
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved successfully", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody, example = json!({
            "kind": "InvalidTransition",
            "message": "Leave request is already approved"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<HubHandle>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    review_leave(
        auth,
        pool.get_ref(),
        hub.get_ref(),
        path.into_inner(),
        LeaveStatus::Approved,
    )
    .await
}

/* =========================
Reject leave (supervisors)
========================= */
/// Swagger doc for reject_leave endpoint
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected successfully", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<HubHandle>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    review_leave(
        auth,
        pool.get_ref(),
        hub.get_ref(),
        path.into_inner(),
        LeaveStatus::Rejected,
    )
    .await
}

/* =========================
Cancel leave (requester)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    responses(
        (status = 200, description = "Leave canceled", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the requester", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<HubHandle>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;
    let leave_id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = 'canceled'
        WHERE id = ?
        AND employee_id = ?
        AND status = 'pending'
        "#,
    )
    .bind(leave_id)
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Cancel leave failed");
        LeaveError::Store(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(explain_no_transition(pool.get_ref(), leave_id, Some(employee_id))
            .await
            .into());
    }

    let leave = fetch_leave(pool.get_ref(), leave_id)
        .await?
        .ok_or(LeaveError::NotFound)?;

    tracing::info!(leave_id, employee_id, "Leave canceled");
    hub.publish(DomainEvent::LeaveCanceled(leave.clone()));

    Ok(HttpResponse::Ok().json(leave))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody, example = json!({
            "kind": "NotFound",
            "message": "Leave request not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let leave = fetch_leave(pool.get_ref(), leave_id)
        .await?
        .ok_or(LeaveError::NotFound)?;

    if !auth.is_supervisor() && auth.employee_id != Some(leave.employee_id) {
        return Err(LeaveError::Forbidden(
            "You can only view your own leave requests".to_string(),
        )
        .into());
    }

    Ok(HttpResponse::Ok().json(leave))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "Page out of range", body = ErrorBody),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    // employees only see their own requests
    let employee_filter = if auth.is_supervisor() {
        query.employee_id
    } else {
        Some(auth.require_employee_id()?)
    };

    // -------------------------
    // Pagination
    // -------------------------
    let page = Page::resolve(query.page, query.per_page, 10)
        .ok_or_else(|| LeaveError::Validation("page is out of range".to_string()))?;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = employee_filter {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.into()));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error=%e, "Failed to count leave requests");
        LeaveError::Store(e)
    })?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT {LEAVE_COLUMNS}
        FROM leave_requests
        {where_sql}
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#
    );

    let mut data_q = sqlx::query_as::<_, LeaveRow>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let rows = data_q
        .bind(page.per_page)
        .bind(page.offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error=%e, "Failed to fetch leave list");
            LeaveError::Store(e)
        })?;

    let leaves = rows
        .into_iter()
        .map(decode)
        .collect::<Result<Vec<_>, _>>()?;

    // -------------------------
    // Response
    // -------------------------
    let response = LeaveListResponse {
        data: leaves,
        page: page.page,
        per_page: page.per_page,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}
