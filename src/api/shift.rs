use crate::attendance::AppAttendanceService;
use crate::error::ErrorBody;
use crate::model::attendance::Shift;
use actix_web::{HttpResponse, Responder, web};

/// Shifts an employee can check in against
#[utoipa::path(
    get,
    path = "/api/v1/shifts",
    responses(
        (status = 200, description = "All shifts, earliest start first", body = [Shift]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Shift"
)]
pub async fn shift_list(
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<impl Responder> {
    let shifts = service.shifts().await?;
    Ok(HttpResponse::Ok().json(shifts))
}

#[utoipa::path(
    get,
    path = "/api/v1/shifts/{id}",
    params(
        ("id" = u64, Path, description = "Shift ID")
    ),
    responses(
        (status = 200, description = "Shift found", body = Shift),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Shift not found", body = ErrorBody, example = json!({
            "kind": "NotFound",
            "message": "Shift 42 not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Shift"
)]
pub async fn get_shift(
    service: web::Data<AppAttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let shift = service.shift(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(shift))
}
