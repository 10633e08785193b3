use crate::api::attendance::{AttendanceResponse, CheckFormSchema, HistoryFilter, HistoryResponse};
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse};
use crate::error::ErrorBody;
use crate::model::attendance::{AttendanceDayRecord, CheckPoint, Shift, WorkStatus};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Hub API",
        version = "1.0.0",
        description = r#"
## Geofenced Attendance

Employees check in and out from their phones. Every attempt must be made
inside the office geofence and carry a photo, which is stamped with who,
when and where before it is stored.

### 🔹 Key Features
- **Attendance**
  - One record per employee per day: check in once, check out once
  - On-time / late status from the employee's shift
  - Daily view and paginated history
  - Shift lookup, so clients know which `shift_id` to check in against
- **Leave Management**
  - Submit, approve, reject and cancel leave requests
- **Live Feed**
  - Supervisors receive attendance and leave events over a WebSocket
    (`ws://<WS_ADDR>/?token=<access token>`)

### 🔐 Security
Every endpoint requires a **JWT Bearer** access token.
Reviewing leave and browsing other employees' history is limited to
**Director**, **Manager** and **Department Head** roles.

### 📦 Errors
Failures return `{"kind": "...", "message": "..."}`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::history,

        crate::api::shift::shift_list,
        crate::api::shift::get_shift,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave
    ),
    components(
        schemas(
            ErrorBody,
            CheckFormSchema,
            CheckPoint,
            WorkStatus,
            AttendanceDayRecord,
            AttendanceResponse,
            HistoryFilter,
            HistoryResponse,
            Shift,
            CreateLeave,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            LeaveFilter,
            LeaveListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Geofenced check-in / check-out APIs"),
        (name = "Shift", description = "Work shift lookup APIs"),
        (name = "Leave", description = "Leave management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
