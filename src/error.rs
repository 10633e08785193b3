use actix_web::{HttpResponse, http::StatusCode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Wire shape of every error returned by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "kind": "GeofenceError",
    "message": "location is 152m from the office, outside the permitted radius"
}))]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

pub fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorBody {
        kind: kind.to_string(),
        message: message.into(),
    })
}
