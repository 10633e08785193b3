use crate::auth::jwt::verify_access_token;
use crate::config::Config;
use crate::error::error_response;
use crate::model::role::Role;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError, dev::Payload,
    http::StatusCode, web::Data,
};
use futures::future::{Ready, ready};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("app config missing")]
    ConfigMissing,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::ConfigMissing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let kind = match self {
            AuthError::Unauthorized(_) => "Unauthorized",
            AuthError::Forbidden(_) => "Forbidden",
            AuthError::ConfigMissing => "InternalError",
        };
        error_response(self.status_code(), kind, self.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    /// Resolves a bearer token into the caller's identity.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, AuthError> {
        let claims = verify_access_token(token, secret)
            .map_err(|e| AuthError::Unauthorized(e.to_string()))?;

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AuthError::Unauthorized("Invalid role".to_string()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }

    pub fn is_supervisor(&self) -> bool {
        self.role.is_supervisory()
    }

    pub fn require_supervisor(&self) -> Result<(), AuthError> {
        if self.is_supervisor() {
            Ok(())
        } else {
            Err(AuthError::Forbidden(
                "Director, Manager or Department Head only".to_string(),
            ))
        }
    }

    /// Attendance and leave actions are taken on behalf of an employee record.
    pub fn require_employee_id(&self) -> Result<u64, AuthError> {
        self.employee_id.ok_or_else(|| {
            AuthError::Forbidden("This account is not linked to an employee".to_string())
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected routes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(AuthError::Unauthorized("Missing token".to_string()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AuthError::ConfigMissing)),
        };

        ready(AuthUser::from_token(token, &config.jwt_secret))
    }
}
