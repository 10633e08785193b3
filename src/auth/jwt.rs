use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::Error};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TokenError {
    #[error("invalid or expired token: {0}")]
    Invalid(#[from] Error),
    #[error("refresh tokens cannot be used for API access")]
    NotAccessToken,
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Like [`verify_token`], but only accepts access tokens.
pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let claims = verify_token(token, secret)?;
    if claims.token_type != TokenType::Access {
        return Err(TokenError::NotAccessToken);
    }
    Ok(claims)
}

#[cfg(test)]
pub fn generate_token(
    user_id: u64,
    role: u8,
    employee_id: Option<u64>,
    token_type: TokenType,
    secret: &str,
) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let claims = Claims {
        user_id,
        sub: format!("user{user_id}"),
        role,
        exp: now + 900,
        jti: uuid::Uuid::new_v4().to_string(),
        token_type,
        employee_id,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
