use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Display name
    pub exp: i64,    // Expiration timestamp
    pub iat: i64,    // Issued at timestamp
}

pub fn create_access_token(subject: &str, jwt: &JwtConfig) -> Result<String, AppError> {
    create_token_expiring_in(subject, jwt, Duration::minutes(jwt.expires_in_minutes))
}

fn create_token_expiring_in(
    subject: &str,
    jwt: &JwtConfig,
    expires_in: Duration,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + expires_in;

    let claims = Claims {
        sub: subject.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(jwt.algorithm),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create token: {}", e)))
}

pub fn verify_access_token(token: &str, jwt: &JwtConfig) -> Result<Claims, AppError> {
    let mut validation = Validation::new(jwt.algorithm);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("Token verification failed: {}", e);
        AppError::Unauthorized
    })?;

    Ok(token_data.claims)
}
