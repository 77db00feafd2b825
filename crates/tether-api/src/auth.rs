use std::time::Duration;

use axum::http::{header, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub session_id: Option<String>,
}

/// HS256 session tokens: the subject is the owner of every record the
/// request touches.
#[derive(Clone)]
pub struct SessionTokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    clock_skew: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iss: String,
    exp: i64,
    iat: Option<i64>,
    nbf: Option<i64>,
    jti: Option<String>,
}

impl SessionTokenVerifier {
    pub fn new(config: &AppConfig) -> Self {
        let secret = config.session_jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: config.session_jwt_issuer.clone(),
            clock_skew: config.auth_clock_skew,
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.leeway = self.clock_skew.as_secs();
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let decoded = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|error| {
            AppError::unauthorized(format!("Invalid session token: {}", sanitize(&error)))
        })?;

        let claims = decoded.claims;
        if claims.sub.trim().is_empty() {
            return Err(AppError::unauthorized("Session token has no subject"));
        }
        let skew_secs = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);
        claims.check_window(Utc::now().timestamp(), skew_secs)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            session_id: claims.jti,
        })
    }

    /// Sign a session token for `user_id`, valid for `ttl`.
    pub fn issue(&self, user_id: &str, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs())
            .map_err(|_| AppError::bad_request("Token lifetime is too long"))?;
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            exp: now.saturating_add(ttl),
            iat: Some(now),
            nbf: None,
            jti: Some(Uuid::now_v7().to_string()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|error| AppError::internal(format!("Token signing failed: {}", sanitize(&error))))
    }
}

/// The token of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not ASCII"))?
        .trim();

    let token = value
        .get(..BEARER.len())
        .filter(|scheme| scheme.eq_ignore_ascii_case(BEARER))
        .map(|_| value[BEARER.len()..].trim())
        .ok_or_else(|| AppError::unauthorized("Expected a `Bearer` authorization scheme"))?;

    if token.is_empty() {
        return Err(AppError::unauthorized("Missing bearer token"));
    }
    Ok(token)
}

const BEARER: &str = "Bearer ";

impl SessionClaims {
    /// Check `exp`, `iat` and `nbf` against `now` (Unix seconds), allowing
    /// `skew_secs` of drift in either direction.
    fn check_window(&self, now: i64, skew_secs: i64) -> Result<(), AppError> {
        let earliest = now.saturating_sub(skew_secs);
        let latest = now.saturating_add(skew_secs);

        if self.exp <= earliest {
            return Err(AppError::unauthorized("Session token has expired"));
        }
        match self.iat {
            None => Err(AppError::unauthorized("Session token has no `iat` claim")),
            Some(iat) if iat > latest => {
                Err(AppError::unauthorized("Session token was issued in the future"))
            }
            _ if self.nbf.is_some_and(|nbf| nbf > latest) => {
                Err(AppError::unauthorized("Session token is not valid yet"))
            }
            _ => Ok(()),
        }
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
