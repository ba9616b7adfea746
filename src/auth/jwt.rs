use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, error::AppError, state::AppState};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Carries a session id; accepted by the session gate.
    Access,
    /// Carried by a password-reset link; only accepted by the password update.
    Reset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<Uuid>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub reset_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs(cfg.ttl_minutes.max(1) as u64 * 60),
            reset_ttl: Duration::from_secs(cfg.reset_ttl_minutes.max(1) as u64 * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign(&self, email: &str, sid: Option<Uuid>, kind: TokenKind) -> Result<String, AppError> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Reset => self.reset_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: email.to_string(),
            sid,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding).map_err(AppError::internal)?;
        debug!(email, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, email: &str, session_id: Uuid) -> Result<String, AppError> {
        self.sign(email, Some(session_id), TokenKind::Access)
    }

    pub fn sign_reset(&self, email: &str) -> Result<String, AppError> {
        self.sign(email, None, TokenKind::Reset)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(email = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let claims = self
            .verify(token)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;
        if claims.kind != kind {
            return Err(AppError::Unauthorized(format!(
                "{} token required",
                match kind {
                    TokenKind::Access => "Access",
                    TokenKind::Reset => "Reset",
                }
            )));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            reset_ttl_minutes: 60,
        })
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let sid = Uuid::new_v4();
        let token = keys.sign_access("staff@school.edu", sid).expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, "staff@school.edu");
        assert_eq!(claims.sid, Some(sid));
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn reset_token_has_no_session() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.sign_reset("staff@school.edu").expect("sign reset");
        let claims = keys.verify_kind(&token, TokenKind::Reset).expect("verify reset");
        assert_eq!(claims.sid, None);
    }

    #[test]
    fn reset_token_is_not_an_access_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.sign_reset("staff@school.edu").expect("sign reset");
        let err = keys.verify_kind(&token, TokenKind::Access).unwrap_err();
        assert!(err.to_string().contains("Access token required"));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good_keys
            .sign_access("staff@school.edu", Uuid::new_v4())
            .expect("sign access");
        assert!(bad_keys.verify(&token).is_err());
    }
}
