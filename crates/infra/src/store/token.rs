//! OAuth access tokens for one service-account identity (JWT-bearer grant).
//!
//! A token source lives inside exactly one store handle, so a fetched token is
//! reused across the calls of a single ingestion and dropped with the handle.

use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::r#trait::StoreError;
use crate::credentials::{CredentialError, ServiceAccountCredentials};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertions are valid for one hour, the maximum the token endpoint accepts.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(client_email: &str, scope: &str, token_uri: &str, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: client_email.to_string(),
            scope: scope.to_string(),
            aud: token_uri.to_string(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

pub struct TokenSource {
    client_email: String,
    private_key_id: String,
    token_uri: String,
    scope: String,
    key: EncodingKey,
    http: reqwest::blocking::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl core::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenSource")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    /// Parse the signing key up front; no network traffic happens here.
    pub fn new(
        credentials: &ServiceAccountCredentials,
        scope: &str,
        http: reqwest::blocking::Client,
    ) -> Result<Self, CredentialError> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key_pem().as_bytes())
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;

        Ok(Self {
            client_email: credentials.client_email().to_string(),
            private_key_id: credentials.private_key_id().to_string(),
            token_uri: credentials.token_uri().to_string(),
            scope: scope.to_string(),
            key,
            http,
            cached: Mutex::new(None),
        })
    }

    /// Current bearer token, exchanging a fresh assertion when needed.
    pub fn token(&self) -> Result<String, StoreError> {
        let now = Utc::now();
        if let Ok(cached) = self.cached.lock() {
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
                return Ok(token.value.clone());
            }
        }

        let fetched = self.exchange(now)?;
        let value = fetched.value.clone();
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(fetched);
        }
        Ok(value)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, StoreError> {
        let claims = AssertionClaims::new(&self.client_email, &self.scope, &self.token_uri, now);
        let mut header = Header::new(Algorithm::RS256);
        if !self.private_key_id.is_empty() {
            header.kid = Some(self.private_key_id.clone());
        }
        jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| StoreError::Unauthorized(format!("failed to sign assertion: {e}")))
    }

    fn exchange(&self, now: DateTime<Utc>) -> Result<AccessToken, StoreError> {
        let assertion = self.assertion(now)?;
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Unauthorized(format!(
                "token endpoint refused {} ({status}): {body}",
                self.client_email
            )));
        }
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: "token endpoint unavailable".to_string(),
            });
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        debug!(client_email = %self.client_email, expires_in = body.expires_in, "fetched access token");

        Ok(AccessToken {
            value: body.access_token,
            expires_at: expiry(now, body.expires_in)?,
        })
    }
}

/// Expiry instant of a token issued at `now`. `expires_in` comes from a tenant-chosen
/// endpoint and is clamped to `1..=ASSERTION_LIFETIME_SECS`.
fn expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, StoreError> {
    let secs = expires_in.clamp(1, ASSERTION_LIFETIME_SECS);
    TimeDelta::try_seconds(secs)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| StoreError::Serialization(format!("unusable token lifetime {expires_in}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, StubServer};
    use chrono::TimeZone;

    #[test]
    fn claims_target_token_endpoint_for_one_hour() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let claims = AssertionClaims::new(
            "ingest@tenant.iam.gserviceaccount.com",
            "https://www.googleapis.com/auth/bigquery",
            "https://oauth2.googleapis.com/token",
            now,
        );

        assert_eq!(claims.iss, "ingest@tenant.iam.gserviceaccount.com");
        assert_eq!(claims.aud, "https://oauth2.googleapis.com/token");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iat, now.timestamp());
    }

    #[test]
    fn token_is_refreshed_before_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let token = AccessToken {
            value: "t".to_string(),
            expires_at: now + ChronoDuration::seconds(90),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + ChronoDuration::seconds(31)));
    }

    fn source(server: &StubServer) -> TokenSource {
        let secret = test_support::signing_secret("tenant-a", &server.url("/token"));
        let credentials = ServiceAccountCredentials::from_secret(&secret).unwrap();
        TokenSource::new(&credentials, "https://www.googleapis.com/auth/bigquery", test_support::http_client())
            .unwrap()
    }

    #[test]
    fn exchanged_token_is_reused_within_the_handle() {
        let server = StubServer::serve(vec![(
            200,
            r#"{"access_token":"ya29.t","expires_in":3599,"token_type":"Bearer"}"#.to_string(),
        )]);
        let tokens = source(&server);

        assert_eq!(tokens.token().unwrap(), "ya29.t");
        assert_eq!(tokens.token().unwrap(), "ya29.t");
        assert_eq!(server.requests(), vec!["POST /token"]);
    }

    #[test]
    fn out_of_range_lifetimes_are_clamped() {
        let server = StubServer::serve(vec![
            (200, format!(r#"{{"access_token":"big","expires_in":{}}}"#, i64::MAX)),
            (200, format!(r#"{{"access_token":"neg","expires_in":{}}}"#, i64::MIN)),
        ]);
        let tokens = source(&server);

        assert_eq!(tokens.token().unwrap(), "big");
        let cached = tokens.cached.lock().unwrap().clone().unwrap();
        assert!(cached.expires_at <= Utc::now() + ChronoDuration::seconds(ASSERTION_LIFETIME_SECS));

        // Force a second exchange.
        *tokens.cached.lock().unwrap() = None;
        assert_eq!(tokens.token().unwrap(), "neg");
    }

    #[test]
    fn refused_assertion_is_unauthorized() {
        let server = StubServer::serve(vec![(
            401,
            r#"{"error":"invalid_grant","error_description":"Invalid JWT Signature."}"#.to_string(),
        )]);

        let err = source(&server).token().unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(ref m) if m.contains("invalid_grant")));
    }

    #[test]
    fn unavailable_endpoint_is_an_api_error() {
        let server = StubServer::serve(vec![(503, "{}".to_string())]);
        let err = source(&server).token().unwrap_err();
        assert_eq!(
            err,
            StoreError::Api {
                status: 503,
                message: "token endpoint unavailable".to_string()
            }
        );
    }

    #[test]
    fn expiry_never_overflows() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(expiry(now, i64::MAX).unwrap(), now + ChronoDuration::seconds(3600));
        assert_eq!(expiry(now, -5).unwrap(), now + ChronoDuration::seconds(1));
        assert!(expiry(DateTime::<Utc>::MAX_UTC, 3600).is_err());
    }

    #[test]
    fn token_response_defaults_expiry() {
        let body: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","token_type":"Bearer"}"#).unwrap();
        assert_eq!(body.access_token, "abc");
        assert_eq!(body.expires_in, 3600);
    }
}
