//! Authorization header construction.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::config::AuthCredentials;
use crate::error::{BrokerError, BrokerResult};

/// Lifetime of minted JWTs.
const JWT_TTL_SECS: i64 = 5 * 60;

/// Claims carried by a minted broker JWT.
///
/// The audience binds the token to the target URL and the operation claim
/// binds it to the call, so a captured token cannot be replayed elsewhere.
#[derive(Debug, Serialize, Deserialize)]
pub struct BrokerClaims {
    /// Issuer.
    pub iss: String,
    /// Subject.
    pub sub: String,
    /// Audience: the target URL.
    pub aud: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// The operation this token authorizes.
    pub operation: String,
}

/// Builds the `Authorization` header value for a call, if any.
pub fn auth_header_value(
    auth: &AuthCredentials,
    target_url: &str,
    operation: &str,
) -> BrokerResult<Option<String>> {
    match auth {
        AuthCredentials::None => Ok(None),
        AuthCredentials::Basic { username, password } => {
            let credentials = BASE64.encode(format!("{username}:{password}"));
            Ok(Some(format!("Basic {credentials}")))
        }
        AuthCredentials::Bearer { token } => Ok(Some(format!("Bearer {token}"))),
        AuthCredentials::Jwt {
            secret,
            issuer,
            subject,
        } => {
            let token = mint_jwt(secret, issuer, subject, target_url, operation)?;
            Ok(Some(format!("Bearer {token}")))
        }
    }
}

fn mint_jwt(
    secret: &[u8],
    issuer: &str,
    subject: &str,
    target_url: &str,
    operation: &str,
) -> BrokerResult<String> {
    let now = Utc::now().timestamp();
    let claims = BrokerClaims {
        iss: issuer.to_string(),
        sub: subject.to_string(),
        aud: target_url.to_string(),
        iat: now,
        exp: now + JWT_TTL_SECS,
        operation: operation.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| BrokerError::Auth {
        message: e.to_string(),
    })
}
