//! JWT issuing and verification.

use std::fs;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::config::{AuthSettings, JwtKeys};
use crate::domain::entities::UserCredentials;

use super::AuthError;

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    Expired,
    Invalid,
}

#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(
        algorithm: Algorithm,
        encoding: EncodingKey,
        decoding: DecodingKey,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            algorithm,
            encoding,
            decoding,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Symmetric codec, mostly useful for tests and single-node setups.
    pub fn hmac(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self::new(
            Algorithm::HS256,
            EncodingKey::from_secret(secret),
            DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        )
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let access_ttl = Duration::try_from(settings.access_token_ttl)
            .map_err(|err| AuthError::KeyMaterial(format!("access token ttl: {err}")))?;
        let refresh_ttl = Duration::try_from(settings.refresh_token_ttl)
            .map_err(|err| AuthError::KeyMaterial(format!("refresh token ttl: {err}")))?;

        let (encoding, decoding) = match &settings.keys {
            JwtKeys::Secret(secret) => (
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            JwtKeys::Pem {
                private_key_path,
                public_key_path,
            } => {
                let private_pem = fs::read(private_key_path).map_err(|err| {
                    AuthError::KeyMaterial(format!("{}: {err}", private_key_path.display()))
                })?;
                let public_pem = fs::read(public_key_path).map_err(|err| {
                    AuthError::KeyMaterial(format!("{}: {err}", public_key_path.display()))
                })?;
                let encoding = EncodingKey::from_rsa_pem(&private_pem)
                    .map_err(|err| AuthError::KeyMaterial(format!("private key: {err}")))?;
                let decoding = DecodingKey::from_rsa_pem(&public_pem)
                    .map_err(|err| AuthError::KeyMaterial(format!("public key: {err}")))?;
                (encoding, decoding)
            }
        };

        Ok(Self::new(
            settings.algorithm,
            encoding,
            decoding,
            access_ttl,
            refresh_ttl,
        ))
    }

    pub fn issue_pair(&self, user: &UserCredentials) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(user, TokenKind::Access, self.access_ttl)?,
            refresh_token: self.issue(user, TokenKind::Refresh, self.refresh_ttl)?,
            token_type: TOKEN_TYPE.to_string(),
            user_id: user.id,
        })
    }

    /// Refresh tokens only name the subject; access tokens also carry ids.
    pub fn issue(
        &self,
        user: &UserCredentials,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let (user_id, role_id) = match kind {
            TokenKind::Access => (Some(user.id), Some(user.role_id)),
            TokenKind::Refresh => (None, None),
        };
        let claims = Claims {
            sub: user.login.clone(),
            user_id,
            role_id,
            kind,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, DecodeFailure> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => DecodeFailure::Expired,
                _ => DecodeFailure::Invalid,
            })
    }
}
