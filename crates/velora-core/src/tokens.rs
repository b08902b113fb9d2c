//! # Bearer Tokens
//!
//! HS256 JSON Web Tokens for API authentication.
//!
//! A login yields an access token (short lived, sent with every request) and
//! a refresh token (long lived, exchanged for a new pair). Refreshing rotates
//! the pair: the presented refresh token is revoked. Revoked token ids are
//! kept until the token would have expired anyway.
//!
//! Expiry is checked against the caller's `now`, not the system clock.

use crate::accounts;
use crate::primitives::{ACCESS_TOKEN_MINUTES, REFRESH_TOKEN_DAYS};
use crate::storage::{Reader, WriteTx};
use crate::types::{UserId, VeloraError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which half of a pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: u64,
    /// Unique token id.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub typ: TokenKind,
}

/// An access/refresh pair as handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// A random signing secret (64 hex characters) for deployments without a
/// configured one. Tokens signed with it do not survive a restart.
pub fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn invalid_token() -> VeloraError {
    VeloraError::Unauthorized("Invalid or expired token".to_string())
}

/// Signs and checks tokens with a shared secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Issuer with the default lifetimes (60 minutes / 7 days).
    pub fn new(secret: &[u8]) -> Self {
        Self::with_lifetimes(
            secret,
            Duration::minutes(ACCESS_TOKEN_MINUTES),
            Duration::days(REFRESH_TOKEN_DAYS),
        )
    }

    pub fn with_lifetimes(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    fn sign(
        &self,
        user: UserId,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, VeloraError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.0,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            typ: kind,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| VeloraError::Internal(e.to_string()))
    }

    /// Issue a fresh pair for a user.
    pub fn issue_pair(&self, user: UserId, now: DateTime<Utc>) -> Result<TokenPair, VeloraError> {
        Ok(TokenPair {
            access_token: self.sign(user, TokenKind::Access, now)?,
            refresh_token: self.sign(user, TokenKind::Refresh, now)?,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Decode a token of the expected kind. Signature and expiry are checked.
    pub fn decode(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, VeloraError> {
        let claims = self.decode_signed(token)?;
        if claims.typ != kind || claims.exp <= now.timestamp() {
            return Err(invalid_token());
        }
        Ok(claims)
    }

    fn decode_signed(&self, token: &str) -> Result<Claims, VeloraError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);
        decode::<Claims>(token.trim(), &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| invalid_token())
    }

    /// Resolve an access token to its user.
    pub fn verify_access(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, VeloraError> {
        self.decode(token, TokenKind::Access, now)
            .map(|claims| UserId(claims.sub))
    }

    /// Exchange a refresh token for a new pair, revoking the old refresh token.
    pub fn refresh(
        &self,
        tx: &WriteTx,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, VeloraError> {
        let claims = self.decode(refresh_token, TokenKind::Refresh, now)?;
        if tx.is_revoked(&claims.jti)? {
            return Err(invalid_token());
        }
        let user = accounts::get(tx, UserId(claims.sub)).map_err(|_| invalid_token())?;
        accounts::ensure_active(&user)?;
        tx.revoke(&claims.jti, claims.exp)?;
        self.issue_pair(user.id, now)
    }

    /// Revoke a refresh token (logout). Already expired tokens need no entry.
    pub fn revoke(
        &self,
        tx: &WriteTx,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VeloraError> {
        let claims = self.decode_signed(refresh_token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(invalid_token());
        }
        if claims.exp > now.timestamp() {
            tx.revoke(&claims.jti, claims.exp)?;
        }
        Ok(())
    }

    /// Drop revocation entries for tokens that have expired.
    pub fn purge_revoked(&self, tx: &WriteTx, now: DateTime<Utc>) -> Result<usize, VeloraError> {
        tx.purge_revoked(now.timestamp())
    }
}

// =============================================================================
// TESTS
// =============================================================================
