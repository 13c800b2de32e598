use std::fmt::{Debug, Formatter};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::PlayerId;

/// Contents of a session token. `jti` only exists so that two tokens issued
/// for the same player within the same second still differ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub steam_id: u64,
    pub uuid: PlayerId,
    pub iat: i64,
    pub jti: Uuid,
}

/// Raised for every kind of unusable token: bad signature, garbage input,
/// missing claims, expired or issued in the future. Callers cannot tell them apart.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid session token")]
pub struct InvalidToken;

/// Signs and verifies stateless session tokens (HS256 JWTs).
///
/// Freshness is checked against the expiry configured *now*, not one baked
/// into the token, so lowering the expiry also shortens outstanding tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry_seconds: u32,
}

impl TokenSigner {
    pub fn new(secret: &[u8], expiry_seconds: u32) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // We check the issuance time ourselves, there is no exp claim.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            expiry_seconds,
        }
    }

    pub fn expiry_seconds(&self) -> u32 {
        self.expiry_seconds
    }

    pub fn sign(
        &self,
        steam_id: u64,
        player: PlayerId,
        now: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = SessionClaims {
            steam_id,
            uuid: player,
            iat: now,
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    pub fn verify(&self, token: &str, now: i64) -> Result<SessionClaims, InvalidToken> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| {
                tracing::debug!("rejected session token: {}", err);
                InvalidToken
            })?
            .claims;

        let age = now.saturating_sub(claims.iat);
        if age < 0 || age > i64::from(self.expiry_seconds) {
            tracing::debug!(age, "rejected stale session token");
            return Err(InvalidToken);
        }

        Ok(claims)
    }
}

impl Debug for TokenSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("expiry_seconds", &self.expiry_seconds)
            .finish_non_exhaustive()
    }
}
