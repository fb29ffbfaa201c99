use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::config::JwtConfig;

/// Tokens are valid for one day from issuance.
pub const TOKEN_TTL: Duration = Duration::days(1);

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        }
    }

    fn claims_for(&self, user_id: Uuid, issued_at: OffsetDateTime) -> Claims {
        Claims {
            id: user_id,
            iat: issued_at.unix_timestamp() as usize,
            exp: (issued_at + TOKEN_TTL).unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        }
    }

    fn sign_claims(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::default(), claims, &self.encoding)?;
        debug!(user_id = %claims.id, "jwt signed");
        Ok(token)
    }

    /// Issues a token for `user_id` that expires [`TOKEN_TTL`] from now.
    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_claims(&self.claims_for(user_id, OffsetDateTime::now_utc()))
    }

    /// Issues a token as if it had been signed at `issued_at`.
    pub fn sign_issued_at(&self, user_id: Uuid, issued_at: OffsetDateTime) -> anyhow::Result<String> {
        self.sign_claims(&self.claims_for(user_id, issued_at))
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.id, "jwt verified");
        Ok(data.claims)
    }
}
