//! Access/refresh token pair issuance.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::claims::{AccessClaims, RefreshClaims};
use super::codec::{TokenCodec, TokenError};
use crate::id::{derive_refresh_uuid, new_access_uuid};

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Refresh token lifetime.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Signing secrets, injected from configuration.
#[derive(Clone)]
pub struct TokenSecrets {
    pub access_secret: String,
    pub refresh_secret: String,
}

impl std::fmt::Debug for TokenSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSecrets")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .finish()
    }
}

/// Signed access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Token store key.
    pub uuid: String,
    /// Signed token string.
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Signed refresh token, linked to its access token.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub access_uuid: String,
    /// Token store key, derived from `access_uuid`.
    pub refresh_uuid: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

fn remaining(expires_at: DateTime<Utc>) -> Duration {
    (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

impl AccessToken {
    /// Remaining lifetime, zero once expired.
    pub fn ttl(&self) -> Duration {
        remaining(self.expires_at)
    }
}

impl RefreshToken {
    /// Remaining lifetime, zero once expired.
    pub fn ttl(&self) -> Duration {
        remaining(self.expires_at)
    }
}

/// An access/refresh pair, issued together or not at all.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

/// Mints linked token pairs.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    access: Arc<TokenCodec>,
    refresh: Arc<TokenCodec>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl Tokenizer {
    /// Build a tokenizer with the default 30 minute / 7 day lifetimes.
    ///
    /// Fails with [`TokenError::Signing`] if either secret is empty or both
    /// secrets are the same.
    pub fn new(secrets: &TokenSecrets) -> Result<Self, TokenError> {
        if secrets.access_secret == secrets.refresh_secret {
            return Err(TokenError::Signing(
                "access and refresh secrets must differ".into(),
            ));
        }
        Ok(Self {
            access: Arc::new(TokenCodec::new(secrets.access_secret.as_bytes())?),
            refresh: Arc::new(TokenCodec::new(secrets.refresh_secret.as_bytes())?),
            access_ttl: ACCESS_TOKEN_TTL,
            refresh_ttl: REFRESH_TOKEN_TTL,
        })
    }

    pub fn with_lifetimes(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    /// Codec for access tokens, used by transport-level verification.
    pub fn access_codec(&self) -> Arc<TokenCodec> {
        Arc::clone(&self.access)
    }

    /// Codec for refresh tokens.
    pub fn refresh_codec(&self) -> Arc<TokenCodec> {
        Arc::clone(&self.refresh)
    }

    /// Mint a new pair for `user_id`.
    pub fn generate(&self, user_id: u64) -> Result<IssuedTokens, TokenError> {
        let now = Utc::now();

        let access_uuid = new_access_uuid();
        let access_expires = now + lifetime(self.access_ttl)?;
        let access_hash = self.access.sign(&AccessClaims {
            uuid: access_uuid.clone(),
            user_id,
            exp: access_expires.timestamp(),
        })?;

        let refresh_uuid = derive_refresh_uuid(&access_uuid);
        let refresh_expires = now + lifetime(self.refresh_ttl)?;
        let refresh_hash = self.refresh.sign(&RefreshClaims {
            access_uuid: access_uuid.clone(),
            refresh_uuid: refresh_uuid.clone(),
            user_id,
            exp: refresh_expires.timestamp(),
        })?;

        Ok(IssuedTokens {
            access: AccessToken {
                uuid: access_uuid.clone(),
                hash: access_hash,
                expires_at: access_expires,
            },
            refresh: RefreshToken {
                access_uuid,
                refresh_uuid,
                hash: refresh_hash,
                expires_at: refresh_expires,
            },
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.access.verify(token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.refresh.verify(token)
    }
}

fn lifetime(ttl: Duration) -> Result<chrono::Duration, TokenError> {
    chrono::Duration::from_std(ttl).map_err(|e| TokenError::Signing(format!("token lifetime: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> TokenSecrets {
        TokenSecrets {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
        }
    }

    #[test]
    fn pair_is_linked_by_derivation() {
        let tokenizer = Tokenizer::new(&secrets()).unwrap();
        for user_id in [1, 42, u64::MAX] {
            let issued = tokenizer.generate(user_id).unwrap();
            assert_eq!(issued.refresh.access_uuid, issued.access.uuid);
            assert_eq!(
                issued.refresh.refresh_uuid,
                derive_refresh_uuid(&issued.access.uuid)
            );
            assert_ne!(issued.refresh.refresh_uuid, issued.access.uuid);
        }
    }

    #[test]
    fn claims_carry_the_pair() {
        let tokenizer = Tokenizer::new(&secrets()).unwrap();
        let issued = tokenizer.generate(9).unwrap();

        let access = tokenizer.verify_access(&issued.access.hash).unwrap();
        assert_eq!(access.uuid, issued.access.uuid);
        assert_eq!(access.user_id, 9);

        let refresh = tokenizer.verify_refresh(&issued.refresh.hash).unwrap();
        assert_eq!(refresh.access_uuid, issued.access.uuid);
        assert_eq!(refresh.refresh_uuid, issued.refresh.refresh_uuid);
        assert_eq!(refresh.user_id, 9);
    }

    #[test]
    fn tokens_are_signed_with_separate_secrets() {
        let tokenizer = Tokenizer::new(&secrets()).unwrap();
        let issued = tokenizer.generate(1).unwrap();
        assert!(matches!(
            tokenizer.verify_refresh(&issued.access.hash),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            tokenizer.verify_access(&issued.refresh.hash),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn default_lifetimes() {
        let tokenizer = Tokenizer::new(&secrets()).unwrap();
        let issued = tokenizer.generate(1).unwrap();
        assert!(issued.access.ttl() <= ACCESS_TOKEN_TTL);
        assert!(issued.access.ttl() > ACCESS_TOKEN_TTL - Duration::from_secs(5));
        assert!(issued.refresh.ttl() > ACCESS_TOKEN_TTL);
        assert!(issued.refresh.ttl() <= REFRESH_TOKEN_TTL);
    }

    #[test]
    fn misconfigured_secrets_are_rejected() {
        let same = TokenSecrets {
            access_secret: "same".into(),
            refresh_secret: "same".into(),
        };
        assert!(matches!(Tokenizer::new(&same), Err(TokenError::Signing(_))));

        let empty = TokenSecrets {
            access_secret: String::new(),
            refresh_secret: "refresh".into(),
        };
        assert!(matches!(Tokenizer::new(&empty), Err(TokenError::Signing(_))));
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let rendered = format!("{:?}", secrets());
        assert!(!rendered.contains("access-secret"));
    }
}
