//! Bearer credential verification and the Axum extractors built on it.
//!
//! Tokens are minted elsewhere; the storefront only checks them. A token is
//! `<base64url(claims JSON)>.<hex HMAC-SHA256 of the first part>`, keyed with
//! `AUTH_TOKEN_SECRET`.
//!
//! ```rust,ignore
//! // Any signed-in user
//! async fn my_orders(AuthUser(identity): AuthUser, ..) -> WebResult<..>
//!
//! // Admins only
//! async fn all_orders(RequireAdmin(admin): RequireAdmin, ..) -> WebResult<..>
//! ```

use crate::error::{Result, ShopError};
use crate::server::state::AppState;
use crate::types::{Role, UserId};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use storefront_web::AppError;

/// Header older clients send the raw token in.
pub const LEGACY_TOKEN_HEADER: &str = "auth-token";

/// Claims carried by a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Role
    #[serde(default)]
    pub role: Role,
    /// Expiry as a Unix timestamp in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    /// Claims for a customer without expiry
    #[must_use]
    pub fn customer(sub: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            name: Some(name.into()),
            role: Role::Customer,
            exp: None,
        }
    }

    /// Claims for an administrator without expiry
    #[must_use]
    pub fn admin(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            name: None,
            role: Role::Admin,
            exp: None,
        }
    }
}

/// A verified caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Who
    pub user_id: UserId,
    /// Display name, if the token carried one
    pub name: Option<String>,
    /// What they may do
    pub role: Role,
}

impl Identity {
    /// Name shown on reviews
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Customer")
    }

    /// Whether admin routes are open to this caller
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn invalid_token() -> ShopError {
    ShopError::Unauthorized("Invalid token".to_string())
}

/// Checks token signatures and expiry.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Create a verifier keyed with `secret`
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, payload: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| ShopError::Storage(format!("token key rejected: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Mint a token for `claims`. Used by tests and tooling.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the claims cannot be encoded.
    pub fn issue(&self, claims: &Claims) -> Result<String> {
        let json = serde_json::to_vec(claims).map_err(|e| ShopError::Storage(format!("encode claims: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.mac(&payload)?;
        Ok(format!("{payload}.{signature}"))
    }

    /// Check `token` and return who it belongs to.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a malformed, forged or expired token.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Identity> {
        let (payload, signature) = token.trim().split_once('.').ok_or_else(invalid_token)?;
        let expected = self.mac(payload)?;
        if !constant_time_eq::constant_time_eq(expected.as_bytes(), signature.to_ascii_lowercase().as_bytes()) {
            return Err(invalid_token());
        }

        let json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid_token())?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| invalid_token())?;
        if claims.sub.trim().is_empty() {
            return Err(invalid_token());
        }
        if claims.exp.is_some_and(|exp| exp <= now.timestamp()) {
            return Err(ShopError::Unauthorized("Token expired".to_string()));
        }

        Ok(Identity {
            user_id: UserId::new(claims.sub),
            name: claims.name,
            role: claims.role,
        })
    }
}

/// Raw credential from `Authorization: Bearer <token>` or `auth-token`.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let token = match header("authorization") {
            Some(value) => value
                .strip_prefix("Bearer ")
                .map(str::trim)
                .ok_or_else(|| AppError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'"))?,
            None => header(LEGACY_TOKEN_HEADER).ok_or_else(|| AppError::unauthorized("Please login"))?,
        };

        if token.is_empty() {
            return Err(AppError::unauthorized("Empty bearer token"));
        }
        Ok(Self(token.to_string()))
    }
}

/// A signed-in caller.
///
/// The first time a user id is seen it is added to the user directory, which
/// makes it a notification recipient.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let now = state.clock.now();
        let identity = state.verifier.verify(&token, now)?;

        if let Err(e) = state
            .users
            .record(&identity.user_id, identity.name.as_deref(), now)
            .await
        {
            tracing::warn!(user_id = %identity.user_id, error = %e, "Failed to record user");
        }
        Ok(Self(identity))
    }
}

/// A signed-in administrator. Anyone else gets 403.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            tracing::warn!(user_id = %identity.user_id, "Admin route refused");
            return Err(AppError::forbidden("Admin access required"));
        }
        Ok(Self(identity))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use storefront_testing::mocks::epoch;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new("test-secret")
    }

    #[test]
    fn issued_tokens_verify() {
        let token = verifier().issue(&Claims::customer("u-1", "Asha")).unwrap();
        let identity = verifier().verify(&token, epoch()).unwrap();
        assert_eq!(identity.user_id, UserId::new("u-1"));
        assert_eq!(identity.display_name(), "Asha");
        assert!(!identity.is_admin());
    }

    #[test]
    fn forged_and_foreign_tokens_are_rejected() {
        let token = verifier().issue(&Claims::admin("root")).unwrap();
        assert!(TokenVerifier::new("other").verify(&token, epoch()).is_err());

        let (_, signature) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"root","role":"admin"}"#);
        let forged = format!("{forged_payload}x.{signature}");
        assert_eq!(verifier().verify(&forged, epoch()).unwrap_err(), invalid_token());
        assert!(verifier().verify("no-dot", epoch()).is_err());
    }

    #[test]
    fn expiry_is_enforced() {
        let claims = Claims {
            exp: Some(epoch().timestamp() + 60),
            ..Claims::customer("u-1", "Asha")
        };
        let token = verifier().issue(&claims).unwrap();
        assert!(verifier().verify(&token, epoch()).is_ok());
        assert_eq!(
            verifier()
                .verify(&token, epoch() + chrono::Duration::seconds(60))
                .unwrap_err(),
            ShopError::Unauthorized("Token expired".to_string())
        );
    }

    #[test]
    fn display_name_falls_back() {
        let identity = Identity {
            user_id: UserId::new("u"),
            name: Some("  ".into()),
            role: Role::Customer,
        };
        assert_eq!(identity.display_name(), "Customer");
    }
}
