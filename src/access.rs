//! Access Control — bearer token verification and private-board ownership.
//!
//! DESIGN
//! ======
//! Tokens are opaque to the core: when `AUTH_SECRET_KEY` is configured, a
//! bearer token is verified as an HS256 JWT and its `sub` claim becomes the
//! verified `userId`; otherwise (absent secret, absent token, or a bad
//! signature/expiry) the caller is treated as unverified. Private boards
//! then require the verified user to equal the board's owner.

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::model::Board;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Uuid,
}

/// Verifies a bearer token against the configured secret, if any.
#[derive(Clone)]
pub struct AccessControl {
    secret_key: Option<String>,
}

impl AccessControl {
    #[must_use]
    pub fn new(secret_key: Option<String>) -> Self {
        Self { secret_key }
    }

    /// Resolve a verified `userId` from an optional bearer token. Returns
    /// `None` ("no verified user") whenever the token is absent, no secret
    /// is configured, or verification fails for any reason — callers must
    /// not distinguish these cases, per spec.
    #[must_use]
    pub fn verify(&self, token: Option<&str>) -> Option<Uuid> {
        let secret = self.secret_key.as_deref()?;
        let token = token?;

        let key = DecodingKey::from_secret(secret.as_bytes());
        let data = jsonwebtoken::decode::<Claims>(token, &key, &Validation::default()).ok()?;
        Some(data.claims.sub)
    }

    /// Enforce the private-board rule: a private board requires the
    /// verified user to be the owner; a public board accepts any caller.
    #[must_use]
    pub fn can_join(&self, board: &Board, verified_user: Option<Uuid>) -> Result<(), String> {
        if !board.is_private {
            return Ok(());
        }
        match verified_user {
            Some(uid) if Some(uid) == board.owner_id => Ok(()),
            Some(_) => Err("board is private and you are not the owner".to_owned()),
            None => Err("board is private and no verified identity was provided".to_owned()),
        }
    }
}

#[cfg(test)]
#[path = "access_test.rs"]
mod tests;
