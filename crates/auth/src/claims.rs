use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filmgate_core::{TokenId, UserId};

/// Bearer token payload (transport-agnostic).
///
/// The role list is a snapshot taken at issuance, not a live view: a role
/// change only becomes visible after the session is invalidated and the user
/// logs in again. Claims are immutable once issued; revocation is tracked
/// out-of-band by the token registry, keyed on `jti`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject user id.
    pub user: UserId,

    /// Role names granted at issuance.
    pub roles: Vec<String>,

    /// Issued-at timestamp (unix seconds).
    pub lat: i64,

    /// Expiration timestamp (unix seconds).
    pub exp: i64,

    /// Unique token identifier, the revocation-list key.
    pub jti: TokenId,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.lat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
