use filmgate_auth::TokenClaims;
use filmgate_core::UserId;
use filmgate_infra::UserRecord;

/// Authenticated request context, inserted by the authorization gate.
///
/// Carries both the resolved identity (live record) and the decoded claims
/// (role snapshot from issuance). Role checks already happened against the
/// snapshot; handlers needing current roles must consult `identity`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    identity: UserRecord,
    claims: TokenClaims,
}

impl AuthContext {
    pub fn new(identity: UserRecord, claims: TokenClaims) -> Self {
        Self { identity, claims }
    }

    pub fn identity(&self) -> &UserRecord {
        &self.identity
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    pub fn user_id(&self) -> UserId {
        self.identity.id
    }
}
