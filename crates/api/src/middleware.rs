//! Authorization gate.
//!
//! A request-scoped guard configured per route group at registration time
//! with a token kind, a set of bypassed methods and a role policy. Per
//! request it extracts the bearer credential, decodes it, checks revocation
//! and (for refresh tokens) currency against the registry, resolves the
//! identity, enforces the role policy against the token's role snapshot and
//! hands an [`AuthContext`] to the handler.
//!
//! Registry or identity-store unavailability during these checks rejects the
//! request: failing open on a revocation lookup would honor revoked tokens.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use filmgate_auth::{PolicyError, RolePolicy, TokenKind};
use filmgate_infra::{IdentityStore as _, TokenRegistry as _};

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::context::AuthContext;

/// Gate configuration for one route group.
#[derive(Clone)]
pub struct AuthGate {
    services: Arc<AppServices>,
    kind: TokenKind,
    bypass: Arc<HashSet<Method>>,
    policy: Arc<RolePolicy>,
}

impl AuthGate {
    /// Gate validating access tokens, any role.
    pub fn access(services: Arc<AppServices>) -> Self {
        Self::new(services, TokenKind::Access)
    }

    /// Gate validating refresh tokens (includes the currency check).
    pub fn refresh(services: Arc<AppServices>) -> Self {
        Self::new(services, TokenKind::Refresh)
    }

    fn new(services: Arc<AppServices>, kind: TokenKind) -> Self {
        Self {
            services,
            kind,
            bypass: Arc::new(HashSet::new()),
            policy: Arc::new(RolePolicy::allow_all()),
        }
    }

    /// Exempt the given request methods from authorization entirely.
    pub fn bypass(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.bypass = Arc::new(methods.into_iter().collect());
        self
    }

    /// Restrict to an explicit role set (superuser always passes).
    ///
    /// An empty set is a configuration error surfaced here, at router
    /// construction, so a misconfigured route can never serve traffic.
    pub fn allow_roles<I, S>(mut self, roles: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy = Arc::new(RolePolicy::restricted(roles)?);
        Ok(self)
    }
}

/// The middleware function applied with
/// `axum::middleware::from_fn_with_state(gate, guard)`.
pub async fn guard(State(gate): State<AuthGate>, mut req: Request, next: Next) -> Response {
    if gate.bypass.contains(req.method()) {
        return next.run(req).await;
    }

    let token = match extract_bearer(req.headers()) {
        Ok(token) => token.to_string(),
        Err(rejection) => return rejection.into_response(),
    };

    let claims = match gate.services.codec.decode(&token, gate.kind) {
        Ok(claims) => claims,
        Err(_) => return errors::unauthenticated(),
    };

    // A registry failure here must reject, never pass as "not revoked".
    match gate.services.registry.is_revoked(claims.jti).await {
        Ok(false) => {}
        Ok(true) => return errors::unauthenticated(),
        Err(err) => {
            tracing::warn!(error = %err, "token registry unavailable during authorization");
            return errors::unauthenticated();
        }
    }

    let identity = match gate.services.identities.user_by_id(claims.user).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return ApiError::NotFound(errors::ERR_USER_NOT_FOUND).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "identity store unavailable during authorization");
            return errors::unauthenticated();
        }
    };

    // Refresh tokens must also be the *current* one for the user; a
    // superseded token stays cryptographically valid but is rejected here.
    if gate.kind == TokenKind::Refresh {
        match gate
            .services
            .registry
            .is_refresh_current(identity.id, &token)
            .await
        {
            Ok(true) => {}
            Ok(false) => return errors::unauthenticated(),
            Err(err) => {
                tracing::warn!(error = %err, "token registry unavailable during authorization");
                return errors::unauthenticated();
            }
        }
    }

    // Role check runs against the snapshot embedded at issuance, not a live
    // lookup; role mutations invalidate sessions to bound the staleness.
    if !gate.policy.permits(&claims.roles) {
        return ApiError::Forbidden.into_response();
    }

    req.extensions_mut().insert(AuthContext::new(identity, claims));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthenticated(errors::ERR_BAD_AUTH_HEADER))?;

    let mut parts = header.split_whitespace();
    let (Some(_scheme), Some(token)) = (parts.next(), parts.next()) else {
        return Err(ApiError::Unauthenticated(errors::ERR_BAD_AUTH_HEADER));
    };

    Ok(token)
}
