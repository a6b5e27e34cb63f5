/// HTTP middleware for community-service
///
/// JWT authentication turns a bearer token into a [`Caller`]: the verified
/// identity plus its role, re-canonicalized on every request. Authorization
/// rules live in [`permissions`].
pub mod permissions;

pub use permissions::{
    Action, AuthorizationResolver, Decision, Grant, ModerationPolicy, OrganizerScope,
};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use crypto_core::TokenVerifier;
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{canonicalize, CanonicalRole, Role};
use crate::error::AppError;
use crate::metrics::community::UNRECOGNIZED_ROLES_TOTAL;

// =====================================================================
// JWT Authentication
// =====================================================================

/// Authenticated principal stored in request extensions after auth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub identity: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(identity: Uuid, role: Role) -> Self {
        Self { identity, role }
    }

    pub fn canonical_role(&self) -> CanonicalRole {
        CanonicalRole::Known(self.role)
    }
}

/// Resolve the bearer token of a request into a [`Caller`].
pub fn authenticate(
    verifier: &TokenVerifier,
    authorization: Option<&str>,
) -> Result<Caller, AppError> {
    let header = authorization
        .ok_or_else(|| AppError::Unauthenticated("missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthenticated("invalid Authorization scheme".into()))?;

    let claims = verifier.verify(token)?;
    let identity = claims.identity()?;

    match canonicalize(&claims.role) {
        CanonicalRole::Known(role) => Ok(Caller::new(identity, role)),
        CanonicalRole::Missing => Err(AppError::Unauthenticated("token carries no role".into())),
        CanonicalRole::Unrecognized => {
            UNRECOGNIZED_ROLES_TOTAL.with_label_values(&["token"]).inc();
            warn!(identity = %identity, raw_role = %claims.role, "unrecognized role in token");
            Err(AppError::Forbidden("unrecognized role".into()))
        }
    }
}

/// Actix middleware that validates a Bearer token with the shared verifier.
#[derive(Clone)]
pub struct JwtAuthMiddleware {
    verifier: Arc<TokenVerifier>,
}

impl JwtAuthMiddleware {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    verifier: Arc<TokenVerifier>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let verifier = self.verifier.clone();

        Box::pin(async move {
            let authorization = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok());

            let caller = authenticate(&verifier, authorization)?;
            req.extensions_mut().insert(caller);

            service.call(req).await
        })
    }
}

impl FromRequest for Caller {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Caller>()
                .copied()
                .ok_or_else(|| AppError::Unauthenticated("caller missing".into()).into()),
        )
    }
}
