use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::auth::extractors::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

/// Authentication filter.
///
/// Public routes pass straight through. Every other request must carry a valid
/// `Authorization: Bearer <token>` whose subject is a known user; the resolved
/// `AuthenticatedUser` is then stored in the request extensions. Rejected
/// requests are answered with 401 here and never reach the handler.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            match authenticate(&req).await {
                Ok(Some(user)) => {
                    log::debug!("Authenticated {} for {} {}", user.username, req.method(), req.path());
                    req.extensions_mut().insert(user);
                }
                Ok(None) => {}
                Err(err) => {
                    log::warn!("Rejected {} {}: {}", req.method(), req.path(), err);
                    let response = err.error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            }
            service.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}

/// Runs the filter steps. `Ok(None)` means the route is public.
async fn authenticate(req: &ServiceRequest) -> Result<Option<AuthenticatedUser>, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalServerError("AppState is not registered".into()))?;

    if state.public_endpoints.is_public(req.method(), req.path()) {
        return Ok(None);
    }

    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;
    let claims = state.tokens.parse(token)?;

    let user = state
        .users
        .find_by_username(&claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".into()))?;

    Ok(Some(AuthenticatedUser::new(user.id, user.username)))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
