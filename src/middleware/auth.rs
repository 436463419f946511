use std::{
    future::{ready, Ready},
    sync::Arc,
};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::{debug, warn};

use crate::{routes::auth::Claims, AppConfig};

#[derive(Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

// Handlers that require a session take this as an extractor; the middleware
// below inserts it when the bearer token checks out.
impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().cloned();
        ready(user.ok_or_else(|| {
            actix_web::error::ErrorUnauthorized("missing or invalid session token")
        }))
    }
}

pub struct Authentication {
    pub app_config: Arc<AppConfig>,
}

// Middleware factory is `Transform` trait
// `S` - type of the next service
// `B` - type of response's body
impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service,
            app_config: self.app_config.clone(),
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: S,
    app_config: Arc<AppConfig>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract the JWT from the request, validate it, and insert the
        // user id into the request extensions. Requests without a valid
        // token pass through; extraction fails later for protected routes.
        let app_config = self.app_config.clone();

        let auth_header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.starts_with("Bearer "))
            .map(|value| &value["Bearer ".len()..]);

        match auth_header {
            Some(token) => {
                let decoding_key = DecodingKey::from_secret(app_config.jwt_secret.as_ref());

                match decode::<Claims>(token, &decoding_key, &Validation::default()) {
                    Ok(token_data) => {
                        let claims = token_data.claims;
                        let user_id = claims.sub;

                        debug!("Authenticated user: {}", &user_id);
                        req.extensions_mut().insert(AuthenticatedUser { user_id });
                    }
                    Err(e) => {
                        warn!("Invalid token: {:?}", e);
                    }
                }
            }
            None => {
                debug!("No Authorization header found.");
            }
        };

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            Ok(res)
        })
    }
}
