//! Bearer-token authentication for every gRPC call.

use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Request, Status};

const UNAUTHORIZED: &str = "Unauthorized";
const BAD_FORMAT: &str = "Unauthorized Authentication header format is Bearer <token>";

/// Tonic interceptor requiring `authorization: Bearer <token>`.
#[derive(Clone)]
pub struct Authenticator {
    token: Arc<str>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Authenticator {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn check(&self, metadata: &MetadataMap) -> Result<(), Status> {
        let header = metadata
            .get("authorization")
            .ok_or_else(|| Status::unauthenticated(UNAUTHORIZED))?
            .to_str()
            .map_err(|_| Status::unauthenticated(BAD_FORMAT))?;

        let mut parts = header.split(' ');
        let token = match (parts.next(), parts.next(), parts.next()) {
            (Some("Bearer"), Some(token), None) if !token.is_empty() => token,
            _ => return Err(Status::unauthenticated(BAD_FORMAT)),
        };

        if token != &*self.token {
            tracing::warn!("authentication_rejected");
            return Err(Status::unauthenticated(UNAUTHORIZED));
        }
        Ok(())
    }
}

impl Interceptor for Authenticator {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        self.check(request.metadata())?;
        Ok(request)
    }
}
