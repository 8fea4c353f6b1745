//! Development helper: impersonate any user by sending a `Fake-Id` header
//! carrying that user's id.
//!
//! Services plug in their own [`UserLoader`] to turn the id into whatever
//! they keep in request extensions. In release mode only requests whose
//! socket peer is `127.0.0.1` may impersonate. Forwarding headers are not
//! consulted for that check.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

use crate::{config::RunMode, error::ApiError};

use super::client_ip::peer_ip;

pub const FAKE_ID_HEADER: &str = "fake-id";

#[async_trait]
pub trait UserLoader: Send + Sync {
    /// Loads user `uid` and attaches it to the request.
    async fn load(&self, parts: &mut Parts, uid: i64) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct FakeUser {
    loader: Arc<dyn UserLoader>,
    mode: RunMode,
}

impl FakeUser {
    pub fn new(loader: Arc<dyn UserLoader>, mode: RunMode) -> Self {
        Self { loader, mode }
    }

    async fn apply(&self, parts: &mut Parts) {
        let Some(raw) = parts
            .headers
            .get(FAKE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return;
        };

        let uid = match raw.parse::<i64>() {
            Ok(uid) => uid,
            Err(e) => {
                warn!(error = %e, fake_id = raw, "bad fake id");
                return;
            }
        };

        if self.mode == RunMode::Release && peer_ip(parts).as_deref() != Some("127.0.0.1") {
            return;
        }

        if let Err(e) = self.loader.load(parts, uid).await {
            error!(error = %e, uid, "load fake user failed");
        }
    }
}

/// Axum middleware, install with `axum::middleware::from_fn_with_state`.
/// Never rejects a request.
pub async fn fake_user_middleware(
    State(fake): State<FakeUser>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    fake.apply(&mut parts).await;
    next.run(Request::from_parts(parts, body)).await
}
