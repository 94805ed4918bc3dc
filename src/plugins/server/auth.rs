//! Request extractors for the three kinds of callers: buyers holding a
//! session, admins holding an admin session, and desktop clients holding a
//! device token.

use std::net::SocketAddr;

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, header, request::Parts},
};

use crate::{entity::user, prelude::*, state::AppState, token::Grant};

fn bearer(headers: &HeaderMap) -> Result<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|token| !token.is_empty())
    .ok_or(Error::AuthRequired)
}

/// Best-effort caller address: first `X-Forwarded-For` hop, then the peer.
pub struct ClientIp(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
  type Rejection = Error;

  async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self> {
    let forwarded = parts
      .headers
      .get("x-forwarded-for")
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.split(',').next())
      .map(|ip| ip.trim().to_string())
      .filter(|ip| !ip.is_empty());

    let peer = || {
      parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
    };

    Ok(ClientIp(forwarded.or_else(peer)))
  }
}

#[derive(Debug, Clone, Copy)]
pub struct UserAuth {
  pub user_id: Uuid,
  pub session_id: Uuid,
}

impl FromRequestParts<Arc<AppState>> for UserAuth {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let session_id =
      Uuid::parse_str(bearer(&parts.headers)?).map_err(|_| Error::InvalidToken)?;
    let user_id = app.sv().session.validate(session_id).await?;

    Ok(UserAuth { user_id, session_id })
  }
}

#[derive(Debug, Clone)]
pub struct AdminAuth {
  pub admin: user::Model,
}

impl FromRequestParts<Arc<AppState>> for AdminAuth {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let auth = UserAuth::from_request_parts(parts, app).await?;
    let admin = app.sv().user.require_admin(auth.user_id).await?;

    Ok(AdminAuth { admin })
  }
}

/// Desktop client authenticated by the token issued at activation.
#[derive(Debug, Clone)]
pub struct DeviceAuth(pub Grant);

impl FromRequestParts<Arc<AppState>> for DeviceAuth {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let token = bearer(&parts.headers)?;
    Ok(DeviceAuth(app.tokens.verify(token)?))
  }
}
