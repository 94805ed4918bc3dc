use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Serialize;

use super::{
  Reply,
  auth::{ClientIp, UserAuth},
  ok,
};
use crate::{
  entity::{device, package, user},
  prelude::*,
  state::AppState,
  sv::{
    Page, Paging,
    license::{OwnedLicense, Subscription, Validity},
    order::PastOrder,
    user::{ContactPrefs, Registration},
  },
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registered {
  user: user::Model,
  /// Session id, sent back as `Authorization: Bearer <token>`
  token: Uuid,
  expires_at: DateTime,
}

pub async fn register(
  State(app): State<Arc<AppState>>,
  ClientIp(ip): ClientIp,
  Json(reg): Json<Registration>,
) -> Reply<Registered> {
  let sv = app.sv();

  let user = sv.user.register(reg).await?;
  let session = sv.session.open(user.id, ip).await?;

  ok(Registered { user, token: session.id, expires_at: session.expires_at })
}

pub async fn me(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
) -> Reply<user::Model> {
  ok(app.sv().user.get(auth.user_id).await?)
}

pub async fn update_contact(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
  Json(prefs): Json<ContactPrefs>,
) -> Reply<user::Model> {
  ok(app.sv().user.update_contact(auth.user_id, prefs).await?)
}

pub async fn logout(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
) -> Reply<()> {
  app.sv().session.close(auth.session_id).await?;
  ok(())
}

pub async fn packages(
  State(app): State<Arc<AppState>>,
) -> Reply<Vec<package::Model>> {
  ok(app.sv().package.list_active().await?)
}

pub async fn package(
  State(app): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Reply<package::Model> {
  ok(app.sv().package.find(&id).await?)
}

pub async fn validate_license(
  State(app): State<Arc<AppState>>,
  Path(key): Path<String>,
) -> Reply<Validity> {
  ok(app.sv().license.validate(&key).await?)
}

pub async fn my_licenses(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
) -> Reply<Vec<OwnedLicense>> {
  ok(app.sv().license.by_user(auth.user_id).await?)
}

pub async fn my_devices(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
  Path(id): Path<Uuid>,
) -> Reply<Vec<device::Model>> {
  ok(app.sv().license.user_devices(auth.user_id, id).await?)
}

pub async fn my_orders(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
  Query(paging): Query<Paging>,
) -> Reply<Page<PastOrder>> {
  ok(app.sv().order.by_user(auth.user_id, paging).await?)
}

pub async fn subscription(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
) -> Reply<Subscription> {
  ok(app.sv().license.current_for(auth.user_id).await?)
}
