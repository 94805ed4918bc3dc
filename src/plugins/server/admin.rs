use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use super::{Reply, auth::AdminAuth, ok};
use crate::{
  entity::{device, license, order, package, user},
  prelude::*,
  state::AppState,
  sv::{
    Page, Paging,
    license::{LicenseDetail, LicenseFilter, LicenseRow, LicenseUpdate, ManualGrant},
    order::{Approval, Approved, OrderDetail, OrderFilter, OrderRow},
    user::{UserDetail, UserFilter, UserRow, UserUpdate},
  },
};

pub async fn orders(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Query(filter): Query<OrderFilter>,
  Query(paging): Query<Paging>,
) -> Reply<Page<OrderRow>> {
  ok(app.sv().order.list(filter, paging).await?)
}

pub async fn order(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
) -> Reply<OrderDetail> {
  ok(app.sv().order.detail(id).await?)
}

pub async fn approve(
  State(app): State<Arc<AppState>>,
  AdminAuth { admin }: AdminAuth,
  Path(id): Path<Uuid>,
  Json(approval): Json<Approval>,
) -> Reply<Approved> {
  ok(app.sv().order.approve(id, admin.id, approval).await?)
}

#[derive(Debug, Deserialize)]
pub struct Rejection {
  reason: String,
}

pub async fn reject(
  State(app): State<Arc<AppState>>,
  AdminAuth { admin }: AdminAuth,
  Path(id): Path<Uuid>,
  Json(req): Json<Rejection>,
) -> Reply<order::Model> {
  ok(app.sv().order.reject(id, admin.id, &req.reason).await?)
}

pub async fn licenses(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Query(filter): Query<LicenseFilter>,
  Query(paging): Query<Paging>,
) -> Reply<Page<LicenseRow>> {
  ok(app.sv().license.list(filter, paging).await?)
}

pub async fn generate(
  State(app): State<Arc<AppState>>,
  AdminAuth { admin }: AdminAuth,
  Json(grant): Json<ManualGrant>,
) -> Reply<license::Model> {
  let grant = ManualGrant { admin_id: Some(admin.id), ..grant };
  ok(app.sv().license.generate(grant).await?)
}

pub async fn license(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
) -> Reply<LicenseDetail> {
  ok(app.sv().license.detail(id).await?)
}

pub async fn update(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
  Json(patch): Json<LicenseUpdate>,
) -> Reply<license::Model> {
  ok(app.sv().license.update(id, patch).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct Revocation {
  #[serde(default)]
  reason: String,
}

pub async fn revoke(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
  Json(req): Json<Revocation>,
) -> Reply<license::Model> {
  ok(app.sv().license.revoke(id, &req.reason).await?)
}

#[derive(Debug, Deserialize)]
pub struct Extension {
  months: i32,
}

pub async fn extend(
  State(app): State<Arc<AppState>>,
  AdminAuth { admin }: AdminAuth,
  Path(id): Path<Uuid>,
  Json(req): Json<Extension>,
) -> Reply<license::Model> {
  ok(app.sv().license.extend(id, req.months, admin.id).await?)
}

pub async fn devices(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
) -> Reply<Vec<device::Model>> {
  ok(app.sv().license.devices(id).await?)
}

pub async fn remove_device(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path((id, device_id)): Path<(Uuid, Uuid)>,
) -> Reply<device::Model> {
  ok(app.sv().device.admin_remove(id, device_id).await?)
}

#[derive(Debug, Serialize)]
pub struct Reset {
  deactivated: u64,
}

pub async fn reset_devices(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
) -> Reply<Reset> {
  ok(Reset { deactivated: app.sv().device.reset_all(id).await? })
}

pub async fn deactivate_package(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
) -> Reply<package::Model> {
  ok(app.sv().package.deactivate(id).await?)
}

pub async fn users(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Query(filter): Query<UserFilter>,
  Query(paging): Query<Paging>,
) -> Reply<Page<UserRow>> {
  ok(app.sv().user.list(filter, paging).await?)
}

pub async fn user(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
) -> Reply<UserDetail> {
  ok(app.sv().user.detail(id).await?)
}

pub async fn update_user(
  State(app): State<Arc<AppState>>,
  _: AdminAuth,
  Path(id): Path<Uuid>,
  Json(patch): Json<UserUpdate>,
) -> Reply<user::Model> {
  ok(app.sv().user.update(id, patch).await?)
}
