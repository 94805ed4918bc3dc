//! Endpoints for the desktop client. Everything but `activate` runs on the
//! device token.

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;

use super::{
  Reply,
  auth::{ClientIp, DeviceAuth},
  ok,
};
use crate::{
  entity::{activity, device},
  prelude::*,
  state::AppState,
  sv::{
    device::{
      Activated, Activation, DeviceList, LicenseInfo, OtpSent, Refreshed, Verified,
    },
    usage::{ActionType, Activity, LimitCheck, UsageStats},
  },
};

pub async fn activate(
  State(app): State<Arc<AppState>>,
  ClientIp(ip): ClientIp,
  Json(mut req): Json<Activation>,
) -> Reply<Activated> {
  req.ip = ip;
  ok(app.sv().device.activate(req).await?)
}

pub async fn verify(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
) -> Reply<Verified> {
  ok(app.sv().device.verify(&grant).await?)
}

pub async fn refresh(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
) -> Reply<Refreshed> {
  ok(app.sv().device.refresh(grant).await?)
}

pub async fn license_info(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
) -> Reply<LicenseInfo> {
  ok(app.sv().device.license_info(&grant).await?)
}

pub async fn devices(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
) -> Reply<DeviceList> {
  ok(app.sv().device.list(&grant).await?)
}

pub async fn request_otp(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
  Path(device_id): Path<Uuid>,
) -> Reply<OtpSent> {
  ok(app.sv().device.request_otp(&grant, device_id).await?)
}

#[derive(Debug, Deserialize)]
pub struct Deactivation {
  otp: String,
}

pub async fn deactivate(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
  Path(device_id): Path<Uuid>,
  Json(req): Json<Deactivation>,
) -> Reply<device::Model> {
  let device = app
    .sv()
    .device
    .deactivate(&grant, device_id, &req.otp, &grant.hardware_id)
    .await?;
  ok(device)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReq {
  action_type: String,
  action_detail: Option<json::Value>,
}

pub async fn log_activity(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
  ClientIp(ip): ClientIp,
  Json(req): Json<ActivityReq>,
) -> Reply<activity::Model> {
  let logged = app
    .sv()
    .usage
    .log(Activity {
      user_id: grant.user_id,
      license_id: Some(grant.license_id),
      action_type: req.action_type,
      detail: req.action_detail,
      ip,
    })
    .await?;
  ok(logged)
}

pub async fn usage(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
) -> Reply<UsageStats> {
  ok(app.sv().usage.stats(grant.license_id).await?)
}

pub async fn check_limit(
  State(app): State<Arc<AppState>>,
  DeviceAuth(grant): DeviceAuth,
  Path(action): Path<String>,
) -> Reply<LimitCheck> {
  let action = ActionType::parse(&action);
  ok(app.sv().usage.check_limit(grant.license_id, &action).await?)
}
