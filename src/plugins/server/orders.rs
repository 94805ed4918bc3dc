use axum::{
  Json,
  extract::{Path, State},
};

use super::{Reply, auth::UserAuth, ok};
use crate::{
  entity::order,
  prelude::*,
  state::AppState,
  sv::order::{Created, OrderRequest, OrderView, StatusView},
};

pub async fn create(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
  Json(req): Json<OrderRequest>,
) -> Reply<Created> {
  ok(app.sv().order.create(auth.user_id, req).await?)
}

pub async fn get(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
  Path(id): Path<Uuid>,
) -> Reply<OrderView> {
  ok(app.sv().order.get_owned(auth.user_id, id).await?)
}

pub async fn status(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
  Path(id): Path<Uuid>,
) -> Reply<StatusView> {
  ok(app.sv().order.status(auth.user_id, id).await?)
}

pub async fn confirm(
  State(app): State<Arc<AppState>>,
  auth: UserAuth,
  Path(id): Path<Uuid>,
) -> Reply<order::Model> {
  ok(app.sv().order.confirm(auth.user_id, id).await?)
}
