mod admin;
mod auth;
mod client;
mod orders;
mod users;

use std::net::SocketAddr;

use axum::{
  Json, Router,
  routing::{delete, get, post},
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

/// Success body shared by every endpoint; failures render through
/// `Error: IntoResponse` with the same `success` flag.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  success: bool,
  data: T,
}

pub type Reply<T> = Result<Json<Envelope<T>>>;

pub fn ok<T: Serialize>(data: T) -> Reply<T> {
  Ok(Json(Envelope { success: true, data }))
}

async fn health() -> &'static str {
  "OK"
}

pub fn routes() -> Router<Arc<AppState>> {
  Router::new()
    .route("/health", get(health))
    // catalogue and buyer account
    .route("/api/packages", get(users::packages))
    .route("/api/packages/{id}", get(users::package))
    .route("/api/users", post(users::register))
    .route("/api/users/me", get(users::me).patch(users::update_contact))
    .route("/api/users/me/orders", get(users::my_orders))
    .route("/api/users/me/subscription", get(users::subscription))
    .route("/api/sessions/current", delete(users::logout))
    // orders
    .route("/api/orders", post(orders::create))
    .route("/api/orders/{id}", get(orders::get))
    .route("/api/orders/{id}/status", get(orders::status))
    .route("/api/orders/{id}/confirm", post(orders::confirm))
    // licenses
    .route("/api/licenses/validate/{key}", get(users::validate_license))
    .route("/api/licenses/mine", get(users::my_licenses))
    .route("/api/licenses/{id}/devices", get(users::my_devices))
    // desktop client
    .route("/api/client/activate", post(client::activate))
    .route("/api/client/verify", post(client::verify))
    .route("/api/client/refresh", post(client::refresh))
    .route("/api/client/license", get(client::license_info))
    .route("/api/client/devices", get(client::devices))
    .route("/api/client/devices/{id}/otp", post(client::request_otp))
    .route("/api/client/devices/{id}/deactivate", post(client::deactivate))
    .route("/api/client/activity", post(client::log_activity))
    .route("/api/client/usage", get(client::usage))
    .route("/api/client/limits/{action}", get(client::check_limit))
    // back office
    .route("/api/admin/orders", get(admin::orders))
    .route("/api/admin/orders/{id}", get(admin::order))
    .route("/api/admin/orders/{id}/approve", post(admin::approve))
    .route("/api/admin/orders/{id}/reject", post(admin::reject))
    .route("/api/admin/licenses", get(admin::licenses).post(admin::generate))
    .route("/api/admin/licenses/{id}", get(admin::license).patch(admin::update))
    .route("/api/admin/licenses/{id}/revoke", post(admin::revoke))
    .route("/api/admin/licenses/{id}/extend", post(admin::extend))
    .route("/api/admin/licenses/{id}/devices", get(admin::devices))
    .route("/api/admin/licenses/{id}/devices/reset", post(admin::reset_devices))
    .route(
      "/api/admin/licenses/{id}/devices/{device_id}",
      delete(admin::remove_device),
    )
    .route("/api/admin/users", get(admin::users))
    .route("/api/admin/users/{id}", get(admin::user).patch(admin::update_user))
    .route("/api/admin/packages/{id}", delete(admin::deactivate_package))
}

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  fn name(&self) -> &'static str {
    "http"
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );
    let limiter = governor.limiter().clone();

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));

    let router = routes()
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .with_state(app)
      .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {addr}");

    let cleaner = async {
      loop {
        time::sleep(Duration::from_secs(60)).await;
        limiter.retain_recent();
      }
    };

    tokio::select! {
      result = axum::serve(listener, router) => {
        result.context("HTTP server stopped")
      }
      _ = cleaner => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
  };
  use tower::ServiceExt;

  use super::*;
  use crate::testing;

  async fn call(
    app: &Arc<AppState>,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<json::Value>,
  ) -> (StatusCode, json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
      Some(body) => request
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string())),
      None => request.body(Body::empty()),
    }
    .unwrap();

    let response = routes().with_state(app.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, json::from_slice(&bytes).unwrap_or(json::Value::Null))
  }

  #[tokio::test]
  async fn buyer_flow_over_http() {
    let test = testing::app().await;
    let package = testing::package(&test.db, 1, 1, 30).await;
    let admin = testing::admin(&test.db).await;
    let admin_token = test.sv().session.open(admin.id, None).await.unwrap().id;
    let app = test.shared();

    let (status, body) = call(
      &app,
      Method::POST,
      "/api/users",
      None,
      Some(json::json!({ "email": "buyer@example.com", "name": "Buyer" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = call(
      &app,
      Method::POST,
      "/api/orders",
      Some(&token),
      Some(json::json!({ "packageId": package.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let (status, _) =
      call(&app, Method::POST, &format!("/api/orders/{order_id}/confirm"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // buyers cannot approve their own orders
    let (status, body) = call(
      &app,
      Method::POST,
      &format!("/api/admin/orders/{order_id}/approve"),
      Some(&token),
      Some(json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = call(
      &app,
      Method::POST,
      &format!("/api/admin/orders/{order_id}/approve"),
      Some(&admin_token.to_string()),
      Some(json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let key = body["data"]["license"]["licenseKey"].as_str().unwrap().to_string();

    let (status, body) =
      call(&app, Method::GET, &format!("/api/licenses/validate/{key}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);

    let (status, body) =
      call(&app, Method::GET, "/api/users/me/subscription", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hasActiveSubscription"], true);
    assert_eq!(body["data"]["subscription"]["licenseKey"], key.as_str());

    let (status, body) =
      call(&app, Method::GET, "/api/users/me/orders?page=1&limit=5", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["licenseKey"], key.as_str());

    let admin_token = admin_token.to_string();
    let (status, body) = call(
      &app,
      Method::GET,
      "/api/admin/users?search=buyer@",
      Some(&admin_token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    let user_id = body["data"]["items"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
      &app,
      Method::PATCH,
      &format!("/api/admin/users/{user_id}"),
      Some(&admin_token),
      Some(json::json!({ "role": "ADMIN" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "ADMIN");

    let (status, body) =
      call(&app, Method::GET, &format!("/api/admin/users/{user_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["licenses"][0]["licenseKey"], key.as_str());
  }

  #[tokio::test]
  async fn client_errors_carry_codes() {
    let test = testing::app().await;
    let user = testing::user(&test.db, "buyer@example.com").await;
    let package = testing::package(&test.db, 1, 1, 30).await;
    let license = testing::license(&test, &user, &package).await;
    let app = test.shared();

    let activate = |hardware: &str| {
      json::json!({
        "licenseKey": license.license_key,
        "hardwareId": hardware,
        "deviceName": "Studio PC",
        "deviceOS": "Windows 11",
      })
    };

    let (status, body) =
      call(&app, Method::POST, "/api/client/activate", None, Some(activate("hw-a"))).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) =
      call(&app, Method::POST, "/api/client/activate", None, Some(activate("hw-b"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "DEVICE_LIMIT_REACHED");

    let (status, body) =
      call(&app, Method::GET, "/api/client/limits/video_create", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["canProceed"], true);

    let (status, body) = call(&app, Method::GET, "/api/client/license", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_REQUIRED");
  }
}
