//! Error types for the license server

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sea_orm::ActiveEnum;

use crate::entity::OrderStatus;

/// Coarse error taxonomy shared by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  NotFound,
  Conflict,
  InvalidState,
  Forbidden,
  LimitReached,
  Expired,
  Revoked,
  InvalidInput,
  AuthRequired,
  InvalidToken,
  Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("Package not found")]
  PackageNotFound,

  #[error("Package is not available")]
  PackageInactive,

  #[error("Order not found")]
  OrderNotFound,

  #[error("Cannot {action} order with status: {status}")]
  InvalidOrderStatus { action: &'static str, status: String },

  #[error("Order has expired")]
  OrderExpired,

  #[error("License not found")]
  LicenseNotFound,

  #[error("License has been revoked")]
  LicenseRevoked,

  #[error("License has expired")]
  LicenseExpired,

  #[error("Device limit reached: {used}/{max} devices used")]
  DeviceLimitReached { used: u64, max: i32 },

  #[error("Device not registered or has been deactivated")]
  DeviceNotFound,

  #[error("Cannot deactivate the current device")]
  CannotDeactivateCurrentDevice,

  #[error("OTP has expired or was not requested")]
  OtpExpired,

  #[error("Invalid OTP")]
  InvalidOtp,

  #[error("User not found")]
  UserNotFound,

  #[error("Email is already registered")]
  EmailTaken,

  #[error("Access denied")]
  Forbidden,

  #[error("{0}")]
  InvalidInput(String),

  #[error("Authorization header missing or invalid")]
  AuthRequired,

  #[error("Invalid or expired token")]
  InvalidToken,

  #[error("Internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn kind(&self) -> Kind {
    match self {
      Error::Database(_) | Error::Internal(_) => Kind::Internal,
      Error::PackageNotFound
      | Error::OrderNotFound
      | Error::LicenseNotFound
      | Error::DeviceNotFound
      | Error::UserNotFound => Kind::NotFound,
      Error::EmailTaken => Kind::Conflict,
      Error::PackageInactive
      | Error::InvalidOrderStatus { .. }
      | Error::CannotDeactivateCurrentDevice => Kind::InvalidState,
      Error::Forbidden => Kind::Forbidden,
      Error::DeviceLimitReached { .. } => Kind::LimitReached,
      Error::OrderExpired | Error::LicenseExpired | Error::OtpExpired => {
        Kind::Expired
      }
      Error::LicenseRevoked => Kind::Revoked,
      Error::InvalidInput(_) | Error::InvalidOtp => Kind::InvalidInput,
      Error::AuthRequired => Kind::AuthRequired,
      Error::InvalidToken => Kind::InvalidToken,
    }
  }

  /// Stable machine-readable code sent to clients.
  pub fn code(&self) -> &'static str {
    match self {
      Error::Database(_) | Error::Internal(_) => "INTERNAL_ERROR",
      Error::PackageNotFound => "PACKAGE_NOT_FOUND",
      Error::PackageInactive => "PACKAGE_INACTIVE",
      Error::OrderNotFound => "ORDER_NOT_FOUND",
      Error::InvalidOrderStatus { .. } => "INVALID_ORDER_STATUS",
      Error::OrderExpired => "ORDER_EXPIRED",
      Error::LicenseNotFound => "LICENSE_NOT_FOUND",
      Error::LicenseRevoked => "LICENSE_REVOKED",
      Error::LicenseExpired => "LICENSE_EXPIRED",
      Error::DeviceLimitReached { .. } => "DEVICE_LIMIT_REACHED",
      Error::DeviceNotFound => "DEVICE_NOT_FOUND",
      Error::CannotDeactivateCurrentDevice => {
        "CANNOT_DEACTIVATE_CURRENT_DEVICE"
      }
      Error::OtpExpired => "OTP_EXPIRED",
      Error::InvalidOtp => "INVALID_OTP",
      Error::UserNotFound => "USER_NOT_FOUND",
      Error::EmailTaken => "EMAIL_ALREADY_EXISTS",
      Error::Forbidden => "FORBIDDEN",
      Error::InvalidInput(_) => "INVALID_INPUT",
      Error::AuthRequired => "AUTH_REQUIRED",
      Error::InvalidToken => "INVALID_TOKEN",
    }
  }

  pub fn invalid_status(action: &'static str, status: OrderStatus) -> Self {
    Error::InvalidOrderStatus { action, status: status.to_value() }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match self.kind() {
      Kind::NotFound => StatusCode::NOT_FOUND,
      Kind::Conflict => StatusCode::CONFLICT,
      Kind::InvalidState | Kind::InvalidInput | Kind::Expired => {
        StatusCode::BAD_REQUEST
      }
      Kind::Forbidden | Kind::LimitReached | Kind::Revoked => {
        StatusCode::FORBIDDEN
      }
      Kind::AuthRequired | Kind::InvalidToken => StatusCode::UNAUTHORIZED,
      Kind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match &self {
      Error::Database(err) => {
        tracing::error!("Database error: {err}");
        "Internal error".to_string()
      }
      Error::Internal(err) => {
        tracing::error!("Internal error: {err}");
        "Internal error".to_string()
      }
      other => other.to_string(),
    };

    let body = json::json!({
      "success": false,
      "code": self.code(),
      "message": message,
    });

    (status, axum::Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_guard_message_carries_current_status() {
    let err = Error::invalid_status("approve", OrderStatus::Pending);
    assert_eq!(err.to_string(), "Cannot approve order with status: PENDING");
    assert_eq!(err.code(), "INVALID_ORDER_STATUS");
    assert_eq!(err.kind(), Kind::InvalidState);
  }

  #[test]
  fn seat_limit_message_has_both_numbers() {
    let err = Error::DeviceLimitReached { used: 1, max: 1 };
    assert_eq!(err.to_string(), "Device limit reached: 1/1 devices used");
    assert_eq!(err.kind(), Kind::LimitReached);
  }
}
