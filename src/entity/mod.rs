//! SeaORM entities backing the license server.

pub mod activity;
pub mod device;
pub mod license;
pub mod order;
pub mod package;
pub mod session;
pub mod user;

pub use license::LicenseStatus;
pub use order::{OrderStatus, PaymentMethod};
pub use session::SessionStatus;
pub use user::{ContactMethod, Role};
