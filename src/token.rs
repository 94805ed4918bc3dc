//! Device-scoped tokens handed to the desktop client after activation.
//!
//! HS256 JWTs carrying the license, hardware fingerprint and owner, so later
//! client calls do not have to resend the license key.

use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
  pub license_id: Uuid,
  pub hardware_id: String,
  pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
  #[serde(flatten)]
  grant: Grant,
  iat: i64,
  exp: i64,
}

pub struct Tokens {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl: Duration,
}

impl std::fmt::Debug for Tokens {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Tokens").field("ttl", &self.ttl).finish_non_exhaustive()
  }
}

impl Tokens {
  pub fn new(secret: &str, ttl: Duration) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl,
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn issue(&self, grant: Grant) -> Result<String> {
    let iat = Utc::now().timestamp();
    let claims = Claims { grant, iat, exp: iat + self.ttl.as_secs() as i64 };

    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
      .map_err(|err| Error::Internal(format!("Failed to sign token: {err}")))
  }

  pub fn verify(&self, token: &str) -> Result<Grant> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &self.decoding, &validation)
      .map(|data| data.claims.grant)
      .map_err(|_| Error::InvalidToken)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn grant() -> Grant {
    Grant {
      license_id: Uuid::new_v4(),
      hardware_id: "hw-1".into(),
      user_id: Uuid::new_v4(),
    }
  }

  #[test]
  fn issued_token_verifies_to_same_grant() {
    let tokens = Tokens::new("secret", Duration::from_secs(3600));
    let grant = grant();

    let token = tokens.issue(grant.clone()).unwrap();
    assert_eq!(tokens.verify(&token).unwrap(), grant);
  }

  #[test]
  fn foreign_or_garbled_tokens_are_rejected() {
    let ours = Tokens::new("secret", Duration::from_secs(3600));
    let theirs = Tokens::new("other", Duration::from_secs(3600));

    let token = theirs.issue(grant()).unwrap();
    assert!(matches!(ours.verify(&token), Err(Error::InvalidToken)));
    assert!(matches!(ours.verify("not-a-jwt"), Err(Error::InvalidToken)));
  }

  #[test]
  fn expired_token_is_rejected() {
    let tokens = Tokens::new("secret", Duration::ZERO);
    let token = tokens.issue(grant()).unwrap();

    std::thread::sleep(Duration::from_millis(1100));
    assert!(matches!(tokens.verify(&token), Err(Error::InvalidToken)));
  }
}
