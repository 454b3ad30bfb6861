//! RFC 6238 time-based one-time passwords.
//!
//! HMAC-SHA1, 30 second steps, 6 digits, one step of skew either way.

use super::ports::{Clock, TotpVerifier};
use crate::error::{Error, Result};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type HmacSha1 = Hmac<Sha1>;

/// Seconds per code.
pub const TOTP_STEP_SECONDS: i64 = 30;
/// Code length.
pub const TOTP_DIGITS: u32 = 6;
/// Accepted steps before and after the current one.
pub const TOTP_SKEW_STEPS: i64 = 1;

/// RFC 4226 HOTP value for `counter`.
fn hotp(secret: &[u8], counter: u64, digits: u32) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret).map_err(|e| Error::InvalidInput {
        field: "totp secret",
        reason: e.to_string(),
    })?;
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0F) as usize;
    let code = u32::from_be_bytes([hash[offset] & 0x7F, hash[offset + 1], hash[offset + 2], hash[offset + 3]]);
    Ok(format!("{:0width$}", code % 10u32.pow(digits), width = digits as usize))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// TOTP verifier over per-user shared secrets.
pub struct TotpAuthenticator {
    secrets: RwLock<HashMap<String, Vec<u8>>>,
    clock: Arc<dyn Clock>,
}

impl TotpAuthenticator {
    /// Create an authenticator reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            secrets: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Register the shared secret of `user_id`.
    pub fn enroll(&self, user_id: impl Into<String>, secret: impl Into<Vec<u8>>) {
        self.secrets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into(), secret.into());
    }

    /// The code for `user_id` at the current time.
    pub fn current_code(&self, user_id: &str) -> Result<String> {
        let secret = self.secret(user_id).ok_or_else(|| Error::InvalidTotp {
            user_id: user_id.to_string(),
        })?;
        hotp(&secret, self.counter(0), TOTP_DIGITS)
    }

    fn secret(&self, user_id: &str) -> Option<Vec<u8>> {
        self.secrets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    fn counter(&self, skew: i64) -> u64 {
        let step = self.clock.now().timestamp().div_euclid(TOTP_STEP_SECONDS) + skew;
        step.max(0) as u64
    }
}

impl TotpVerifier for TotpAuthenticator {
    fn verify(&self, user_id: &str, token: &str) -> Result<bool> {
        let token = token.trim();
        if token.len() != TOTP_DIGITS as usize || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        let Some(secret) = self.secret(user_id) else {
            log::warn!("No TOTP secret enrolled for user {}", user_id);
            return Ok(false);
        };
        for skew in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
            let expected = hotp(&secret, self.counter(skew), TOTP_DIGITS)?;
            if constant_time_eq(expected.as_bytes(), token.as_bytes()) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
