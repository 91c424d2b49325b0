//! Password hashing and verification for gateway login.
//!
//! Stored credentials use the format `scrypt$<salt-hex>$<derived-hex>` with
//! fixed cost parameters (N=2^14, r=8, p=1, 32-byte key). Verification fails
//! closed: any structural problem in the stored value yields `false`, never
//! an error, and the derived-key comparison is constant-time.

use anyhow::{anyhow, Result};
use rand::RngCore;
use scrypt::Params;
use subtle::ConstantTimeEq;

const ALGORITHM: &str = "scrypt";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

// N=16384, r=8, p=1.
const LOG_N: u8 = 14;
const R: u32 = 8;
const P: u32 = 1;

fn derive(password: &str, salt: &[u8]) -> Option<[u8; KEY_LEN]> {
    let params = Params::new(LOG_N, R, P, KEY_LEN).ok()?;
    let mut out = [0u8; KEY_LEN];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut out).ok()?;
    Some(out)
}

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let derived =
        derive(password, &salt).ok_or_else(|| anyhow!("scrypt key derivation failed"))?;
    Ok(format!(
        "{ALGORITHM}${}${}",
        hex::encode(salt),
        hex::encode(derived)
    ))
}

/// Check a plaintext password against a stored `scrypt$salt$hash` value.
///
/// Returns `false` for a missing stored value, wrong field count, wrong
/// algorithm tag, undecodable hex, or a derived key of the wrong length.
pub fn verify_password(password: &str, stored: Option<&str>) -> bool {
    let Some(stored) = stored else {
        return false;
    };
    let parts: Vec<&str> = stored.split('$').collect();
    let [algo, salt_hex, hash_hex] = parts.as_slice() else {
        return false;
    };
    if *algo != ALGORITHM || salt_hex.is_empty() || hash_hex.is_empty() {
        return false;
    }
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };
    if expected.len() != KEY_LEN {
        return false;
    }
    let Some(derived) = derive(password, &salt) else {
        return false;
    };
    derived.as_slice().ct_eq(expected.as_slice()).into()
}
