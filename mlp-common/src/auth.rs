//! Password hashing, session tokens and roles
//!
//! Pure functions only. Storage lives in `db::users` and `db::sessions`;
//! cookie handling on the HTTP side lives in the service crate.
//!
//! # Password format
//!
//! `pbkdf2-sha256$<iterations>$<salt hex>$<digest hex>` where the digest
//! is PBKDF2-HMAC-SHA256 with a 32-byte output.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "mlp_session";

const HASH_SCHEME: &str = "pbkdf2-sha256";
const HASH_ITERATIONS: u32 = 100_000;
const HASH_LEN: usize = 32;
const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 32;

/// User role, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Visitor,
    Registered,
    Editor,
    Administrator,
    SuperAdministrator,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Visitor,
        Role::Registered,
        Role::Editor,
        Role::Administrator,
        Role::SuperAdministrator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Visitor => "visitor",
            Role::Registered => "registered",
            Role::Editor => "editor",
            Role::Administrator => "administrator",
            Role::SuperAdministrator => "super_administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .find(|r| r.as_str() == s)
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("unknown role '{}'", s)))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

fn digest(salt: &[u8], password: &str, iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = digest(&salt, password, HASH_ITERATIONS);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        HASH_ITERATIONS,
        to_hex(&salt),
        to_hex(&hash)
    )
}

/// Check a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iterations, salt, expected] = parts.as_slice() else {
        return false;
    };
    if *scheme != HASH_SCHEME {
        return false;
    }
    let (Ok(iterations), Some(salt), Some(expected)) =
        (iterations.parse::<u32>(), from_hex(salt), from_hex(expected))
    else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    constant_time_eq(&digest(&salt, password, iterations), &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// New random session token (64 hex characters)
pub fn generate_session_token() -> String {
    let mut token = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut token);
    to_hex(&token)
}

/// Stored form of a session token
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Extract the session token from a `Cookie` header value
pub fn session_token_from_cookie(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
