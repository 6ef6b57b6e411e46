//! Salted PBKDF2-HMAC-SHA256 password hashes.
//!
//! Stored form: `pbkdf2-sha256$<rounds>$<salt b64>$<key b64>`.

use base64::{engine::general_purpose::STANDARD, Engine};
use pbkdf2::pbkdf2_hmac_array;
use rand::RngCore;
use sha2::Sha256;

const SCHEME: &str = "pbkdf2-sha256";
const ROUNDS: u32 = if cfg!(test) { 1_000 } else { 600_000 };
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(password.as_bytes(), &salt, ROUNDS);
    format!(
        "{SCHEME}${ROUNDS}${}${}",
        STANDARD.encode(salt),
        STANDARD.encode(digest)
    )
}

/// False for malformed stored hashes as well as wrong passwords.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(digest), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let (Ok(rounds), Ok(salt), Ok(expected)) = (
        rounds.parse::<u32>(),
        STANDARD.decode(salt),
        STANDARD.decode(digest),
    ) else {
        return false;
    };
    if rounds == 0 {
        return false;
    }
    constant_time_eq(&derive(password.as_bytes(), &salt, rounds), &expected)
}

fn derive(password: &[u8], salt: &[u8], rounds: u32) -> [u8; KEY_LEN] {
    pbkdf2_hmac_array::<Sha256, KEY_LEN>(password, salt, rounds)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
