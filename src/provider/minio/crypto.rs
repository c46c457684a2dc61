//! # Admin Payload Encryption
//!
//! MinIO requires sensitive admin request bodies (new user credentials,
//! policy attach/detach requests) to be encrypted with the caller's secret key.
//!
//! Wire layout:
//!
//! ```text
//! salt (32) | algorithm id (1) | nonce (8) | sealed stream
//! ```
//!
//! The key is derived with PBKDF2-HMAC-SHA256 (algorithm id `0x02`). The stream
//! is split into 16 KiB fragments, each sealed with AES-256-GCM under the nonce
//! `nonce || LE32(sequence)`. Fragment associated data is a one byte flag
//! (`0x80` on the final fragment) followed by a header tag bound to sequence 0.

use crate::provider::RemoteError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

const SALT_LEN: usize = 32;
const STREAM_NONCE_LEN: usize = 8;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = SALT_LEN + 1 + STREAM_NONCE_LEN;
const FRAGMENT_SIZE: usize = 16 * 1024;
const PBKDF2_ITERATIONS: u32 = 8192;
const FINAL_FLAG: u8 = 0x80;

/// Algorithm identifier for PBKDF2 + AES-256-GCM
pub const PBKDF2_AES_GCM: u8 = 0x02;

/// Encrypt an admin request body with the caller's secret key
pub fn encrypt_data(password: &str, data: &[u8]) -> Result<Vec<u8>, RemoteError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| RemoteError::Crypto("system random source unavailable".into()))?;
    encrypt_with_salt(password, data, &salt)
}

pub(crate) fn encrypt_with_salt(
    password: &str,
    data: &[u8],
    salt: &[u8; SALT_LEN],
) -> Result<Vec<u8>, RemoteError> {
    let key = derive_key(password, salt)?;
    let mut stream_nonce = [0u8; STREAM_NONCE_LEN];
    stream_nonce.copy_from_slice(&salt[..STREAM_NONCE_LEN]);

    let fragments = data.len().div_ceil(FRAGMENT_SIZE).max(1);
    let mut out = Vec::with_capacity(HEADER_LEN + data.len() + fragments * TAG_LEN);
    out.extend_from_slice(salt);
    out.push(PBKDF2_AES_GCM);
    out.extend_from_slice(&stream_nonce);

    let header_tag = header_tag(&key, &stream_nonce)?;
    let mut chunks: Vec<&[u8]> = data.chunks(FRAGMENT_SIZE).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    let last = chunks.len() - 1;
    for (i, chunk) in chunks.into_iter().enumerate() {
        let seq = u32::try_from(i + 1)
            .map_err(|_| RemoteError::Crypto("payload too large".into()))?;
        let flag = if i == last { FINAL_FLAG } else { 0x00 };
        let mut fragment = chunk.to_vec();
        key.seal_in_place_append_tag(
            fragment_nonce(&stream_nonce, seq),
            Aad::from(associated_data(flag, &header_tag)),
            &mut fragment,
        )
        .map_err(|_| RemoteError::Crypto("failed to seal fragment".into()))?;
        out.extend_from_slice(&fragment);
    }
    Ok(out)
}

/// Decrypt a payload produced by [`encrypt_data`]
pub fn decrypt_data(password: &str, data: &[u8]) -> Result<Vec<u8>, RemoteError> {
    if data.len() < HEADER_LEN + TAG_LEN {
        return Err(RemoteError::Crypto("ciphertext too short".into()));
    }
    let (salt, rest) = data.split_at(SALT_LEN);
    let (id, rest) = rest.split_at(1);
    let (nonce, mut sealed) = rest.split_at(STREAM_NONCE_LEN);
    if id[0] != PBKDF2_AES_GCM {
        return Err(RemoteError::Crypto(format!(
            "unsupported algorithm id {:#04x}",
            id[0]
        )));
    }

    let key = derive_key(password, salt)?;
    let mut stream_nonce = [0u8; STREAM_NONCE_LEN];
    stream_nonce.copy_from_slice(nonce);
    let header_tag = header_tag(&key, &stream_nonce)?;

    let mut plaintext = Vec::with_capacity(sealed.len());
    let mut seq: u32 = 1;
    loop {
        let is_final = sealed.len() <= FRAGMENT_SIZE + TAG_LEN;
        let take = if is_final {
            sealed.len()
        } else {
            FRAGMENT_SIZE + TAG_LEN
        };
        let (fragment, remaining) = sealed.split_at(take);
        let flag = if is_final { FINAL_FLAG } else { 0x00 };
        let mut buf = fragment.to_vec();
        let opened = key
            .open_in_place(
                fragment_nonce(&stream_nonce, seq),
                Aad::from(associated_data(flag, &header_tag)),
                &mut buf,
            )
            .map_err(|_| RemoteError::Crypto("authentication failed".into()))?;
        plaintext.extend_from_slice(opened);
        if is_final {
            return Ok(plaintext);
        }
        sealed = remaining;
        seq += 1;
    }
}

fn derive_key(password: &str, salt: &[u8]) -> Result<LessSafeKey, RemoteError> {
    let mut key = [0u8; 32];
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| RemoteError::Crypto("invalid iteration count".into()))?;
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password.as_bytes(),
        &mut key,
    );
    let unbound = UnboundKey::new(&AES_256_GCM, &key)
        .map_err(|_| RemoteError::Crypto("invalid key length".into()))?;
    Ok(LessSafeKey::new(unbound))
}

fn fragment_nonce(stream_nonce: &[u8; STREAM_NONCE_LEN], seq: u32) -> Nonce {
    let mut nonce = [0u8; 12];
    nonce[..STREAM_NONCE_LEN].copy_from_slice(stream_nonce);
    nonce[STREAM_NONCE_LEN..].copy_from_slice(&seq.to_le_bytes());
    Nonce::assume_unique_for_key(nonce)
}

// Tag of an empty message under sequence 0, binds every fragment to the stream
fn header_tag(
    key: &LessSafeKey,
    stream_nonce: &[u8; STREAM_NONCE_LEN],
) -> Result<[u8; TAG_LEN], RemoteError> {
    let mut empty = Vec::with_capacity(TAG_LEN);
    key.seal_in_place_append_tag(fragment_nonce(stream_nonce, 0), Aad::empty(), &mut empty)
        .map_err(|_| RemoteError::Crypto("failed to seal stream header".into()))?;
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&empty);
    Ok(tag)
}

fn associated_data(flag: u8, header_tag: &[u8; TAG_LEN]) -> [u8; 1 + TAG_LEN] {
    let mut ad = [0u8; 1 + TAG_LEN];
    ad[0] = flag;
    ad[1..].copy_from_slice(header_tag);
    ad
}
