// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identifier Codec
//!
//! Reversible AES-CBC encryption that turns internal record identifiers and
//! sensitive fields into URL-safe tokens.
//!
//! ## Modes
//!
//! - [`CipherMode::Opaque`]: a fresh random IV per call. Two encryptions of the
//!   same value never compare equal, so this mode is used for identifiers
//!   handed to API clients.
//! - [`CipherMode::Searchable`]: the configured fixed IV. Output is
//!   deterministic so the ciphertext can serve as a lookup key (session store
//!   keys, indexed columns). Repeated or low-entropy plaintexts are linkable in
//!   this mode; that is accepted for the fields it is used on.
//!
//! ## Wire Format
//!
//! ```text
//! base64url( IV[16] || CBC-PKCS7(plaintext) )
//! ```
//!
//! Both modes emit the IV block. Opaque decryption uses the embedded IV,
//! searchable decryption ignores it in favour of the configured one.

use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use base64ct::{Base64Url, Encoding};
use cbc::cipher::{
    block_padding::Pkcs7, BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit,
};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Operating mode of the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CipherMode {
    /// Random IV per call (unlinkable output)
    Opaque,
    /// Fixed IV (deterministic output, usable as a lookup key)
    Searchable,
}

/// Codec errors.
///
/// Every decrypt-side failure collapses into [`CodecError::DecryptionFailed`]
/// so callers cannot distinguish bad encoding from bad padding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("cipher key must be 16, 24 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("searchable IV must be {BLOCK_SIZE} hex-encoded bytes")]
    InvalidIv,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
}

/// Client-facing identifier: opaque-mode ciphertext of a raw record id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct OpaqueId(pub String);

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OpaqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

/// AES-CBC codec holding process-wide key material.
///
/// Construct once at startup and share behind an `Arc`.
#[derive(Clone)]
pub struct CipherCodec {
    key: Vec<u8>,
    key_size: KeySize,
    searchable_iv: [u8; BLOCK_SIZE],
    rng: SystemRandom,
}

impl fmt::Debug for CipherCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherCodec")
            .field("key_size", &self.key_size)
            .finish_non_exhaustive()
    }
}

impl CipherCodec {
    /// Create a codec from a raw key and a hex-encoded searchable IV.
    ///
    /// The key length selects AES-128, AES-192 or AES-256.
    pub fn new(key: &[u8], searchable_iv_hex: &str) -> Result<Self, CodecError> {
        let key_size = match key.len() {
            16 => KeySize::Aes128,
            24 => KeySize::Aes192,
            32 => KeySize::Aes256,
            other => return Err(CodecError::InvalidKeyLength(other)),
        };

        let iv_bytes = hex::decode(searchable_iv_hex.trim()).map_err(|_| CodecError::InvalidIv)?;
        let searchable_iv: [u8; BLOCK_SIZE] =
            iv_bytes.try_into().map_err(|_| CodecError::InvalidIv)?;

        Ok(Self {
            key: key.to_vec(),
            key_size,
            searchable_iv,
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt `plaintext` and return the base64url payload.
    pub fn encrypt(&self, plaintext: &str, mode: CipherMode) -> Result<String, CodecError> {
        let iv = match mode {
            CipherMode::Opaque => {
                let mut iv = [0u8; BLOCK_SIZE];
                self.rng
                    .fill(&mut iv)
                    .map_err(|_| CodecError::EncryptionFailed)?;
                iv
            }
            CipherMode::Searchable => self.searchable_iv,
        };

        let ciphertext = match self.key_size {
            KeySize::Aes128 => cbc_encrypt::<Aes128>(&self.key, &iv, plaintext.as_bytes()),
            KeySize::Aes192 => cbc_encrypt::<Aes192>(&self.key, &iv, plaintext.as_bytes()),
            KeySize::Aes256 => cbc_encrypt::<Aes256>(&self.key, &iv, plaintext.as_bytes()),
        }?;

        let mut payload = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        payload.extend_from_slice(&iv);
        payload.extend_from_slice(&ciphertext);

        Ok(Base64Url::encode_string(&payload))
    }

    /// Decrypt a base64url payload produced by [`CipherCodec::encrypt`].
    ///
    /// Never returns partially decrypted data: malformed encoding, short or
    /// misaligned input, bad padding and non-UTF-8 output all fail.
    pub fn decrypt(&self, encoded: &str, mode: CipherMode) -> Result<String, CodecError> {
        let payload =
            Base64Url::decode_vec(encoded.trim()).map_err(|_| CodecError::DecryptionFailed)?;

        // IV block plus at least one ciphertext block, block aligned.
        if payload.len() < 2 * BLOCK_SIZE || payload.len() % BLOCK_SIZE != 0 {
            return Err(CodecError::DecryptionFailed);
        }

        let (embedded_iv, ciphertext) = payload.split_at(BLOCK_SIZE);
        let iv = match mode {
            CipherMode::Opaque => embedded_iv,
            CipherMode::Searchable => &self.searchable_iv[..],
        };

        let plaintext = match self.key_size {
            KeySize::Aes128 => cbc_decrypt::<Aes128>(&self.key, iv, ciphertext),
            KeySize::Aes192 => cbc_decrypt::<Aes192>(&self.key, iv, ciphertext),
            KeySize::Aes256 => cbc_decrypt::<Aes256>(&self.key, iv, ciphertext),
        }?;

        String::from_utf8(plaintext).map_err(|_| CodecError::DecryptionFailed)
    }

    /// Deterministic lookup key for a sensitive value (e.g. an email).
    pub fn searchable(&self, plaintext: &str) -> Result<String, CodecError> {
        self.encrypt(plaintext, CipherMode::Searchable)
    }

    /// Conceal a raw record id as an [`OpaqueId`].
    pub fn conceal(&self, raw_id: i64) -> Result<OpaqueId, CodecError> {
        self.encrypt(&raw_id.to_string(), CipherMode::Opaque)
            .map(OpaqueId)
    }

    /// Recover the raw record id behind an [`OpaqueId`].
    pub fn reveal(&self, opaque: &str) -> Result<i64, CodecError> {
        self.decrypt(opaque, CipherMode::Opaque)?
            .parse()
            .map_err(|_| CodecError::DecryptionFailed)
    }
}

fn cbc_encrypt<C>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CodecError>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let encryptor = cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| CodecError::EncryptionFailed)?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CodecError>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| CodecError::DecryptionFailed)?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CodecError::DecryptionFailed)
}
