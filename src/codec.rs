//! Secret and token construction.
//!
//! A token is laid out as:
//!
//! | bytes                    | content                                  |
//! |--------------------------|------------------------------------------|
//! | `0`                      | digest algorithm id (always `0`, SHA-1)  |
//! | `1`                      | salt length `n`                          |
//! | `2..2 + n`               | salt                                     |
//! | `2 + n..`                | `SHA-1(secret ‖ salt)`, 20 bytes         |

use std::sync::Arc;

use base64::prelude::*;
use rand::{rngs::OsRng, thread_rng, Rng, RngCore};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Length of the digest appended to every token.
pub const DIGEST_LEN: usize = 20;

/// Shortest byte sequence that can be a token: header plus digest, no salt.
pub const MIN_TOKEN_LEN: usize = 2 + DIGEST_LEN;

const ALGORITHM_SHA1: u8 = 0;

/// A source of random bytes.
pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]);
}

/// The operating system CSPRNG. Used for secrets.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// The thread-local generator. Used for salts, which only need to be unique.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn fill(&self, dest: &mut [u8]) {
        thread_rng().fill(dest);
    }
}

/// Digest over `secret ‖ salt`.
pub trait TokenDigest: Send + Sync {
    fn digest(&self, secret: &[u8], salt: &[u8]) -> [u8; DIGEST_LEN];
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sha1Digest;

impl TokenDigest for Sha1Digest {
    fn digest(&self, secret: &[u8], salt: &[u8]) -> [u8; DIGEST_LEN] {
        let mut hasher = Sha1::new();
        hasher.update(secret);
        hasher.update(salt);

        hasher.finalize().into()
    }
}

/// Creates secrets and creates/verifies the tokens derived from them.
#[derive(Clone)]
pub struct Codec {
    secret_source: Arc<dyn RandomSource>,
    salt_source: Arc<dyn RandomSource>,
    digest: Arc<dyn TokenDigest>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(OsRandom, ThreadRandom, Sha1Digest)
    }
}

impl Codec {
    pub fn new(
        secret_source: impl RandomSource + 'static,
        salt_source: impl RandomSource + 'static,
        digest: impl TokenDigest + 'static,
    ) -> Self {
        Self {
            secret_source: Arc::new(secret_source),
            salt_source: Arc::new(salt_source),
            digest: Arc::new(digest),
        }
    }

    pub fn create_secret(&self, byte_length: usize) -> Vec<u8> {
        let mut secret = vec![0; byte_length];
        self.secret_source.fill(&mut secret);

        secret
    }

    pub fn create_salt(&self, byte_length: usize) -> Vec<u8> {
        let mut salt = vec![0; byte_length];
        self.salt_source.fill(&mut salt);

        salt
    }

    pub fn digest(&self, secret: &[u8], salt: &[u8]) -> [u8; DIGEST_LEN] {
        self.digest.digest(secret, salt)
    }

    pub fn create_token(&self, secret: &[u8], salt_byte_length: u8) -> Vec<u8> {
        let salt = self.create_salt(salt_byte_length.into());
        let hash = self.digest(secret, &salt);

        let mut token = Vec::with_capacity(MIN_TOKEN_LEN + salt.len());
        token.push(ALGORITHM_SHA1);
        token.push(salt_byte_length);
        token.extend_from_slice(&salt);
        token.extend_from_slice(&hash);

        token
    }

    /// Checks that `token` was created from `secret`. An empty `secret` never
    /// verifies.
    ///
    /// The algorithm id in byte 0 is not inspected; every token is checked with
    /// the single digest this codec was built with.
    pub fn verify_token(&self, token: &[u8], secret: &[u8]) -> bool {
        // Minted secrets are never empty, an empty one is a failed decode.
        if secret.is_empty() || token.len() < MIN_TOKEN_LEN {
            return false;
        }

        let salt_end = 2 + usize::from(token[1]);
        let Some(salt) = token.get(2..salt_end) else {
            return false;
        };
        let hash = &token[salt_end..];

        if hash.len() != DIGEST_LEN {
            return false;
        }

        self.digest(secret, salt)[..].ct_eq(hash).into()
    }
}

/// Standard, padded base64.
pub fn encode(input: &[u8]) -> String {
    BASE64_STANDARD.encode(input)
}

/// Inverse of [`encode`]. Malformed input decodes to an empty vector.
pub fn decode(input: &str) -> Vec<u8> {
    BASE64_STANDARD.decode(input).unwrap_or_default()
}
