//! PKCE (RFC 7636) verifier/challenge pairs and OAuth `state` values.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes behind a verifier; 32 bytes encode to 43 characters
const VERIFIER_BYTES: usize = 32;

const STATE_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        Self::from_verifier(random_token(VERIFIER_BYTES))
    }

    /// S256 challenge for a known verifier
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

pub fn random_state() -> String {
    random_token(STATE_BYTES)
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
