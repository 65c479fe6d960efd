use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct PkceCodes {
    pub code_verifier: String,
    pub code_challenge: String,
}

/// 32-byte random state, base64url-encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 64-byte verifier and its S256 challenge.
pub fn generate_pkce() -> PkceCodes {
    let mut bytes = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut bytes);
    let code_verifier = URL_SAFE_NO_PAD.encode(bytes);
    let digest = Sha256::digest(code_verifier.as_bytes());
    let code_challenge = URL_SAFE_NO_PAD.encode(digest);
    PkceCodes {
        code_verifier,
        code_challenge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_32_raw_bytes_encoded() {
        let state = generate_state();
        assert_eq!(URL_SAFE_NO_PAD.decode(&state).unwrap().len(), 32);
    }

    #[test]
    fn pkce_challenge_matches_verifier_digest() {
        let codes = generate_pkce();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(codes.code_verifier.as_bytes()));
        assert_eq!(codes.code_challenge, expected);
    }
}
