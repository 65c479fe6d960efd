use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;

use gproxy_provider_core::{ProviderError, ProviderResult};

#[derive(Debug, Serialize)]
struct ServiceAccountClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    scope: &'a str,
}

/// Signs the `urn:ietf:params:oauth:grant-type:jwt-bearer` assertion
/// as an RS256 JWT with the standard `{iss, sub, aud, iat, exp, scope}`
/// claim set.
pub fn sign_service_account_assertion(
    client_email: &str,
    token_endpoint: &str,
    private_key_pem: &str,
    scope: &str,
    now: i64,
) -> ProviderResult<String> {
    let claims = ServiceAccountClaims {
        iss: client_email,
        sub: client_email,
        aud: token_endpoint,
        iat: now,
        exp: now + 3600,
        scope,
    };
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|err| ProviderError::InvalidConfig(format!("invalid PKCS8 key: {err}")))?;
    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|err| ProviderError::Upstream(format!("jwt signing failed: {err}")))
}

/// Decodes (without verifying the signature) a single claim from a JWT's
/// payload segment. Used only to read `email`/`sub` out of a token we
/// just received from the provider over TLS, never for authorization
/// decisions.
pub fn decode_unverified_claim(token: &str, claim: &str) -> Option<String> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(payload_b64))
        .ok()?;
    let value: serde_json::Value = serde_json::from_slice(&payload).ok()?;
    value.get(claim)?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_email_claim_from_unsigned_segment() {
        let payload = serde_json::json!({"email": "user@example.com", "sub": "user@example.com"});
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let token = format!("header.{payload_b64}.signature");
        assert_eq!(
            decode_unverified_claim(&token, "email").as_deref(),
            Some("user@example.com")
        );
    }

    #[test]
    fn missing_claim_returns_none() {
        let payload = serde_json::json!({"sub": "user@example.com"});
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let token = format!("header.{payload_b64}.signature");
        assert_eq!(decode_unverified_claim(&token, "email"), None);
    }
}
