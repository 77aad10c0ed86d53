//! HMAC-SHA256 webhook signing (C9): `hmac` + `sha2` for request
//! authentication.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the `X-WSS-Signature` header value for `body` under `secret`.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a `sha256=<hex>` header value against `body` and `secret`.
/// `hmac::Mac::verify_slice` runs in constant time.
pub fn verify(body: &[u8], secret: &str, header_value: &str) -> bool {
    let Some(hex_digest) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected_bytes) = hex::decode(hex_digest) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let body = br#"{"tick":1}"#;
        let secret = "super-secret-webhook-key";
        let signature = sign(body, secret);
        assert!(verify(body, secret, &signature));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let secret = "super-secret-webhook-key";
        let signature = sign(b"original", secret);
        assert!(!verify(b"tampered", secret, &signature));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let body = b"payload";
        let signature = sign(body, "secret-a");
        assert!(!verify(body, "secret-b", &signature));
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(!verify(b"payload", "secret", "not-a-valid-header"));
    }
}
