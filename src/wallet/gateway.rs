//! Payment gateway signature verification (spec §4.1, §6, §9).
//!
//! `HMAC-SHA256(secret, "orderId|paymentId")` must equal the signature the
//! gateway attaches to a deposit confirmation callback. Comparison is
//! constant-time (spec §9: "never log the secret"; comparison must not
//! leak timing information either).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `signature` (lowercase-hex) against
/// `HMAC-SHA256(secret, "orderId|paymentId")`.
pub fn verify_gateway_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    let expected = mac.finalize().into_bytes();

    let Ok(given) = hex_decode(signature) else {
        return false;
    };
    if given.len() != expected.len() {
        return false;
    }
    given.ct_eq(&expected).into()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    #[test]
    fn accepts_matching_signature() {
        let sig = sign("s3cr3t", "order-1", "pay-1");
        assert!(verify_gateway_signature("s3cr3t", "order-1", "pay-1", &sig));
    }

    #[test]
    fn rejects_wrong_secret() {
        let sig = sign("s3cr3t", "order-1", "pay-1");
        assert!(!verify_gateway_signature("other", "order-1", "pay-1", &sig));
    }

    #[test]
    fn rejects_tampered_payload() {
        let sig = sign("s3cr3t", "order-1", "pay-1");
        assert!(!verify_gateway_signature("s3cr3t", "order-1", "pay-2", &sig));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(!verify_gateway_signature("s3cr3t", "order-1", "pay-1", "not-hex"));
    }
}
