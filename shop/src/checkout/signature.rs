//! Gateway payment signatures.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with HMAC-SHA256 using the
//! merchant secret and sends the lowercase hex digest back with the payment.

use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected signature for a gateway order/payment pair.
///
/// Returns `None` only if the HMAC cannot be keyed, which HMAC-SHA256 never
/// refuses.
#[must_use]
pub fn sign(secret: &[u8], gateway_order_id: &str, gateway_payment_id: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Compare a supplied signature against the expected one, byte for byte and
/// in constant time.
#[must_use]
pub fn verify(secret: &[u8], gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
    sign(secret, gateway_order_id, gateway_payment_id)
        .is_some_and(|expected| constant_time_eq(expected.as_bytes(), signature.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_lowercase_hex() {
        let signature = sign(b"secret", "order_1", "pay_1");
        assert_eq!(signature.as_deref().map(str::len), Some(64));
        assert!(signature
            .as_deref()
            .is_some_and(|s| s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))));
        assert!(verify(b"secret", "order_1", "pay_1", signature.as_deref().unwrap_or_default()));
    }

    #[test]
    fn any_change_fails_verification() {
        let signature = sign(b"secret", "order_1", "pay_1").unwrap_or_default();
        assert!(!verify(b"other", "order_1", "pay_1", &signature));
        assert!(!verify(b"secret", "order_2", "pay_1", &signature));
        assert!(!verify(b"secret", "order_1", "pay_2", &signature));
        assert!(!verify(b"secret", "order_1", "pay_1", &signature.to_uppercase()));
        assert!(!verify(b"secret", "order_1", "pay_1", ""));
    }

    #[test]
    fn separator_is_part_of_the_message() {
        let joined = sign(b"k", "ab", "c");
        let shifted = sign(b"k", "a", "bc");
        assert_ne!(joined, shifted);
    }
}
