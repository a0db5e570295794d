// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use sha2::{Digest, Sha256};

/// Length of an anonymized phone number, in hex characters.
pub const ANONYMIZED_LEN: usize = 16;

/// One-way anonymization of a phone number: the first 16 hex characters of its SHA-256.
///
/// Deterministic, so a hashed stored recipient still matches the same
/// number reported again by a device.
pub fn anonymize_phone(phone: &str) -> String {
    let digest = Sha256::digest(phone.as_bytes());
    let mut hexed = hex::encode(digest);
    hexed.truncate(ANONYMIZED_LEN);
    hexed
}

/// Hex-encoded SHA-256 of arbitrary text. Used as a cache key for secrets.
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymized_phone_is_truncated_sha256() {
        let hashed = anonymize_phone("+79990001122");
        assert_eq!(hashed.len(), ANONYMIZED_LEN);
        assert!(sha256_hex("+79990001122").starts_with(&hashed));
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn anonymization_is_deterministic() {
        assert_eq!(anonymize_phone("+15551234567"), anonymize_phone("+15551234567"));
        assert_ne!(anonymize_phone("+15551234567"), anonymize_phone("+15551234568"));
    }

    proptest::proptest! {
        #[test]
        fn anonymized_form_never_leaks_the_number(phone in r"\+[1-9][0-9]{9,13}") {
            let hashed = anonymize_phone(&phone);
            proptest::prop_assert_eq!(hashed.len(), ANONYMIZED_LEN);
            proptest::prop_assert!(!hashed.contains(&phone[1..]));
            proptest::prop_assert_eq!(anonymize_phone(&phone), hashed);
        }
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
