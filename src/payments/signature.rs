//! Notification signature verification
//!
//! The gateway signs each notification with an uppercase hex MD5 digest of
//! a family-specific field concatenation that includes the vendor name and
//! the transaction's SecurityKey. MD5 is fixed by the protocol.

use crate::payments::notification::Notification;

/// Expected `VPSSignature` for `notification`.
pub fn computed_signature<N: Notification>(notification: &N, vendor: &str, security_key: &str) -> String {
    let digest = md5::compute(notification.signature_payload(vendor, security_key));
    hex::encode_upper(digest.0)
}

/// Whether the supplied signature matches the one computed locally.
///
/// A `false` result means the notification must not be trusted.
pub fn is_authentic<N: Notification>(notification: &N, vendor: &str, security_key: &str) -> bool {
    let computed = computed_signature(notification, vendor, security_key);
    constant_time_eq(&computed, notification.header().vps_signature.trim())
}

fn constant_time_eq(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }

    expected
        .as_bytes()
        .iter()
        .zip(provided.as_bytes().iter())
        .fold(0, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::notification::{TokenNotification, TransactionNotification};

    const VENDOR: &str = "acme";
    const SECURITY_KEY: &str = "XYZ1234567";

    const TRANSACTION_BODY: &str = "VPSProtocol=2.23&TxType=PAYMENT&VendorTxCode=order-1&VPSTxId=%7BABC-123%7D&Status=OK&TxAuthNo=4242&AVSCV2=ALL+MATCH&AddressResult=MATCHED&PostCodeResult=MATCHED&CV2Result=MATCHED&GiftAid=0&3DSecureStatus=OK&CAVV=AAABARR5kwAAAAAAAAAAAAAAAAA&CardType=VISA&Last4Digits=0006";
    const TRANSACTION_SIGNATURE: &str = "1013C0804185AFBBB983C44942893F48";

    const TOKEN_BODY: &str = "VPSProtocol=2.23&TxType=TOKEN&VendorTxCode=card-1&VPSTxId=%7BTOK-1%7D&Status=OK&CardType=MC&Last4Digits=4444&Token=%7B7D7BD5E5-D1E1-4C5C-A1F6-5B4E2C4D0A11%7D&ExpiryDate=0927";
    const TOKEN_SIGNATURE: &str = "9AEB6FD216633892F8AFF979A2128577";

    fn signed(body: &str, signature: &str) -> String {
        format!("{}&VPSSignature={}", body, signature)
    }

    #[test]
    fn test_transaction_golden_vector() {
        let notification =
            TransactionNotification::parse(&signed(TRANSACTION_BODY, TRANSACTION_SIGNATURE)).unwrap();
        assert_eq!(
            computed_signature(&notification, VENDOR, SECURITY_KEY),
            TRANSACTION_SIGNATURE
        );
        assert!(is_authentic(&notification, VENDOR, SECURITY_KEY));
    }

    #[test]
    fn test_token_golden_vector() {
        let notification = TokenNotification::parse(&signed(TOKEN_BODY, TOKEN_SIGNATURE)).unwrap();
        assert_eq!(computed_signature(&notification, VENDOR, SECURITY_KEY), TOKEN_SIGNATURE);
        assert!(is_authentic(&notification, VENDOR, SECURITY_KEY));
    }

    #[test]
    fn test_absent_fields_are_blank_in_position() {
        let body = TRANSACTION_BODY
            .replace("&Status=OK&", "&Status=AUTHENTICATED&")
            .replace("TxAuthNo=4242&", "")
            .replace("3DSecureStatus=OK", "3DSecureStatus=NOTCHECKED");
        let notification = TransactionNotification::parse(&signed(&body, "X")).unwrap();

        assert_eq!(
            notification.signature_payload(VENDOR, SECURITY_KEY),
            "{ABC-123}order-1AUTHENTICATEDacmeXYZ12345670NOTCHECKEDVISA0006"
        );
        assert_eq!(
            computed_signature(&notification, VENDOR, SECURITY_KEY),
            "0DFB7D005A1109A6C60EB4D68E6C4E16"
        );
    }

    #[test]
    fn test_any_field_change_breaks_authenticity() {
        let tampered = TRANSACTION_BODY.replace("Last4Digits=0006", "Last4Digits=0007");
        let notification =
            TransactionNotification::parse(&signed(&tampered, TRANSACTION_SIGNATURE)).unwrap();
        assert!(!is_authentic(&notification, VENDOR, SECURITY_KEY));

        let notification =
            TransactionNotification::parse(&signed(TRANSACTION_BODY, TRANSACTION_SIGNATURE)).unwrap();
        assert!(!is_authentic(&notification, "other", SECURITY_KEY));
        assert!(!is_authentic(&notification, VENDOR, "WRONGKEY00"));
    }

    #[test]
    fn test_signature_comparison_is_exact() {
        let lowercase = TRANSACTION_SIGNATURE.to_lowercase();
        let notification = TransactionNotification::parse(&signed(TRANSACTION_BODY, &lowercase)).unwrap();
        assert!(!is_authentic(&notification, VENDOR, SECURITY_KEY));

        assert!(constant_time_eq("ABC", "ABC"));
        assert!(!constant_time_eq("ABC", "ABD"));
        assert!(!constant_time_eq("ABC", "ABCD"));
    }
}
