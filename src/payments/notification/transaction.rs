use serde::Serialize;

use super::{Notification, NotificationFamily, NotificationHeader, NotificationOutcome};
use crate::error::{GatewayError, GatewayResult};
use crate::payments::codec::FieldSet;
use crate::payments::validation::{Rules, Validate, ValidationErrors};

const TX_TYPES: [&str; 3] = ["PAYMENT", "DEFERRED", "AUTHENTICATE"];
const STATUSES: [&str; 7] = [
    "OK",
    "NOTAUTHED",
    "ABORT",
    "REJECTED",
    "AUTHENTICATED",
    "REGISTERED",
    "ERROR",
];
const AVS_CV2: [&str; 5] = [
    "ALL MATCH",
    "SECURITY CODE MATCH ONLY",
    "ADDRESS MATCH ONLY",
    "NO DATA MATCHES",
    "DATA NOT CHECKED",
];
const CHECK_RESULTS: [&str; 4] = ["NOTPROVIDED", "NOTCHECKED", "MATCHED", "NOTMATCHED"];
const CV2_RESULTS: [&str; 6] = [
    "NOTPROVIDED",
    "NOTCHECKED",
    "MATCHED",
    "NOTMATCHED",
    "NOT PROVIDED",
    "NOT CHECKED",
];
const THREE_D_SECURE: [&str; 6] = [
    "OK",
    "NOTCHECKED",
    "NOTAVAILABLE",
    "NOTAUTHED",
    "INCOMPLETE",
    "ERROR",
];

/// Outcome of a PAYMENT, DEFERRED or AUTHENTICATE registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionNotification {
    #[serde(flatten)]
    pub header: NotificationHeader,
    /// Only when the status is `OK`.
    pub tx_auth_no: Option<u64>,
    /// AVS/CV2 group, never bound for AUTHENTICATED or REGISTERED.
    pub avs_cv2: Option<String>,
    pub address_result: Option<String>,
    pub post_code_result: Option<String>,
    pub cv2_result: Option<String>,
    pub gift_aid: Option<String>,
    pub three_d_secure_status: Option<String>,
    /// Only when the 3-D Secure status is `OK`.
    pub cavv: Option<String>,
    /// PayPal only.
    pub address_status: Option<String>,
    /// PayPal only.
    pub payer_status: Option<String>,
}

impl TransactionNotification {
    fn checks_avs(status: &str) -> bool {
        status != "AUTHENTICATED" && status != "REGISTERED"
    }
}

impl Notification for TransactionNotification {
    const FAMILY: NotificationFamily = NotificationFamily::Transaction;

    fn from_fields(fields: &FieldSet) -> GatewayResult<Self> {
        let header = NotificationHeader::bind(fields)?;

        let tx_auth_no = if header.status == "OK" {
            let raw = fields.require("TxAuthNo")?;
            Some(raw.parse::<u64>().map_err(|_| GatewayError::decode("TxAuthNo"))?)
        } else {
            None
        };

        let avs = |key: &str| {
            if Self::checks_avs(&header.status) {
                fields.get_owned(key)
            } else {
                None
            }
        };
        let avs_cv2 = avs("AVSCV2");
        let address_result = avs("AddressResult");
        let post_code_result = avs("PostCodeResult");
        let cv2_result = avs("CV2Result");

        let three_d_secure_status = fields.get_owned("3DSecureStatus");
        let cavv = if three_d_secure_status.as_deref() == Some("OK") {
            fields.get_owned("CAVV")
        } else {
            None
        };

        Ok(Self {
            tx_auth_no,
            avs_cv2,
            address_result,
            post_code_result,
            cv2_result,
            gift_aid: fields.get_owned("GiftAid"),
            three_d_secure_status,
            cavv,
            address_status: fields.get_owned("AddressStatus"),
            payer_status: fields.get_owned("PayerStatus"),
            header,
        })
    }

    fn header(&self) -> &NotificationHeader {
        &self.header
    }

    fn signature_payload(&self, vendor: &str, security_key: &str) -> String {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();

        [
            self.header.vps_tx_id.clone(),
            self.header.vendor_tx_code.clone(),
            self.header.status.clone(),
            self.tx_auth_no.map(|n| n.to_string()).unwrap_or_default(),
            vendor.to_string(),
            opt(&self.avs_cv2),
            security_key.to_string(),
            opt(&self.address_result),
            opt(&self.post_code_result),
            opt(&self.cv2_result),
            opt(&self.gift_aid),
            opt(&self.three_d_secure_status),
            opt(&self.cavv),
            opt(&self.address_status),
            opt(&self.payer_status),
            opt(&self.header.card_type),
            opt(&self.header.last4_digits),
        ]
        .concat()
    }

    fn outcome(&self) -> NotificationOutcome {
        match self.header.status.as_str() {
            "OK" => NotificationOutcome::Ok,
            "NOTAUTHED" => NotificationOutcome::NotAuthed,
            "ABORT" => NotificationOutcome::Abort,
            "REJECTED" => NotificationOutcome::Rejected,
            "AUTHENTICATED" => NotificationOutcome::Authenticated,
            "REGISTERED" => NotificationOutcome::Registered,
            "ERROR" => NotificationOutcome::Error,
            _ => NotificationOutcome::Invalid,
        }
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(&mut fields);
        fields.insert_opt("TxAuthNo", self.tx_auth_no.map(|n| n.to_string()));
        fields.insert_opt("AVSCV2", self.avs_cv2.as_deref());
        fields.insert_opt("AddressResult", self.address_result.as_deref());
        fields.insert_opt("PostCodeResult", self.post_code_result.as_deref());
        fields.insert_opt("CV2Result", self.cv2_result.as_deref());
        fields.insert_opt("GiftAid", self.gift_aid.as_deref());
        fields.insert_opt("3DSecureStatus", self.three_d_secure_status.as_deref());
        fields.insert_opt("CAVV", self.cavv.as_deref());
        fields.insert_opt("AddressStatus", self.address_status.as_deref());
        fields.insert_opt("PayerStatus", self.payer_status.as_deref());
        fields
    }
}

impl Validate for TransactionNotification {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules, &TX_TYPES, &STATUSES);

        rules.ensure(
            self.header.status != "OK" || self.tx_auth_no.is_some(),
            "TxAuthNo",
            "must be present when Status is OK",
        );
        rules.field("AVSCV2", self.avs_cv2.as_deref()).max_len(50).one_of(&AVS_CV2);
        rules
            .field("AddressResult", self.address_result.as_deref())
            .one_of(&CHECK_RESULTS);
        rules
            .field("PostCodeResult", self.post_code_result.as_deref())
            .one_of(&CHECK_RESULTS);
        rules.field("CV2Result", self.cv2_result.as_deref()).one_of(&CV2_RESULTS);
        rules.field("GiftAid", self.gift_aid.as_deref()).one_of(&["0", "1"]);
        rules
            .field("3DSecureStatus", self.three_d_secure_status.as_deref())
            .one_of(&THREE_D_SECURE);
        rules.ensure(
            self.three_d_secure_status.as_deref() != Some("OK") || self.cavv.is_some(),
            "CAVV",
            "must be present when 3DSecureStatus is OK",
        );
        rules.field("CAVV", self.cavv.as_deref()).max_len(32);
        rules
            .field("AddressStatus", self.address_status.as_deref())
            .one_of(&["NONE", "CONFIRMED", "UNCONFIRMED"]);
        rules
            .field("PayerStatus", self.payer_status.as_deref())
            .one_of(&["VERIFIED", "UNVERIFIED"]);
        rules.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::codec::decode_form;

    const OK_BODY: &str = "VPSProtocol=2.23&TxType=PAYMENT&VendorTxCode=order-1&VPSTxId=%7BABC-123%7D&Status=OK&StatusDetail=0000+%3A+The+Authorisation+was+Successful.&TxAuthNo=4242&AVSCV2=ALL+MATCH&AddressResult=MATCHED&PostCodeResult=MATCHED&CV2Result=MATCHED&GiftAid=0&3DSecureStatus=OK&CAVV=AAABARR5kwAAAAAAAAAAAAAAAAA&CardType=VISA&Last4Digits=0006&VPSSignature=ABCDEF";

    #[test]
    fn test_ok_notification_binds_all_groups() {
        let notification = TransactionNotification::parse(OK_BODY).unwrap();

        assert_eq!(notification.header.vps_tx_id, "{ABC-123}");
        assert_eq!(
            notification.header.status_detail.as_deref(),
            Some("0000 : The Authorisation was Successful.")
        );
        assert_eq!(notification.tx_auth_no, Some(4242));
        assert_eq!(notification.avs_cv2.as_deref(), Some("ALL MATCH"));
        assert_eq!(notification.cavv.as_deref(), Some("AAABARR5kwAAAAAAAAAAAAAAAAA"));
        assert_eq!(notification.address_status, None);
        assert_eq!(notification.outcome(), NotificationOutcome::Ok);
        assert!(notification.validate().is_ok());
    }

    #[test]
    fn test_authenticated_hides_avs_group() {
        let body = OK_BODY
            .replace("&Status=OK&", "&Status=AUTHENTICATED&")
            .replace("TxAuthNo=4242&", "");
        let notification = TransactionNotification::parse(&body).unwrap();

        assert_eq!(notification.tx_auth_no, None);
        assert_eq!(notification.avs_cv2, None);
        assert_eq!(notification.cv2_result, None);
        assert!(!notification.to_field_set().contains_key("AVSCV2"));
        assert_eq!(notification.outcome(), NotificationOutcome::Authenticated);
    }

    #[test]
    fn test_auth_no_ignored_unless_ok() {
        let body = OK_BODY.replace("&Status=OK&", "&Status=NOTAUTHED&");
        let notification = TransactionNotification::parse(&body).unwrap();
        assert_eq!(notification.tx_auth_no, None);
        assert_eq!(notification.avs_cv2.as_deref(), Some("ALL MATCH"));
    }

    #[test]
    fn test_cavv_only_with_successful_3d_secure() {
        let body = OK_BODY.replace("3DSecureStatus=OK", "3DSecureStatus=NOTCHECKED");
        let notification = TransactionNotification::parse(&body).unwrap();
        assert_eq!(notification.cavv, None);
    }

    #[test]
    fn test_paypal_fields_bound_when_present() {
        let body = format!("{}&AddressStatus=CONFIRMED&PayerStatus=VERIFIED", OK_BODY);
        let notification = TransactionNotification::parse(&body).unwrap();
        assert_eq!(notification.address_status.as_deref(), Some("CONFIRMED"));
        assert_eq!(notification.payer_status.as_deref(), Some("VERIFIED"));
    }

    #[test]
    fn test_missing_required_key_is_a_decode_error() {
        let body = OK_BODY.replace("VPSSignature=ABCDEF", "");
        match TransactionNotification::parse(&body) {
            Err(GatewayError::Decode { field }) => assert_eq!(field, "VPSSignature"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_choices_are_reported() {
        let mut fields = decode_form(OK_BODY).unwrap();
        fields.insert("TxType", "REFUND");
        fields.insert("GiftAid", "2");
        fields.insert("CardType", "DISCOVER");
        let notification = TransactionNotification::from_fields(&fields).unwrap();

        let errors = notification.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["TxType", "CardType", "GiftAid"]);
    }

    #[test]
    fn test_signature_is_not_serialised() {
        let notification = TransactionNotification::parse(OK_BODY).unwrap();
        assert!(!notification.to_json().contains("ABCDEF"));
        assert!(!notification.to_field_set().contains_key("VPSSignature"));
    }
}
