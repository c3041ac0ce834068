use serde::Serialize;

use super::{Notification, NotificationFamily, NotificationHeader, NotificationOutcome};
use crate::error::GatewayResult;
use crate::payments::codec::FieldSet;
use crate::payments::validation::{patterns, Rules, Validate, ValidationErrors};

/// Outcome of a card token registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenNotification {
    #[serde(flatten)]
    pub header: NotificationHeader,
    pub token: Option<String>,
    /// `MMYY`
    pub expiry_date: Option<String>,
}

impl TokenNotification {
    /// Expiry as `(month, two-digit year)`.
    pub fn expiry(&self) -> Option<(u8, u8)> {
        let raw = self.expiry_date.as_deref()?;
        if !patterns::FOUR_DIGITS.is_match(raw) {
            return None;
        }
        let month: u8 = raw.get(..2)?.parse().ok()?;
        let year: u8 = raw.get(2..)?.parse().ok()?;
        (1..=12).contains(&month).then_some((month, year))
    }
}

impl Notification for TokenNotification {
    const FAMILY: NotificationFamily = NotificationFamily::Token;

    fn from_fields(fields: &FieldSet) -> GatewayResult<Self> {
        Ok(Self {
            header: NotificationHeader::bind(fields)?,
            token: fields.get_owned("Token"),
            expiry_date: fields.get_owned("ExpiryDate"),
        })
    }

    fn header(&self) -> &NotificationHeader {
        &self.header
    }

    fn signature_payload(&self, vendor: &str, security_key: &str) -> String {
        [
            self.header.vps_tx_id.as_str(),
            self.header.vendor_tx_code.as_str(),
            self.header.status.as_str(),
            vendor,
            self.token.as_deref().unwrap_or_default(),
            security_key,
        ]
        .concat()
    }

    fn outcome(&self) -> NotificationOutcome {
        match self.header.status.as_str() {
            "OK" => NotificationOutcome::Ok,
            "ERROR" => NotificationOutcome::Error,
            _ => NotificationOutcome::Invalid,
        }
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(&mut fields);
        fields.insert_opt("Token", self.token.as_deref());
        fields.insert_opt("ExpiryDate", self.expiry_date.as_deref());
        fields
    }
}

impl Validate for TokenNotification {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules, &["TOKEN"], &["OK", "ERROR"]);

        let ok = self.header.status == "OK";
        let token = rules.field("Token", self.token.as_deref()).len_between(38, 38);
        if ok {
            token.required();
        }
        rules.ensure(
            self.expiry_date.is_none() || self.expiry().is_some(),
            "ExpiryDate",
            "must be a valid MMYY date",
        );
        rules.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    const OK_BODY: &str = "VPSProtocol=2.23&TxType=TOKEN&VendorTxCode=card-1&VPSTxId=%7BTOK-1%7D&Status=OK&CardType=MC&Last4Digits=4444&Token=%7B7D7BD5E5-D1E1-4C5C-A1F6-5B4E2C4D0A11%7D&ExpiryDate=0927&VPSSignature=ABCDEF";

    #[test]
    fn test_token_notification_binds() {
        let notification = TokenNotification::parse(OK_BODY).unwrap();
        assert_eq!(
            notification.token.as_deref(),
            Some("{7D7BD5E5-D1E1-4C5C-A1F6-5B4E2C4D0A11}")
        );
        assert_eq!(notification.expiry(), Some((9, 27)));
        assert_eq!(notification.outcome(), NotificationOutcome::Ok);
        assert!(notification.validate().is_ok());
    }

    #[test]
    fn test_ok_token_notification_needs_a_token() {
        let body = OK_BODY.replace("Token=%7B7D7BD5E5-D1E1-4C5C-A1F6-5B4E2C4D0A11%7D&", "");
        let notification = TokenNotification::parse(&body).unwrap();
        assert!(notification.validate().unwrap_err().contains("Token"));

        let failed = body.replace("&Status=OK&", "&Status=ERROR&");
        let notification = TokenNotification::parse(&failed).unwrap();
        assert!(notification.validate().is_ok());
        assert_eq!(notification.outcome(), NotificationOutcome::Error);
    }

    #[test]
    fn test_bad_expiry_and_status() {
        let body = OK_BODY
            .replace("ExpiryDate=0927", "ExpiryDate=1327")
            .replace("&Status=OK&", "&Status=ABORT&");
        let notification = TokenNotification::parse(&body).unwrap();

        let errors = notification.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["Status", "ExpiryDate"]);
        assert_eq!(notification.outcome(), NotificationOutcome::Invalid);
    }

    #[test]
    fn test_non_ascii_digits_are_rejected() {
        let body = OK_BODY.replace("ExpiryDate=0927", "ExpiryDate=0%D9%A927");
        let notification = TokenNotification::parse(&body).unwrap();
        assert_eq!(notification.expiry(), None);
        assert!(notification.validate().unwrap_err().contains("ExpiryDate"));

        let body = OK_BODY.replace("Last4Digits=4444", "Last4Digits=%D9%A0%D9%A1%D9%A2%D9%A3");
        let notification = TokenNotification::parse(&body).unwrap();
        assert!(notification.validate().unwrap_err().contains("Last4Digits"));
    }

    #[test]
    fn test_missing_status_fails_binding() {
        let body = OK_BODY.replace("&Status=OK", "");
        assert!(matches!(
            TokenNotification::parse(&body),
            Err(GatewayError::Decode { .. })
        ));
    }
}
