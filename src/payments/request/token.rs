//! Card token registration and removal.

use super::transaction::Profile;
use super::{check_complete, GatewayRequest, NotificationTarget, RequestHeader};
use crate::payments::codec::FieldSet;
use crate::payments::response::{TokenRegistrationResponse, TokenRemovalResponse};
use crate::payments::types::{TransactionReference, TxType};
use crate::payments::validation::{Rules, Validate, ValidationErrors};

/// Registers a card for later use without taking a payment.
#[derive(Debug, Clone)]
pub struct TokenRegistrationRequest {
    pub header: RequestHeader,
    pub currency: Option<String>,
    pub notification_url: Option<String>,
    pub profile: Option<Profile>,
}

impl TokenRegistrationRequest {
    pub const TX_TYPE: TxType = TxType::Token;

    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            header: RequestHeader::new(),
            currency: Some(currency.into()),
            notification_url: None,
            profile: None,
        }
    }
}

impl GatewayRequest for TokenRegistrationRequest {
    type Response = TokenRegistrationResponse;

    fn tx_type(&self) -> TxType {
        Self::TX_TYPE
    }

    fn header(&self) -> &RequestHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    fn required_fields(&self) -> Vec<&'static str> {
        vec![
            "VPSProtocol",
            "TxType",
            "Vendor",
            "VendorTxCode",
            "Currency",
            "NotificationURL",
        ]
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(Self::TX_TYPE, &mut fields);
        fields.insert_opt("Currency", self.currency.as_deref());
        fields.insert_opt("NotificationURL", self.notification_url.as_deref());
        fields.insert_opt("Profile", self.profile.map(|p| p.as_str()));
        fields
    }

    fn notification_target(&self) -> Option<NotificationTarget> {
        Some(NotificationTarget::Token)
    }

    fn set_notification_url(&mut self, url: String) {
        self.notification_url = Some(url);
    }

    fn record(&self, response: &Self::Response, target: &mut dyn TransactionReference) {
        if let Some(code) = &self.header.vendor_tx_code {
            target.set_vendor_tx_code(code.clone());
        }
        if let Some(vps_tx_id) = &response.vps_tx_id {
            target.set_vps_tx_id(vps_tx_id.clone());
        }
        if let Some(security_key) = &response.security_key {
            target.set_security_key(security_key.clone());
        }
        target.set_tx_type(Self::TX_TYPE);
    }
}

impl Validate for TokenRegistrationRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules);
        rules.field("Currency", self.currency.as_deref()).required().currency();
        rules
            .field("NotificationURL", self.notification_url.as_deref())
            .required()
            .max_len(255)
            .url();
        check_complete(self, &mut rules);
        rules.finish()
    }
}

/// Deletes a stored card token. Carries no vendor tx code.
#[derive(Debug, Clone)]
pub struct TokenRemovalRequest {
    pub header: RequestHeader,
    pub token: Option<String>,
}

impl TokenRemovalRequest {
    pub const TX_TYPE: TxType = TxType::RemoveToken;

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            header: RequestHeader::without_vendor_tx_code(),
            token: Some(token.into()),
        }
    }

    pub fn empty() -> Self {
        Self {
            header: RequestHeader::without_vendor_tx_code(),
            token: None,
        }
    }
}

impl GatewayRequest for TokenRemovalRequest {
    type Response = TokenRemovalResponse;

    fn tx_type(&self) -> TxType {
        Self::TX_TYPE
    }

    fn header(&self) -> &RequestHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    fn required_fields(&self) -> Vec<&'static str> {
        vec!["VPSProtocol", "TxType", "Vendor", "Token"]
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(Self::TX_TYPE, &mut fields);
        fields.insert_opt("Token", self.token.as_deref());
        fields
    }
}

impl Validate for TokenRemovalRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules);
        rules
            .field("Token", self.token.as_deref())
            .required()
            .len_between(38, 38);
        check_complete(self, &mut rules);
        rules.finish()
    }
}
