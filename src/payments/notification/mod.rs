//! Inbound notifications and the acknowledgements sent back
//!
//! The gateway POSTs a form-encoded notification once a transaction or token
//! registration completes. The body is bound with the same status gating the
//! gateway documents, checked against the field rules, and answered with a
//! CRLF `Key=Value` acknowledgement.
//!
//! Binding a notification does NOT prove it came from the gateway. Callers
//! must check [`crate::payments::signature::is_authentic`] before trusting
//! any field.

pub mod acknowledgement;
pub mod token;
pub mod transaction;

use serde::Serialize;

use crate::error::GatewayResult;
use crate::payments::codec::{self, FieldSet};
use crate::payments::validation::{patterns, Rules, Validate};

pub use acknowledgement::{AckStatus, NotificationOutcome, NotificationResponse};
pub use token::TokenNotification;
pub use transaction::TransactionNotification;

/// The two notification flows, each with its own URL, fields and signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFamily {
    Transaction,
    Token,
}

impl NotificationFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationFamily::Transaction => "transaction",
            NotificationFamily::Token => "token",
        }
    }
}

const CARD_TYPES: [&str; 10] = [
    "VISA", "MC", "DELTA", "MAESTRO", "UKE", "AMEX", "DC", "JCB", "LASER", "PAYPAL",
];

/// Fields every notification carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationHeader {
    pub vps_protocol: String,
    pub tx_type: String,
    pub vendor_tx_code: String,
    pub vps_tx_id: String,
    /// Kept verbatim; it feeds the signature.
    pub status: String,
    pub status_detail: Option<String>,
    pub card_type: Option<String>,
    pub last4_digits: Option<String>,
    #[serde(skip)]
    pub vps_signature: String,
}

impl NotificationHeader {
    pub fn bind(fields: &FieldSet) -> GatewayResult<Self> {
        Ok(Self {
            vps_protocol: fields.require("VPSProtocol")?.to_string(),
            tx_type: fields.require("TxType")?.to_string(),
            vendor_tx_code: fields.require("VendorTxCode")?.to_string(),
            vps_tx_id: fields.require("VPSTxId")?.to_string(),
            status: fields.require("Status")?.to_string(),
            status_detail: fields.get_owned("StatusDetail"),
            card_type: fields.get_owned("CardType"),
            last4_digits: fields.get_owned("Last4Digits"),
            vps_signature: fields.require("VPSSignature")?.to_string(),
        })
    }

    fn write(&self, fields: &mut FieldSet) {
        fields.insert("VPSProtocol", self.vps_protocol.as_str());
        fields.insert("TxType", self.tx_type.as_str());
        fields.insert("VendorTxCode", self.vendor_tx_code.as_str());
        fields.insert("VPSTxId", self.vps_tx_id.as_str());
        fields.insert("Status", self.status.as_str());
        fields.insert_opt("StatusDetail", self.status_detail.as_deref());
        fields.insert_opt("CardType", self.card_type.as_deref());
        fields.insert_opt("Last4Digits", self.last4_digits.as_deref());
    }

    fn check(&self, rules: &mut Rules, tx_types: &[&str], statuses: &[&str]) {
        rules
            .field("VPSProtocol", Some(self.vps_protocol.as_str()))
            .required()
            .matches(&patterns::PROTOCOL);
        rules.field("TxType", Some(self.tx_type.as_str())).required().one_of(tx_types);
        rules
            .field("VendorTxCode", Some(self.vendor_tx_code.as_str()))
            .required()
            .max_len(40)
            .matches(&patterns::VENDOR_TX_CODE);
        rules.field("VPSTxId", Some(self.vps_tx_id.as_str())).required().max_len(38);
        rules.field("Status", Some(self.status.as_str())).required().one_of(statuses);
        rules
            .field("StatusDetail", self.status_detail.as_deref())
            .max_len(255);
        rules
            .field("CardType", self.card_type.as_deref())
            .one_of(&CARD_TYPES);
        rules
            .field("Last4Digits", self.last4_digits.as_deref())
            .matches(&patterns::FOUR_DIGITS);
        rules
            .field("VPSSignature", Some(self.vps_signature.as_str()))
            .required()
            .max_len(100);
    }
}

/// Common contract of both notification families.
pub trait Notification: Validate + Sized + Send {
    const FAMILY: NotificationFamily;

    fn from_fields(fields: &FieldSet) -> GatewayResult<Self>;

    fn header(&self) -> &NotificationHeader;

    /// Ordered concatenation the gateway signs, with blanks for absent fields.
    fn signature_payload(&self, vendor: &str, security_key: &str) -> String;

    /// Outcome implied by the reported status.
    fn outcome(&self) -> NotificationOutcome;

    /// Bound fields, without the signature.
    fn to_field_set(&self) -> FieldSet;

    /// Decodes a form-encoded POST body and binds it.
    fn parse(body: &str) -> GatewayResult<Self> {
        Self::from_fields(&codec::decode_form(body)?)
    }

    fn to_json(&self) -> String {
        self.to_field_set().to_json()
    }
}
