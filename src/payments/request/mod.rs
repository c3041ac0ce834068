//! Outbound request variants
//!
//! Every request kind is its own type with a fixed `TxType`; shared shapes
//! (transaction registration, repeat, maintenance) are generic over a marker
//! from [`kind`] so the discriminator is a compile-time constant.

pub mod additional;
pub mod basket;
pub mod token;
pub mod transaction;

use uuid::Uuid;

use crate::payments::codec::FieldSet;
use crate::payments::response::GatewayResponse;
use crate::payments::types::{TransactionReference, TxType};
use crate::payments::validation::{patterns, Rules, Validate};

pub use additional::{
    AbortRequest, AuthoriseRequest, CancelRequest, MaintenanceRequest, RefundRequest,
    ReleaseRequest, RepeatDeferredRequest, RepeatRegistration, RepeatRequest, VoidRequest,
};
pub use basket::pack_basket;
pub use token::{TokenRegistrationRequest, TokenRemovalRequest};
pub use transaction::{
    AccountType, AuthenticateRequest, DeferredRequest, PaymentRequest, Profile,
    TransactionRegistration,
};

/// Compile-time transaction type attached to a request shape.
pub trait RequestKind: Send + Sync + 'static {
    const TX_TYPE: TxType;
}

pub mod kind {
    use super::RequestKind;
    use crate::payments::types::TxType;

    macro_rules! request_kinds {
        ($($name:ident => $tx_type:expr),* $(,)?) => {
            $(
                #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
                pub struct $name;

                impl RequestKind for $name {
                    const TX_TYPE: TxType = $tx_type;
                }
            )*
        };
    }

    request_kinds! {
        Payment => TxType::Payment,
        Deferred => TxType::Deferred,
        Authenticate => TxType::Authenticate,
        Repeat => TxType::Repeat,
        RepeatDeferred => TxType::RepeatDeferred,
        Abort => TxType::Abort,
        Void => TxType::Void,
        Cancel => TxType::Cancel,
    }
}

/// Which notification URL, if any, the manager stamps onto a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTarget {
    Transaction,
    Token,
}

/// Common contract of every outbound request.
pub trait GatewayRequest: Validate + Send + Sync {
    type Response: GatewayResponse;

    fn tx_type(&self) -> TxType;

    fn header(&self) -> &RequestHeader;

    fn header_mut(&mut self) -> &mut RequestHeader;

    /// Wire names that must be present for the request to be complete.
    fn required_fields(&self) -> Vec<&'static str>;

    /// Wire field set; absent optional fields are left out.
    fn to_field_set(&self) -> FieldSet;

    fn is_complete(&self) -> bool {
        missing_fields(self).is_empty()
    }

    fn notification_target(&self) -> Option<NotificationTarget> {
        None
    }

    fn set_notification_url(&mut self, _url: String) {}

    /// Copies gateway-assigned fields from a successful response onto `target`.
    fn record(&self, _response: &Self::Response, _target: &mut dyn TransactionReference) {}
}

pub fn missing_fields<R: GatewayRequest + ?Sized>(request: &R) -> Vec<&'static str> {
    let fields = request.to_field_set();
    request
        .required_fields()
        .into_iter()
        .filter(|key| !fields.contains_key(key))
        .collect()
}

/// Reports every missing required field as a rule violation.
pub(crate) fn check_complete<R: GatewayRequest + ?Sized>(request: &R, rules: &mut Rules) {
    for field in missing_fields(request) {
        rules.ensure(false, field, "is required");
    }
}

/// Fields shared by every request: protocol, vendor and vendor tx code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub vps_protocol: Option<String>,
    pub vendor: Option<String>,
    pub vendor_tx_code: Option<String>,
}

impl RequestHeader {
    /// Header with a freshly generated vendor tx code.
    pub fn new() -> Self {
        Self::with_vendor_tx_code(generate_vendor_tx_code())
    }

    pub fn with_vendor_tx_code(vendor_tx_code: impl Into<String>) -> Self {
        Self {
            vps_protocol: None,
            vendor: None,
            vendor_tx_code: Some(vendor_tx_code.into()),
        }
    }

    pub fn without_vendor_tx_code() -> Self {
        Self {
            vps_protocol: None,
            vendor: None,
            vendor_tx_code: None,
        }
    }

    pub fn stamp(&mut self, vps_protocol: &str, vendor: &str) {
        self.vps_protocol = Some(vps_protocol.to_string());
        self.vendor = Some(vendor.to_string());
    }

    pub(crate) fn write(&self, tx_type: TxType, fields: &mut FieldSet) {
        fields.insert_opt("VPSProtocol", self.vps_protocol.as_deref());
        fields.insert("TxType", tx_type.as_str());
        fields.insert_opt("Vendor", self.vendor.as_deref());
        fields.insert_opt("VendorTxCode", self.vendor_tx_code.as_deref());
    }

    pub(crate) fn check(&self, rules: &mut Rules) {
        rules
            .field("VPSProtocol", self.vps_protocol.as_deref())
            .len_between(4, 4)
            .matches(&patterns::PROTOCOL);
        rules
            .field("Vendor", self.vendor.as_deref())
            .max_len(15)
            .matches(&patterns::VENDOR);
        rules
            .field("VendorTxCode", self.vendor_tx_code.as_deref())
            .max_len(40)
            .matches(&patterns::VENDOR_TX_CODE);
    }
}

impl Default for RequestHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// 32 hex characters, unique per request.
pub fn generate_vendor_tx_code() -> String {
    Uuid::new_v4().simple().to_string()
}
