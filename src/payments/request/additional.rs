//! Follow-up operations on an existing transaction.
//!
//! Release, abort, void and cancel act on the referenced transaction itself.
//! Refund, repeat and authorise create a new transaction related to it.

use rust_decimal::Decimal;
use std::fmt;
use std::marker::PhantomData;

use super::kind::{Abort, Cancel, Repeat, RepeatDeferred, Void};
use super::{check_complete, GatewayRequest, RequestHeader, RequestKind};
use crate::payments::codec::{format_amount, transliterate, FieldSet};
use crate::payments::response::{
    AuthoriseResponse, RefundResponse, ReleaseResponse, RepeatResponse, StatusResponse,
};
use crate::payments::types::{TransactionReference, TxType};
use crate::payments::validation::{patterns, Rules, Validate, ValidationErrors};

pub type AbortRequest = MaintenanceRequest<Abort>;
pub type VoidRequest = MaintenanceRequest<Void>;
pub type CancelRequest = MaintenanceRequest<Cancel>;
pub type RepeatRequest = RepeatRegistration<Repeat>;
pub type RepeatDeferredRequest = RepeatRegistration<RepeatDeferred>;

/// Gateway identifiers of the transaction an operation refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionIds {
    pub vps_tx_id: Option<String>,
    pub security_key: Option<String>,
    pub tx_auth_no: Option<u64>,
}

impl TransactionIds {
    pub fn from_reference(reference: &dyn TransactionReference) -> Self {
        Self {
            vps_tx_id: reference.vps_tx_id().map(str::to_string),
            security_key: reference.security_key().map(str::to_string),
            tx_auth_no: reference.tx_auth_no(),
        }
    }

    fn write(&self, fields: &mut FieldSet) {
        fields.insert_opt("VPSTxId", self.vps_tx_id.as_deref());
        fields.insert_opt("SecurityKey", self.security_key.as_deref());
        fields.insert_opt("TxAuthNo", self.tx_auth_no.map(|n| n.to_string()));
    }

    fn check(&self, rules: &mut Rules) {
        rules
            .field("VPSTxId", self.vps_tx_id.as_deref())
            .required()
            .max_len(38);
        rules
            .field("SecurityKey", self.security_key.as_deref())
            .required()
            .max_len(10);
    }
}

/// The prior transaction a refund, repeat or authorise builds on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedTransaction {
    pub vps_tx_id: Option<String>,
    pub vendor_tx_code: Option<String>,
    pub security_key: Option<String>,
    pub tx_auth_no: Option<u64>,
}

impl RelatedTransaction {
    pub fn from_reference(reference: &dyn TransactionReference) -> Self {
        Self {
            vps_tx_id: reference.vps_tx_id().map(str::to_string),
            vendor_tx_code: reference.vendor_tx_code().map(str::to_string),
            security_key: reference.security_key().map(str::to_string),
            tx_auth_no: reference.tx_auth_no(),
        }
    }

    fn write(&self, fields: &mut FieldSet, with_auth_no: bool) {
        fields.insert_opt("RelatedVPSTxId", self.vps_tx_id.as_deref());
        fields.insert_opt("RelatedVendorTxCode", self.vendor_tx_code.as_deref());
        fields.insert_opt("RelatedSecurityKey", self.security_key.as_deref());
        if with_auth_no {
            fields.insert_opt("RelatedTxAuthNo", self.tx_auth_no.map(|n| n.to_string()));
        }
    }

    fn check(&self, rules: &mut Rules, auth_no_required: bool) {
        rules
            .field("RelatedVPSTxId", self.vps_tx_id.as_deref())
            .required()
            .max_len(38);
        rules
            .field("RelatedVendorTxCode", self.vendor_tx_code.as_deref())
            .required()
            .max_len(40)
            .matches(&patterns::VENDOR_TX_CODE);
        rules
            .field("RelatedSecurityKey", self.security_key.as_deref())
            .required()
            .max_len(10);
        rules.ensure(
            !auth_no_required || self.tx_auth_no.is_some(),
            "RelatedTxAuthNo",
            "must not be blank",
        );
    }
}

/// Writes the fields of a newly created related transaction onto `target`.
fn record_new_transaction(
    header: &RequestHeader,
    tx_type: TxType,
    amount: Option<Decimal>,
    vps_tx_id: Option<&str>,
    security_key: Option<&str>,
    tx_auth_no: Option<u64>,
    target: &mut dyn TransactionReference,
) {
    if let Some(code) = &header.vendor_tx_code {
        target.set_vendor_tx_code(code.clone());
    }
    if let Some(vps_tx_id) = vps_tx_id {
        target.set_vps_tx_id(vps_tx_id.to_string());
    }
    if let Some(security_key) = security_key {
        target.set_security_key(security_key.to_string());
    }
    if let Some(tx_auth_no) = tx_auth_no {
        target.set_tx_auth_no(tx_auth_no);
    }
    target.set_tx_type(tx_type);
    if let Some(amount) = amount {
        target.set_amount(amount);
    }
}

/// ABORT, VOID or CANCEL of the referenced transaction.
pub struct MaintenanceRequest<K> {
    pub header: RequestHeader,
    pub transaction: TransactionIds,
    kind: PhantomData<K>,
}

impl<K: RequestKind> MaintenanceRequest<K> {
    pub const TX_TYPE: TxType = K::TX_TYPE;

    pub fn new(reference: &dyn TransactionReference) -> Self {
        Self {
            header: reference_header(reference),
            transaction: TransactionIds::from_reference(reference),
            kind: PhantomData,
        }
    }
}

impl<K> Clone for MaintenanceRequest<K> {
    fn clone(&self) -> Self {
        Self {
            header: self.header.clone(),
            transaction: self.transaction.clone(),
            kind: PhantomData,
        }
    }
}

impl<K: RequestKind> fmt::Debug for MaintenanceRequest<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaintenanceRequest")
            .field("tx_type", &K::TX_TYPE)
            .field("vendor_tx_code", &self.header.vendor_tx_code)
            .field("vps_tx_id", &self.transaction.vps_tx_id)
            .finish_non_exhaustive()
    }
}

fn reference_header(reference: &dyn TransactionReference) -> RequestHeader {
    match reference.vendor_tx_code() {
        Some(code) => RequestHeader::with_vendor_tx_code(code),
        None => RequestHeader::without_vendor_tx_code(),
    }
}

const MAINTENANCE_FIELDS: [&str; 6] = [
    "VPSProtocol",
    "TxType",
    "Vendor",
    "VendorTxCode",
    "VPSTxId",
    "SecurityKey",
];

impl<K: RequestKind> GatewayRequest for MaintenanceRequest<K> {
    type Response = StatusResponse;

    fn tx_type(&self) -> TxType {
        K::TX_TYPE
    }

    fn header(&self) -> &RequestHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    fn required_fields(&self) -> Vec<&'static str> {
        MAINTENANCE_FIELDS.to_vec()
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(K::TX_TYPE, &mut fields);
        self.transaction.write(&mut fields);
        fields
    }
}

impl<K: RequestKind> Validate for MaintenanceRequest<K> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules);
        self.transaction.check(&mut rules);
        check_complete(self, &mut rules);
        rules.finish()
    }
}

/// Releases a DEFERRED transaction, optionally for less than its amount.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub header: RequestHeader,
    pub transaction: TransactionIds,
    pub release_amount: Option<Decimal>,
}

impl ReleaseRequest {
    pub const TX_TYPE: TxType = TxType::Release;

    /// Release amount defaults to the referenced transaction's amount.
    pub fn new(reference: &dyn TransactionReference, release_amount: Option<Decimal>) -> Self {
        Self {
            header: reference_header(reference),
            transaction: TransactionIds::from_reference(reference),
            release_amount: release_amount.or_else(|| reference.amount()),
        }
    }
}

impl GatewayRequest for ReleaseRequest {
    type Response = ReleaseResponse;

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
        let mut required = MAINTENANCE_FIELDS.to_vec();
        required.push("ReleaseAmount");
        required
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(Self::TX_TYPE, &mut fields);
        self.transaction.write(&mut fields);
        fields.insert_opt("ReleaseAmount", self.release_amount.map(format_amount));
        fields
    }
}

impl Validate for ReleaseRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules);
        self.transaction.check(&mut rules);
        rules.amount("ReleaseAmount", self.release_amount, true);
        check_complete(self, &mut rules);
        rules.finish()
    }
}

/// Refunds part or all of a settled transaction.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub header: RequestHeader,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub related: RelatedTransaction,
}

impl RefundRequest {
    pub const TX_TYPE: TxType = TxType::Refund;

    pub fn new(
        reference: &dyn TransactionReference,
        amount: Decimal,
        currency: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            header: RequestHeader::new(),
            amount: Some(amount),
            currency: Some(currency.into()),
            description: Some(description.into()),
            related: RelatedTransaction::from_reference(reference),
        }
    }
}

impl GatewayRequest for RefundRequest {
    type Response = RefundResponse;

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
            "Amount",
            "Currency",
            "Description",
            "RelatedVPSTxId",
            "RelatedVendorTxCode",
            "RelatedSecurityKey",
        ]
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(Self::TX_TYPE, &mut fields);
        fields.insert_opt("Amount", self.amount.map(format_amount));
        fields.insert_opt("Currency", self.currency.as_deref());
        fields.insert_opt("Description", self.description.as_deref().map(transliterate));
        self.related.write(&mut fields, true);
        fields
    }

    fn record(&self, response: &Self::Response, target: &mut dyn TransactionReference) {
        record_new_transaction(
            &self.header,
            Self::TX_TYPE,
            self.amount,
            response.vps_tx_id.as_deref(),
            None,
            response.tx_auth_no,
            target,
        );
    }
}

impl Validate for RefundRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules);
        rules.amount("Amount", self.amount, true);
        rules.field("Currency", self.currency.as_deref()).required().currency();
        rules
            .field("Description", self.description.as_deref())
            .required()
            .max_len(100);
        self.related.check(&mut rules, false);
        check_complete(self, &mut rules);
        rules.finish()
    }
}

/// Charges a previously authorised card again, immediately or deferred.
pub struct RepeatRegistration<K> {
    pub header: RequestHeader,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub related: RelatedTransaction,
    pub cv2: Option<String>,
    kind: PhantomData<K>,
}

impl<K: RequestKind> RepeatRegistration<K> {
    pub const TX_TYPE: TxType = K::TX_TYPE;

    pub fn new(
        reference: &dyn TransactionReference,
        amount: Decimal,
        currency: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            header: RequestHeader::new(),
            amount: Some(amount),
            currency: Some(currency.into()),
            description: Some(description.into()),
            related: RelatedTransaction::from_reference(reference),
            cv2: None,
            kind: PhantomData,
        }
    }
}

impl<K> Clone for RepeatRegistration<K> {
    fn clone(&self) -> Self {
        Self {
            header: self.header.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            description: self.description.clone(),
            related: self.related.clone(),
            cv2: self.cv2.clone(),
            kind: PhantomData,
        }
    }
}

impl<K: RequestKind> fmt::Debug for RepeatRegistration<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatRegistration")
            .field("tx_type", &K::TX_TYPE)
            .field("vendor_tx_code", &self.header.vendor_tx_code)
            .field("amount", &self.amount)
            .field("related", &self.related.vendor_tx_code)
            .finish_non_exhaustive()
    }
}

impl<K: RequestKind> GatewayRequest for RepeatRegistration<K> {
    type Response = RepeatResponse;

    fn tx_type(&self) -> TxType {
        K::TX_TYPE
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
            "Amount",
            "Currency",
            "Description",
            "RelatedVPSTxId",
            "RelatedVendorTxCode",
            "RelatedSecurityKey",
            "RelatedTxAuthNo",
        ]
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(K::TX_TYPE, &mut fields);
        fields.insert_opt("Amount", self.amount.map(format_amount));
        fields.insert_opt("Currency", self.currency.as_deref());
        fields.insert_opt("Description", self.description.as_deref().map(transliterate));
        self.related.write(&mut fields, true);
        fields.insert_opt("CV2", self.cv2.as_deref());
        fields
    }

    fn record(&self, response: &Self::Response, target: &mut dyn TransactionReference) {
        record_new_transaction(
            &self.header,
            K::TX_TYPE,
            self.amount,
            response.vps_tx_id.as_deref(),
            response.security_key.as_deref(),
            response.tx_auth_no,
            target,
        );
    }
}

impl<K: RequestKind> Validate for RepeatRegistration<K> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules);
        rules.amount("Amount", self.amount, true);
        rules.field("Currency", self.currency.as_deref()).required().currency();
        rules
            .field("Description", self.description.as_deref())
            .required()
            .max_len(100);
        self.related.check(&mut rules, true);
        rules.field("CV2", self.cv2.as_deref()).matches(&patterns::CV2);
        check_complete(self, &mut rules);
        rules.finish()
    }
}

/// Authorises against an AUTHENTICATE transaction.
#[derive(Debug, Clone)]
pub struct AuthoriseRequest {
    pub header: RequestHeader,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub related: RelatedTransaction,
    pub apply_avs_cv2: Option<u8>,
}

impl AuthoriseRequest {
    pub const TX_TYPE: TxType = TxType::Authorise;

    pub fn new(reference: &dyn TransactionReference, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            header: RequestHeader::new(),
            amount: Some(amount),
            description: Some(description.into()),
            related: RelatedTransaction::from_reference(reference),
            apply_avs_cv2: None,
        }
    }
}

impl GatewayRequest for AuthoriseRequest {
    type Response = AuthoriseResponse;

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
            "Amount",
            "Description",
            "RelatedVPSTxId",
            "RelatedVendorTxCode",
            "RelatedSecurityKey",
        ]
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(Self::TX_TYPE, &mut fields);
        fields.insert_opt("Amount", self.amount.map(format_amount));
        fields.insert_opt("Description", self.description.as_deref().map(transliterate));
        self.related.write(&mut fields, false);
        fields.insert_opt("ApplyAVSCV2", self.apply_avs_cv2.map(|v| v.to_string()));
        fields
    }

    fn record(&self, response: &Self::Response, target: &mut dyn TransactionReference) {
        record_new_transaction(
            &self.header,
            Self::TX_TYPE,
            self.amount,
            response.vps_tx_id.as_deref(),
            response.security_key.as_deref(),
            response.tx_auth_no,
            target,
        );
    }
}

impl Validate for AuthoriseRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules);
        rules.amount("Amount", self.amount, true);
        rules
            .field("Description", self.description.as_deref())
            .required()
            .max_len(100);
        self.related.check(&mut rules, false);
        rules.flag("ApplyAVSCV2", self.apply_avs_cv2, 3);
        check_complete(self, &mut rules);
        rules.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::response::GatewayResponse;
    use crate::payments::types::Transaction;
    use rust_decimal_macros::dec;

    fn settled() -> Transaction {
        Transaction {
            vendor_tx_code: Some("order-1".to_string()),
            vps_tx_id: Some("{ABC-123}".to_string()),
            security_key: Some("XYZ1234567".to_string()),
            tx_auth_no: Some(4242),
            tx_type: Some(TxType::Deferred),
            amount: Some(dec!(49.99)),
        }
    }

    fn stamped<R: GatewayRequest>(mut request: R) -> R {
        request.header_mut().stamp("2.23", "acme");
        request
    }

    #[test]
    fn test_maintenance_requests_reuse_the_reference() {
        let abort = stamped(AbortRequest::new(&settled()));
        let fields = abort.to_field_set();

        assert_eq!(fields.get("TxType"), Some("ABORT"));
        assert_eq!(fields.get("VendorTxCode"), Some("order-1"));
        assert_eq!(fields.get("VPSTxId"), Some("{ABC-123}"));
        assert_eq!(fields.get("TxAuthNo"), Some("4242"));
        assert!(abort.validate().is_ok());

        assert_eq!(VoidRequest::TX_TYPE, TxType::Void);
        assert_eq!(CancelRequest::new(&settled()).tx_type(), TxType::Cancel);
    }

    #[test]
    fn test_maintenance_without_security_key_is_incomplete() {
        let mut transaction = settled();
        transaction.security_key = None;
        let void = stamped(VoidRequest::new(&transaction));

        assert!(!void.is_complete());
        assert!(void.validate().unwrap_err().contains("SecurityKey"));
    }

    #[test]
    fn test_release_amount_defaults_to_transaction_amount() {
        let release = stamped(ReleaseRequest::new(&settled(), None));
        assert_eq!(release.to_field_set().get("ReleaseAmount"), Some("49.99"));

        let partial = stamped(ReleaseRequest::new(&settled(), Some(dec!(20))));
        assert_eq!(partial.to_field_set().get("ReleaseAmount"), Some("20.00"));
        assert!(partial.validate().is_ok());
    }

    #[test]
    fn test_refund_relates_to_the_original() {
        let refund = stamped(RefundRequest::new(&settled(), dec!(5), "GBP", "Damaged item"));
        let fields = refund.to_field_set();

        assert_ne!(fields.get("VendorTxCode"), Some("order-1"));
        assert_eq!(fields.get("RelatedVendorTxCode"), Some("order-1"));
        assert_eq!(fields.get("RelatedSecurityKey"), Some("XYZ1234567"));
        assert_eq!(fields.get("RelatedTxAuthNo"), Some("4242"));
        assert_eq!(fields.get("Amount"), Some("5.00"));
        assert!(refund.validate().is_ok());
    }

    #[test]
    fn test_repeat_requires_related_auth_no() {
        let mut transaction = settled();
        transaction.tx_auth_no = None;
        let mut repeat = stamped(RepeatRequest::new(&transaction, dec!(10), "GBP", "Monthly"));
        repeat.cv2 = Some("12".to_string());

        let errors = repeat.validate().unwrap_err();
        assert!(errors.contains("RelatedTxAuthNo"));
        assert!(errors.contains("CV2"));
        assert_eq!(RepeatDeferredRequest::TX_TYPE, TxType::RepeatDeferred);
    }

    #[test]
    fn test_authorise_omits_currency_and_auth_no() {
        let mut authorise = stamped(AuthoriseRequest::new(&settled(), dec!(12.5), "Authorise"));
        authorise.apply_avs_cv2 = Some(2);

        let fields = authorise.to_field_set();
        assert!(!fields.contains_key("Currency"));
        assert!(!fields.contains_key("RelatedTxAuthNo"));
        assert_eq!(fields.get("ApplyAVSCV2"), Some("2"));
        assert!(authorise.validate().is_ok());

        authorise.apply_avs_cv2 = Some(7);
        assert!(authorise.validate().unwrap_err().contains("ApplyAVSCV2"));
    }

    #[test]
    fn test_repeat_records_new_transaction() {
        let repeat = stamped(RepeatRequest::new(&settled(), dec!(10), "GBP", "Monthly"));
        let response = RepeatResponse::parse(
            "VPSProtocol=2.23\r\nStatus=OK\r\nVPSTxId={NEW-1}\r\nTxAuthNo=99\r\nSecurityKey=NEWKEY",
        )
        .unwrap();

        let mut created = Transaction::default();
        repeat.record(&response, &mut created);

        assert_eq!(created.vendor_tx_code, repeat.header.vendor_tx_code);
        assert_eq!(created.vps_tx_id.as_deref(), Some("{NEW-1}"));
        assert_eq!(created.security_key.as_deref(), Some("NEWKEY"));
        assert_eq!(created.tx_auth_no, Some(99));
        assert_eq!(created.tx_type, Some(TxType::Repeat));
        assert_eq!(created.amount, Some(dec!(10)));
    }
}
