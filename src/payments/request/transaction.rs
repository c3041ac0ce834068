//! Transaction registration: PAYMENT, DEFERRED and AUTHENTICATE.

use rust_decimal::Decimal;
use std::fmt;
use std::marker::PhantomData;

use super::kind::{Authenticate, Deferred, Payment};
use super::{check_complete, GatewayRequest, NotificationTarget, RequestHeader, RequestKind};
use crate::payments::codec::{format_amount, transliterate, FieldSet};
use crate::payments::response::TransactionRegistrationResponse;
use crate::payments::types::{Address, BasketItem, TransactionReference, TxType};
use crate::payments::validation::{patterns, Rules, Validate, ValidationErrors};

pub type PaymentRequest = TransactionRegistration<Payment>;
pub type DeferredRequest = TransactionRegistration<Deferred>;
pub type AuthenticateRequest = TransactionRegistration<Authenticate>;

/// Fraud screening profile of the payment pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Normal,
    Low,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Normal => "NORMAL",
            Profile::Low => "LOW",
        }
    }
}

/// Merchant account the transaction is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    /// `E`
    Ecommerce,
    /// `C`
    ContinuousAuthority,
    /// `M`
    MailOrder,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Ecommerce => "E",
            AccountType::ContinuousAuthority => "C",
            AccountType::MailOrder => "M",
        }
    }
}

/// Billing or delivery block as sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFields {
    pub surname: Option<String>,
    pub firstnames: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub post_code: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
}

impl AddressFields {
    fn is_us(&self) -> bool {
        self.country.as_deref() == Some("US")
    }

    fn write(&self, prefix: &str, fields: &mut FieldSet) {
        let text = |value: &Option<String>| value.as_deref().map(transliterate);

        fields.insert_opt(format!("{}Surname", prefix), text(&self.surname));
        fields.insert_opt(format!("{}Firstnames", prefix), text(&self.firstnames));
        fields.insert_opt(format!("{}Address1", prefix), text(&self.address1));
        fields.insert_opt(format!("{}Address2", prefix), text(&self.address2));
        fields.insert_opt(format!("{}City", prefix), text(&self.city));
        let post_code = self.post_code.as_deref().filter(|p| !p.is_empty()).unwrap_or("-");
        fields.insert(format!("{}PostCode", prefix), post_code);
        fields.insert_opt(format!("{}Country", prefix), self.country.as_deref());
        fields.insert_opt(format!("{}State", prefix), self.state.as_deref());
        fields.insert_opt(format!("{}Phone", prefix), self.phone.as_deref());
    }
}

impl From<Address> for AddressFields {
    fn from(address: Address) -> Self {
        let is_us = address.country == "US";
        Self {
            surname: Some(address.surname),
            firstnames: Some(address.firstnames),
            address1: Some(address.address1),
            address2: address.address2.filter(|a| !a.is_empty()),
            city: Some(address.city),
            post_code: address.post_code.filter(|p| !p.is_empty()),
            country: Some(address.country),
            state: address.state.filter(|_| is_us),
            phone: address.phone,
        }
    }
}

macro_rules! check_address {
    ($rules:expr, $address:expr, $prefix:literal) => {{
        let address = $address;
        $rules
            .field(concat!($prefix, "Surname"), address.surname.as_deref())
            .required()
            .max_len(20)
            .matches(&patterns::NAME);
        $rules
            .field(concat!($prefix, "Firstnames"), address.firstnames.as_deref())
            .required()
            .max_len(20)
            .matches(&patterns::NAME);
        $rules
            .field(concat!($prefix, "Address1"), address.address1.as_deref())
            .required()
            .max_len(100)
            .matches(&patterns::ADDRESS);
        $rules
            .field(concat!($prefix, "Address2"), address.address2.as_deref())
            .max_len(100)
            .matches(&patterns::ADDRESS);
        $rules
            .field(concat!($prefix, "City"), address.city.as_deref())
            .required()
            .max_len(40)
            .matches(&patterns::ADDRESS);
        $rules
            .field(concat!($prefix, "PostCode"), address.post_code.as_deref())
            .max_len(10)
            .matches(&patterns::POST_CODE);
        $rules
            .field(concat!($prefix, "Country"), address.country.as_deref())
            .required()
            .country();
        $rules
            .field(concat!($prefix, "State"), address.state.as_deref())
            .us_state();
        $rules.ensure(
            !address.is_us() || address.state.as_deref().map_or(false, |s| !s.is_empty()),
            concat!($prefix, "State"),
            "is required for US addresses",
        );
        $rules
            .field(concat!($prefix, "Phone"), address.phone.as_deref())
            .max_len(20)
            .matches(&patterns::PHONE);
    }};
}

/// Registration of a new card transaction; the kind fixes its `TxType`.
pub struct TransactionRegistration<K> {
    pub header: RequestHeader,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub notification_url: Option<String>,
    pub token: Option<String>,
    pub store_token: bool,
    pub billing: AddressFields,
    pub delivery: AddressFields,
    pub customer_email: Option<String>,
    pub basket: Option<String>,
    pub allow_gift_aid: Option<bool>,
    pub apply_avs_cv2: Option<u8>,
    pub apply_3d_secure: Option<u8>,
    pub profile: Option<Profile>,
    pub billing_agreement: Option<bool>,
    pub account_type: Option<AccountType>,
    kind: PhantomData<K>,
}

impl<K: RequestKind> TransactionRegistration<K> {
    pub const TX_TYPE: TxType = K::TX_TYPE;

    pub fn new(amount: Decimal, currency: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            amount: Some(amount),
            currency: Some(currency.into()),
            description: Some(description.into()),
            ..Self::empty()
        }
    }

    /// Registration with nothing but a generated vendor tx code.
    pub fn empty() -> Self {
        Self {
            header: RequestHeader::new(),
            amount: None,
            currency: None,
            description: None,
            notification_url: None,
            token: None,
            store_token: false,
            billing: AddressFields::default(),
            delivery: AddressFields::default(),
            customer_email: None,
            basket: None,
            allow_gift_aid: None,
            apply_avs_cv2: None,
            apply_3d_secure: None,
            profile: None,
            billing_agreement: None,
            account_type: None,
            kind: PhantomData,
        }
    }

    pub fn set_billing_address(&mut self, address: Address) {
        self.billing = address.into();
    }

    pub fn set_delivery_address(&mut self, address: Address) {
        self.delivery = address.into();
    }

    /// Uses one address for both billing and delivery.
    pub fn set_addresses(&mut self, address: Address) {
        self.set_delivery_address(address.clone());
        self.set_billing_address(address);
    }

    pub fn set_basket(&mut self, items: &[BasketItem]) {
        self.basket = Some(super::pack_basket(items));
    }
}

impl<K: RequestKind> Default for TransactionRegistration<K> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K> Clone for TransactionRegistration<K> {
    fn clone(&self) -> Self {
        Self {
            header: self.header.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            description: self.description.clone(),
            notification_url: self.notification_url.clone(),
            token: self.token.clone(),
            store_token: self.store_token,
            billing: self.billing.clone(),
            delivery: self.delivery.clone(),
            customer_email: self.customer_email.clone(),
            basket: self.basket.clone(),
            allow_gift_aid: self.allow_gift_aid,
            apply_avs_cv2: self.apply_avs_cv2,
            apply_3d_secure: self.apply_3d_secure,
            profile: self.profile,
            billing_agreement: self.billing_agreement,
            account_type: self.account_type,
            kind: PhantomData,
        }
    }
}

impl<K: RequestKind> fmt::Debug for TransactionRegistration<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRegistration")
            .field("tx_type", &K::TX_TYPE)
            .field("vendor_tx_code", &self.header.vendor_tx_code)
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

impl<K: RequestKind> GatewayRequest for TransactionRegistration<K> {
    type Response = TransactionRegistrationResponse;

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
        let mut required = vec![
            "VPSProtocol",
            "TxType",
            "Vendor",
            "VendorTxCode",
            "Amount",
            "Currency",
            "Description",
            "NotificationURL",
            "BillingSurname",
            "BillingFirstnames",
            "BillingAddress1",
            "BillingCity",
            "BillingPostCode",
            "BillingCountry",
            "DeliverySurname",
            "DeliveryFirstnames",
            "DeliveryAddress1",
            "DeliveryCity",
            "DeliveryPostCode",
            "DeliveryCountry",
        ];
        if self.billing.is_us() {
            required.push("BillingState");
        }
        if self.delivery.is_us() {
            required.push("DeliveryState");
        }
        required
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(K::TX_TYPE, &mut fields);
        fields.insert_opt("Amount", self.amount.map(format_amount));
        fields.insert_opt("Currency", self.currency.as_deref());
        fields.insert_opt("Description", self.description.as_deref().map(transliterate));
        fields.insert_opt("NotificationURL", self.notification_url.as_deref());
        fields.insert_opt("Token", self.token.as_deref());
        if self.store_token {
            fields.insert("StoreToken", "1");
        }
        self.billing.write("Billing", &mut fields);
        self.delivery.write("Delivery", &mut fields);
        fields.insert_opt("CustomerEMail", self.customer_email.as_deref());
        fields.insert_opt("Basket", self.basket.as_deref().map(transliterate));
        fields.insert_opt("AllowGiftAid", self.allow_gift_aid.map(flag));
        fields.insert_opt("ApplyAVSCV2", self.apply_avs_cv2.map(|v| v.to_string()));
        fields.insert_opt("Apply3DSecure", self.apply_3d_secure.map(|v| v.to_string()));
        fields.insert_opt("Profile", self.profile.map(|p| p.as_str()));
        fields.insert_opt("BillingAgreement", self.billing_agreement.map(flag));
        fields.insert_opt("AccountType", self.account_type.map(|a| a.as_str()));
        fields
    }

    fn notification_target(&self) -> Option<NotificationTarget> {
        Some(NotificationTarget::Transaction)
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
        target.set_tx_type(K::TX_TYPE);
        if let Some(amount) = self.amount {
            target.set_amount(amount);
        }
    }
}

impl<K: RequestKind> Validate for TransactionRegistration<K> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        self.header.check(&mut rules);
        rules.amount("Amount", self.amount, true);
        rules.field("Currency", self.currency.as_deref()).required().currency();
        rules
            .field("Description", self.description.as_deref())
            .required()
            .max_len(100);
        rules
            .field("NotificationURL", self.notification_url.as_deref())
            .required()
            .max_len(255)
            .url();
        rules.field("Token", self.token.as_deref()).len_between(38, 38);
        check_address!(rules, &self.billing, "Billing");
        check_address!(rules, &self.delivery, "Delivery");
        rules
            .field("CustomerEMail", self.customer_email.as_deref())
            .max_len(255)
            .email();
        rules.field("Basket", self.basket.as_deref()).max_len(7500);
        rules.flag("ApplyAVSCV2", self.apply_avs_cv2, 3);
        rules.flag("Apply3DSecure", self.apply_3d_secure, 3);
        check_complete(self, &mut rules);
        rules.finish()
    }
}
