//! Gateway protocol types and data structures
//!
//! Enumerations shared by requests, responses and notifications, plus the
//! transaction capability surface the calling application implements.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GatewayError;

/// Transaction type discriminator sent as `TxType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxType {
    Payment,
    Deferred,
    Authenticate,
    Token,
    RemoveToken,
    Release,
    Abort,
    Refund,
    Repeat,
    RepeatDeferred,
    Void,
    Cancel,
    Authorise,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Payment => "PAYMENT",
            TxType::Deferred => "DEFERRED",
            TxType::Authenticate => "AUTHENTICATE",
            TxType::Token => "TOKEN",
            TxType::RemoveToken => "REMOVETOKEN",
            TxType::Release => "RELEASE",
            TxType::Abort => "ABORT",
            TxType::Refund => "REFUND",
            TxType::Repeat => "REPEAT",
            TxType::RepeatDeferred => "REPEATDEFERRED",
            TxType::Void => "VOID",
            TxType::Cancel => "CANCEL",
            TxType::Authorise => "AUTHORISE",
        }
    }

    /// The gateway service a request of this type is posted to.
    pub fn service(&self) -> Service {
        match self {
            TxType::Payment | TxType::Deferred | TxType::Authenticate => Service::Register,
            TxType::Token => Service::Token,
            TxType::RemoveToken => Service::RemoveToken,
            TxType::Release => Service::Release,
            TxType::Abort => Service::Abort,
            TxType::Refund => Service::Refund,
            TxType::Repeat | TxType::RepeatDeferred => Service::Repeat,
            TxType::Void => Service::Void,
            TxType::Cancel => Service::Cancel,
            TxType::Authorise => Service::Authorise,
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tx_type = match s {
            "PAYMENT" => TxType::Payment,
            "DEFERRED" => TxType::Deferred,
            "AUTHENTICATE" => TxType::Authenticate,
            "TOKEN" => TxType::Token,
            "REMOVETOKEN" => TxType::RemoveToken,
            "RELEASE" => TxType::Release,
            "ABORT" => TxType::Abort,
            "REFUND" => TxType::Refund,
            "REPEAT" => TxType::Repeat,
            "REPEATDEFERRED" => TxType::RepeatDeferred,
            "VOID" => TxType::Void,
            "CANCEL" => TxType::Cancel,
            "AUTHORISE" => TxType::Authorise,
            _ => return Err(GatewayError::decode("TxType")),
        };
        Ok(tx_type)
    }
}

/// Gateway endpoint a request is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Register,
    Token,
    RemoveToken,
    Release,
    Abort,
    Refund,
    Repeat,
    Void,
    Cancel,
    Authorise,
}

impl Service {
    /// Resource token used by the live and test hosts.
    pub fn gateway_token(&self) -> &'static str {
        match self {
            Service::Register => "vspserver-register",
            Service::Token => "token",
            Service::RemoveToken => "removetoken",
            Service::Release => "release",
            Service::Abort => "abort",
            Service::Refund => "refund",
            Service::Repeat => "repeat",
            Service::Void => "void",
            Service::Cancel => "cancel",
            Service::Authorise => "authorise",
        }
    }

    /// Resource token used by the simulator.
    pub fn simulator_token(&self) -> &'static str {
        match self {
            Service::Register => "Register",
            Service::Token => "Token",
            Service::RemoveToken => "RemoveToken",
            Service::Release => "Release",
            Service::Abort => "Abort",
            Service::Refund => "Refund",
            Service::Repeat => "Repeat",
            Service::Void => "Void",
            Service::Cancel => "Cancel",
            Service::Authorise => "Authorise",
        }
    }
}

/// Operating mode, each with its own host and resource-path convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Simulator,
    Test,
    Live,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Simulator => "simulator",
            Mode::Test => "test",
            Mode::Live => "live",
        }
    }

    pub fn endpoint(&self, service: Service) -> String {
        match self {
            Mode::Simulator => format!(
                "https://test.sagepay.com/Simulator/VSPServerGateway.asp?Service=Vendor{}Tx",
                service.simulator_token()
            ),
            Mode::Test => format!(
                "https://test.sagepay.com/gateway/service/{}.vsp",
                service.gateway_token()
            ),
            Mode::Live => format!(
                "https://live.sagepay.com/gateway/service/{}.vsp",
                service.gateway_token()
            ),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulator" => Ok(Mode::Simulator),
            "test" => Ok(Mode::Test),
            "live" => Ok(Mode::Live),
            other => Err(GatewayError::config_error(format!(
                "mode must be simulator, test or live, got {}",
                other
            ))),
        }
    }
}

/// Status values the gateway uses across responses and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "OK REPEATED")]
    OkRepeated,
    #[serde(rename = "MALFORMED")]
    Malformed,
    #[serde(rename = "INVALID")]
    Invalid,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "NOTAUTHED")]
    NotAuthed,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "ABORT")]
    Abort,
    #[serde(rename = "AUTHENTICATED")]
    Authenticated,
    #[serde(rename = "REGISTERED")]
    Registered,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::OkRepeated => "OK REPEATED",
            Status::Malformed => "MALFORMED",
            Status::Invalid => "INVALID",
            Status::Error => "ERROR",
            Status::NotAuthed => "NOTAUTHED",
            Status::Rejected => "REJECTED",
            Status::Abort => "ABORT",
            Status::Authenticated => "AUTHENTICATED",
            Status::Registered => "REGISTERED",
        }
    }

    pub fn parse(value: &str) -> Option<Status> {
        let status = match value {
            "OK" => Status::Ok,
            "OK REPEATED" => Status::OkRepeated,
            "MALFORMED" => Status::Malformed,
            "INVALID" => Status::Invalid,
            "ERROR" => Status::Error,
            "NOTAUTHED" => Status::NotAuthed,
            "REJECTED" => Status::Rejected,
            "ABORT" => Status::Abort,
            "AUTHENTICATED" => Status::Authenticated,
            "REGISTERED" => Status::Registered,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok | Status::OkRepeated)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of one payment transaction needed to build follow-up requests.
///
/// The calling application owns the record. This crate only reads it, and
/// after a successful round-trip writes back the gateway-assigned fields.
pub trait TransactionReference: Send + Sync {
    fn vendor_tx_code(&self) -> Option<&str>;
    fn set_vendor_tx_code(&mut self, value: String);

    fn vps_tx_id(&self) -> Option<&str>;
    fn set_vps_tx_id(&mut self, value: String);

    fn security_key(&self) -> Option<&str>;
    fn set_security_key(&mut self, value: String);

    fn tx_auth_no(&self) -> Option<u64>;
    fn set_tx_auth_no(&mut self, value: u64);

    fn tx_type(&self) -> Option<TxType>;
    fn set_tx_type(&mut self, value: TxType);

    fn amount(&self) -> Option<Decimal>;
    fn set_amount(&mut self, value: Decimal);
}

/// Plain in-memory transaction record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub vendor_tx_code: Option<String>,
    pub vps_tx_id: Option<String>,
    pub security_key: Option<String>,
    pub tx_auth_no: Option<u64>,
    pub tx_type: Option<TxType>,
    pub amount: Option<Decimal>,
}

impl TransactionReference for Transaction {
    fn vendor_tx_code(&self) -> Option<&str> {
        self.vendor_tx_code.as_deref()
    }

    fn set_vendor_tx_code(&mut self, value: String) {
        self.vendor_tx_code = Some(value);
    }

    fn vps_tx_id(&self) -> Option<&str> {
        self.vps_tx_id.as_deref()
    }

    fn set_vps_tx_id(&mut self, value: String) {
        self.vps_tx_id = Some(value);
    }

    fn security_key(&self) -> Option<&str> {
        self.security_key.as_deref()
    }

    fn set_security_key(&mut self, value: String) {
        self.security_key = Some(value);
    }

    fn tx_auth_no(&self) -> Option<u64> {
        self.tx_auth_no
    }

    fn set_tx_auth_no(&mut self, value: u64) {
        self.tx_auth_no = Some(value);
    }

    fn tx_type(&self) -> Option<TxType> {
        self.tx_type
    }

    fn set_tx_type(&mut self, value: TxType) {
        self.tx_type = Some(value);
    }

    fn amount(&self) -> Option<Decimal> {
        self.amount
    }

    fn set_amount(&mut self, value: Decimal) {
        self.amount = Some(value);
    }
}

/// Billing or delivery address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub firstnames: String,
    pub surname: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub post_code: Option<String>,
    /// ISO 3166-1 alpha-2
    pub country: String,
    /// US addresses only
    pub state: Option<String>,
    pub phone: Option<String>,
}

/// One basket line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub unit_tax: Decimal,
}

impl BasketItem {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: Decimal, unit_tax: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            unit_tax,
        }
    }
}
