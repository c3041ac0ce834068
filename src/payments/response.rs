//! Gateway responses to registration and follow-up requests
//!
//! Each response binds the header fields unconditionally and everything else
//! only when the status allows it. A field the status promises but the body
//! lacks is a malformed response, never a default.

use serde::Serialize;

use crate::error::{GatewayError, GatewayResult};
use crate::payments::codec::{self, FieldSet};
use crate::payments::types::Status;

/// Protocol version, status and detail common to every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseHeader {
    pub vps_protocol: String,
    pub status: Status,
    pub status_detail: Option<String>,
}

impl ResponseHeader {
    /// Binds the header, rejecting any status outside `allowed`.
    pub fn bind(fields: &FieldSet, allowed: &[Status]) -> GatewayResult<Self> {
        let vps_protocol = required(fields, "VPSProtocol")?;
        let raw_status = required(fields, "Status")?;
        let status = Status::parse(&raw_status)
            .filter(|s| allowed.contains(s))
            .ok_or_else(|| {
                GatewayError::malformed_response("Status", format!("unexpected value {}", raw_status))
            })?;

        Ok(Self {
            vps_protocol,
            status,
            status_detail: fields.get_owned("StatusDetail"),
        })
    }

    fn write(&self, fields: &mut FieldSet) {
        fields.insert("VPSProtocol", self.vps_protocol.as_str());
        fields.insert("Status", self.status.as_str());
        fields.insert_opt("StatusDetail", self.status_detail.as_deref());
    }
}

fn required(fields: &FieldSet, key: &str) -> GatewayResult<String> {
    fields.get_owned(key).ok_or_else(|| GatewayError::missing_field(key))
}

fn required_when(fields: &FieldSet, key: &str, condition: bool) -> GatewayResult<Option<String>> {
    if condition {
        required(fields, key).map(Some)
    } else {
        Ok(None)
    }
}

fn auth_no_when(fields: &FieldSet, condition: bool) -> GatewayResult<Option<u64>> {
    match required_when(fields, "TxAuthNo", condition)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| GatewayError::malformed_response("TxAuthNo", "is not an integer")),
        None => Ok(None),
    }
}

/// Common contract of every gateway response.
pub trait GatewayResponse: Sized + Send {
    /// Binds an already decoded field set.
    fn from_fields(fields: &FieldSet) -> GatewayResult<Self>;

    fn header(&self) -> &ResponseHeader;

    /// Only the fields actually bound.
    fn to_field_set(&self) -> FieldSet;

    /// Decodes a raw CRLF response body and binds it.
    fn parse(body: &str) -> GatewayResult<Self> {
        let fields = codec::decode_response(body).map_err(|e| match e {
            GatewayError::Decode { field } => {
                GatewayError::malformed_response(field, "could not be decoded")
            }
            other => GatewayError::malformed_response("body", other.to_string()),
        })?;
        Self::from_fields(&fields)
    }

    fn status(&self) -> Status {
        self.header().status
    }

    fn is_ok(&self) -> bool {
        self.status().is_ok()
    }

    fn to_json(&self) -> String {
        self.to_field_set().to_json()
    }
}

const REGISTRATION_STATUSES: [Status; 5] = [
    Status::Ok,
    Status::OkRepeated,
    Status::Malformed,
    Status::Invalid,
    Status::Error,
];

const MAINTENANCE_STATUSES: [Status; 4] =
    [Status::Ok, Status::Malformed, Status::Invalid, Status::Error];

const REFUND_STATUSES: [Status; 5] = [
    Status::Ok,
    Status::NotAuthed,
    Status::Malformed,
    Status::Invalid,
    Status::Error,
];

const REPEAT_STATUSES: [Status; 6] = [
    Status::Ok,
    Status::NotAuthed,
    Status::Rejected,
    Status::Malformed,
    Status::Invalid,
    Status::Error,
];

/// Answer to a PAYMENT, DEFERRED or AUTHENTICATE registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRegistrationResponse {
    pub header: ResponseHeader,
    pub vps_tx_id: Option<String>,
    pub security_key: Option<String>,
    /// Payment page the customer must be sent to.
    pub next_url: Option<String>,
}

impl GatewayResponse for TransactionRegistrationResponse {
    fn from_fields(fields: &FieldSet) -> GatewayResult<Self> {
        let header = ResponseHeader::bind(fields, &REGISTRATION_STATUSES)?;
        let ok = header.status == Status::Ok;

        Ok(Self {
            vps_tx_id: required_when(fields, "VPSTxId", header.status.is_ok())?,
            security_key: required_when(fields, "SecurityKey", ok)?,
            next_url: required_when(fields, "NextURL", ok)?,
            header,
        })
    }

    fn header(&self) -> &ResponseHeader {
        &self.header
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(&mut fields);
        fields.insert_opt("VPSTxId", self.vps_tx_id.as_deref());
        fields.insert_opt("SecurityKey", self.security_key.as_deref());
        fields.insert_opt("NextURL", self.next_url.as_deref());
        fields
    }
}

/// Token registration answers with the same shape as a transaction registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRegistrationResponse {
    pub header: ResponseHeader,
    pub vps_tx_id: Option<String>,
    pub security_key: Option<String>,
    pub next_url: Option<String>,
}

impl GatewayResponse for TokenRegistrationResponse {
    fn from_fields(fields: &FieldSet) -> GatewayResult<Self> {
        let registration = TransactionRegistrationResponse::from_fields(fields)?;
        Ok(Self {
            header: registration.header,
            vps_tx_id: registration.vps_tx_id,
            security_key: registration.security_key,
            next_url: registration.next_url,
        })
    }

    fn header(&self) -> &ResponseHeader {
        &self.header
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(&mut fields);
        fields.insert_opt("VPSTxId", self.vps_tx_id.as_deref());
        fields.insert_opt("SecurityKey", self.security_key.as_deref());
        fields.insert_opt("NextURL", self.next_url.as_deref());
        fields
    }
}

/// Header-only answer used by release, abort, void, cancel and token removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub header: ResponseHeader,
}

pub type ReleaseResponse = StatusResponse;
pub type AbortResponse = StatusResponse;
pub type VoidResponse = StatusResponse;
pub type CancelResponse = StatusResponse;
pub type TokenRemovalResponse = StatusResponse;

impl GatewayResponse for StatusResponse {
    fn from_fields(fields: &FieldSet) -> GatewayResult<Self> {
        Ok(Self {
            header: ResponseHeader::bind(fields, &MAINTENANCE_STATUSES)?,
        })
    }

    fn header(&self) -> &ResponseHeader {
        &self.header
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(&mut fields);
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundResponse {
    pub header: ResponseHeader,
    pub vps_tx_id: Option<String>,
    pub tx_auth_no: Option<u64>,
}

impl GatewayResponse for RefundResponse {
    fn from_fields(fields: &FieldSet) -> GatewayResult<Self> {
        let header = ResponseHeader::bind(fields, &REFUND_STATUSES)?;
        let ok = header.status == Status::Ok;

        Ok(Self {
            vps_tx_id: required_when(fields, "VPSTxId", ok)?,
            tx_auth_no: auth_no_when(fields, ok)?,
            header,
        })
    }

    fn header(&self) -> &ResponseHeader {
        &self.header
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(&mut fields);
        fields.insert_opt("VPSTxId", self.vps_tx_id.as_deref());
        fields.insert_opt("TxAuthNo", self.tx_auth_no.map(|n| n.to_string()));
        fields
    }
}

/// AVS and CV2 check outcome reported on repeat and authorise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvsCv2Result {
    pub avs_cv2: String,
    pub address_result: Option<String>,
    pub post_code_result: Option<String>,
    pub cv2_result: Option<String>,
}

impl AvsCv2Result {
    /// Present only when the body carries `AVSCV2`.
    pub fn bind(fields: &FieldSet) -> Option<Self> {
        fields.get_owned("AVSCV2").map(|avs_cv2| Self {
            avs_cv2,
            address_result: fields.get_owned("AddressResult"),
            post_code_result: fields.get_owned("PostCodeResult"),
            cv2_result: fields.get_owned("CV2Result"),
        })
    }

    fn write(&self, fields: &mut FieldSet) {
        fields.insert("AVSCV2", self.avs_cv2.as_str());
        fields.insert_opt("AddressResult", self.address_result.as_deref());
        fields.insert_opt("PostCodeResult", self.post_code_result.as_deref());
        fields.insert_opt("CV2Result", self.cv2_result.as_deref());
    }
}

/// Answer to REPEAT, REPEATDEFERRED and AUTHORISE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepeatResponse {
    pub header: ResponseHeader,
    pub vps_tx_id: Option<String>,
    pub tx_auth_no: Option<u64>,
    pub security_key: Option<String>,
    pub avs_cv2: Option<AvsCv2Result>,
}

pub type AuthoriseResponse = RepeatResponse;

impl GatewayResponse for RepeatResponse {
    fn from_fields(fields: &FieldSet) -> GatewayResult<Self> {
        let header = ResponseHeader::bind(fields, &REPEAT_STATUSES)?;
        let ok = header.status == Status::Ok;

        Ok(Self {
            vps_tx_id: required_when(fields, "VPSTxId", ok)?,
            tx_auth_no: auth_no_when(fields, ok)?,
            security_key: required_when(fields, "SecurityKey", ok)?,
            avs_cv2: AvsCv2Result::bind(fields),
            header,
        })
    }

    fn header(&self) -> &ResponseHeader {
        &self.header
    }

    fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        self.header.write(&mut fields);
        fields.insert_opt("VPSTxId", self.vps_tx_id.as_deref());
        fields.insert_opt("TxAuthNo", self.tx_auth_no.map(|n| n.to_string()));
        fields.insert_opt("SecurityKey", self.security_key.as_deref());
        if let Some(result) = &self.avs_cv2 {
            result.write(&mut fields);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_REGISTRATION: &str = "VPSProtocol=2.23\r\nStatus=OK\r\nStatusDetail=Simulated\r\nVPSTxId=abc-123\r\nSecurityKey=XYZ1234567\r\nNextURL=https://pay.example/next";

    #[test]
    fn test_ok_registration_binds_everything() {
        let response = TransactionRegistrationResponse::parse(OK_REGISTRATION).unwrap();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.header.status_detail.as_deref(), Some("Simulated"));
        assert_eq!(response.vps_tx_id.as_deref(), Some("abc-123"));
        assert_eq!(response.security_key.as_deref(), Some("XYZ1234567"));
        assert_eq!(response.next_url.as_deref(), Some("https://pay.example/next"));
    }

    #[test]
    fn test_repeated_registration_binds_only_tx_id() {
        let response = TransactionRegistrationResponse::parse(
            "VPSProtocol=2.23\r\nStatus=OK REPEATED\r\nVPSTxId=abc-123\r\nSecurityKey=XYZ",
        )
        .unwrap();
        assert!(response.is_ok());
        assert_eq!(response.vps_tx_id.as_deref(), Some("abc-123"));
        assert_eq!(response.security_key, None);
    }

    #[test]
    fn test_failed_registration_ignores_gated_fields() {
        let response = TransactionRegistrationResponse::parse(
            "VPSProtocol=2.23\r\nStatus=INVALID\r\nStatusDetail=Bad amount\r\nVPSTxId=abc-123",
        )
        .unwrap();
        assert_eq!(response.status(), Status::Invalid);
        assert_eq!(response.vps_tx_id, None);
        assert_eq!(response.to_field_set().len(), 3);
    }

    #[test]
    fn test_missing_gated_field_is_malformed() {
        let result = TransactionRegistrationResponse::parse(
            "VPSProtocol=2.23\r\nStatus=OK\r\nVPSTxId=abc-123\r\nNextURL=https://pay.example/next",
        );
        match result {
            Err(GatewayError::MalformedResponse { field, .. }) => assert_eq!(field, "SecurityKey"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_or_foreign_status_is_malformed() {
        assert!(StatusResponse::parse("VPSProtocol=2.23\r\nStatus=MAYBE").is_err());
        assert!(StatusResponse::parse("VPSProtocol=2.23\r\nStatus=REJECTED").is_err());
        assert!(StatusResponse::parse("Status=OK").is_err());
    }

    #[test]
    fn test_refund_auth_no_only_on_ok() {
        let ok = RefundResponse::parse("VPSProtocol=2.23\r\nStatus=OK\r\nVPSTxId=r-1\r\nTxAuthNo=7001")
            .unwrap();
        assert_eq!(ok.tx_auth_no, Some(7001));

        let declined =
            RefundResponse::parse("VPSProtocol=2.23\r\nStatus=NOTAUTHED\r\nTxAuthNo=7001").unwrap();
        assert_eq!(declined.tx_auth_no, None);

        let garbled = RefundResponse::parse("VPSProtocol=2.23\r\nStatus=OK\r\nVPSTxId=r-1\r\nTxAuthNo=abc");
        assert!(matches!(garbled, Err(GatewayError::MalformedResponse { .. })));
    }

    #[test]
    fn test_repeat_exposes_avs_group_when_present() {
        let response = RepeatResponse::parse(
            "VPSProtocol=2.23\r\nStatus=OK\r\nVPSTxId=n-1\r\nTxAuthNo=12\r\nSecurityKey=K\r\nAVSCV2=ALL MATCH\r\nCV2Result=MATCHED",
        )
        .unwrap();
        let avs = response.avs_cv2.as_ref().unwrap();
        assert_eq!(avs.avs_cv2, "ALL MATCH");
        assert_eq!(avs.cv2_result.as_deref(), Some("MATCHED"));
        assert_eq!(avs.address_result, None);
        assert_eq!(response.to_field_set().get("AVSCV2"), Some("ALL MATCH"));
    }

    #[test]
    fn test_json_rendering_contains_bound_fields_only() {
        let response = StatusResponse::parse("VPSProtocol=2.23\r\nStatus=OK").unwrap();
        assert_eq!(response.to_json(), r#"{"VPSProtocol":"2.23","Status":"OK"}"#);
    }
}
