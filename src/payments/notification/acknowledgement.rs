//! Acknowledgement returned to the gateway for every notification.

use serde::Serialize;
use std::fmt;

use super::NotificationFamily;
use crate::error::GatewayResult;
use crate::payments::codec::FieldSet;
use crate::payments::validation::{Rules, Validate, ValidationErrors};

/// Acknowledgement status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AckStatus {
    Ok,
    /// Token notifications only.
    Malformed,
    Invalid,
    Error,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Ok => "OK",
            AckStatus::Malformed => "MALFORMED",
            AckStatus::Invalid => "INVALID",
            AckStatus::Error => "ERROR",
        }
    }

    pub fn allowed_for(&self, family: NotificationFamily) -> bool {
        *self != AckStatus::Malformed || family == NotificationFamily::Token
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a notification, from the gateway's report or from our own
/// handling of it. Selects both the acknowledgement status and the redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationOutcome {
    Ok,
    NotAuthed,
    Abort,
    Rejected,
    Authenticated,
    Registered,
    /// The gateway reported ERROR.
    Error,
    /// The notification failed our validation or signature check.
    Invalid,
    /// The notification could not be decoded.
    Malformed,
    /// We could not process a valid notification.
    Fail,
}

impl NotificationOutcome {
    /// Key of the transaction redirect table entry.
    pub fn key(&self) -> &'static str {
        match self {
            NotificationOutcome::Ok => "ok",
            NotificationOutcome::NotAuthed => "notauthed",
            NotificationOutcome::Abort => "abort",
            NotificationOutcome::Rejected => "rejected",
            NotificationOutcome::Authenticated => "authenticated",
            NotificationOutcome::Registered => "registered",
            NotificationOutcome::Error => "error",
            NotificationOutcome::Invalid => "invalid",
            NotificationOutcome::Malformed => "malformed",
            NotificationOutcome::Fail => "fail",
        }
    }

    /// Redirect table key for this outcome in `family`.
    pub fn redirect_key(&self, family: NotificationFamily) -> &'static str {
        match family {
            NotificationFamily::Transaction => self.key(),
            NotificationFamily::Token if *self == NotificationOutcome::Ok => "token_ok",
            NotificationFamily::Token => "token_error",
        }
    }

    /// Every gateway-reported outcome is acknowledged OK; only our own
    /// rejection or failure is not.
    pub fn ack_status(&self, family: NotificationFamily) -> AckStatus {
        match self {
            NotificationOutcome::Invalid => AckStatus::Invalid,
            NotificationOutcome::Malformed if family == NotificationFamily::Token => {
                AckStatus::Malformed
            }
            NotificationOutcome::Malformed => AckStatus::Invalid,
            NotificationOutcome::Fail => AckStatus::Error,
            _ => AckStatus::Ok,
        }
    }
}

/// Acknowledgement body sent back to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationResponse {
    pub family: NotificationFamily,
    pub status: AckStatus,
    pub redirect_url: String,
    pub status_detail: Option<String>,
}

impl NotificationResponse {
    /// Builds and validates an acknowledgement.
    pub fn new(
        family: NotificationFamily,
        status: AckStatus,
        redirect_url: impl Into<String>,
        status_detail: Option<String>,
    ) -> GatewayResult<Self> {
        let response = Self {
            family,
            status,
            redirect_url: redirect_url.into(),
            status_detail: status_detail.filter(|d| !d.is_empty()),
        };
        response.validate()?;
        Ok(response)
    }

    pub fn to_field_set(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.insert("Status", self.status.as_str());
        fields.insert("RedirectURL", strip_line_breaks(&self.redirect_url));
        fields.insert_opt("StatusDetail", self.status_detail.as_deref().map(strip_line_breaks));
        fields
    }

    /// Plain `Key=Value` lines joined by CRLF.
    pub fn to_body(&self) -> String {
        self.to_field_set()
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}

impl fmt::Display for NotificationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_body())
    }
}

impl Validate for NotificationResponse {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut rules = Rules::new();
        rules.ensure(
            self.status.allowed_for(self.family),
            "Status",
            "MALFORMED is only valid for token notifications",
        );
        rules
            .field("RedirectURL", Some(self.redirect_url.as_str()))
            .required()
            .max_len(255)
            .url();
        rules
            .field("StatusDetail", self.status_detail.as_deref())
            .max_len(255);
        rules.finish()
    }
}

fn strip_line_breaks(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[test]
    fn test_body_is_plain_crlf_pairs() {
        let response = NotificationResponse::new(
            NotificationFamily::Transaction,
            AckStatus::Ok,
            "https://shop.example/done?order=1&step=2",
            Some("Thanks\r\nfor paying".to_string()),
        )
        .unwrap();

        assert_eq!(
            response.to_body(),
            "Status=OK\r\nRedirectURL=https://shop.example/done?order=1&step=2\r\nStatusDetail=Thanksfor paying"
        );
    }

    #[test]
    fn test_malformed_only_for_tokens() {
        assert!(NotificationResponse::new(
            NotificationFamily::Transaction,
            AckStatus::Malformed,
            "https://shop.example/error",
            None,
        )
        .is_err());

        let token = NotificationResponse::new(
            NotificationFamily::Token,
            AckStatus::Malformed,
            "https://shop.example/error",
            None,
        )
        .unwrap();
        assert_eq!(token.to_body(), "Status=MALFORMED\r\nRedirectURL=https://shop.example/error");
    }

    #[test]
    fn test_redirect_must_be_absolute() {
        let result = NotificationResponse::new(
            NotificationFamily::Transaction,
            AckStatus::Ok,
            "/done",
            None,
        );
        match result {
            Err(GatewayError::Validation(errors)) => assert!(errors.contains("RedirectURL")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_gateway_outcomes_are_acknowledged_ok() {
        for outcome in [
            NotificationOutcome::Ok,
            NotificationOutcome::NotAuthed,
            NotificationOutcome::Abort,
            NotificationOutcome::Rejected,
            NotificationOutcome::Error,
        ] {
            assert_eq!(outcome.ack_status(NotificationFamily::Transaction), AckStatus::Ok);
        }
        assert_eq!(
            NotificationOutcome::Invalid.ack_status(NotificationFamily::Transaction),
            AckStatus::Invalid
        );
        assert_eq!(
            NotificationOutcome::Malformed.ack_status(NotificationFamily::Transaction),
            AckStatus::Invalid
        );
        assert_eq!(
            NotificationOutcome::Malformed.ack_status(NotificationFamily::Token),
            AckStatus::Malformed
        );
        assert_eq!(
            NotificationOutcome::Fail.ack_status(NotificationFamily::Token),
            AckStatus::Error
        );
    }

    #[test]
    fn test_redirect_keys_per_family() {
        assert_eq!(
            NotificationOutcome::NotAuthed.redirect_key(NotificationFamily::Transaction),
            "notauthed"
        );
        assert_eq!(
            NotificationOutcome::Ok.redirect_key(NotificationFamily::Token),
            "token_ok"
        );
        assert_eq!(
            NotificationOutcome::Invalid.redirect_key(NotificationFamily::Token),
            "token_error"
        );
    }
}
