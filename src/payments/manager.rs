//! Gateway manager
//!
//! Runs the outbound pipeline (stamp, validate, encode, post, decode, copy
//! back) for every request kind, and the inbound one (decode, validate,
//! verify, acknowledge) for notifications. Holds only read-only settings and
//! shared collaborators, so one instance serves concurrent transactions.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::payments::codec;
use crate::payments::notification::{
    Notification, NotificationFamily, NotificationOutcome, NotificationResponse,
    TokenNotification, TransactionNotification,
};
use crate::payments::request::{
    AbortRequest, AuthoriseRequest, CancelRequest, GatewayRequest, NotificationTarget,
    RefundRequest, ReleaseRequest, RepeatDeferredRequest, RepeatRequest, RequestKind,
    TokenRegistrationRequest, TokenRemovalRequest, TransactionRegistration, VoidRequest,
};
use crate::payments::response::{
    AbortResponse, AuthoriseResponse, CancelResponse, GatewayResponse, RefundResponse,
    ReleaseResponse, RepeatResponse, TokenRegistrationResponse, TokenRemovalResponse,
    TransactionRegistrationResponse, VoidResponse,
};
use crate::payments::signature;
use crate::payments::traits::{HttpTransport, RouteResolver};
use crate::payments::types::{Mode, Service, TransactionReference, TxType};
use crate::payments::validation::{patterns, Validate};

pub const DEFAULT_PROTOCOL: &str = "2.23";
pub const DEFAULT_TRANSACTION_NOTIFICATION_URL: &str = "@notifications/transaction";
pub const DEFAULT_TOKEN_NOTIFICATION_URL: &str = "@notifications/token";

/// Every key the redirect table must define.
pub const REDIRECT_KEYS: [&str; 12] = [
    "ok",
    "notauthed",
    "abort",
    "rejected",
    "authenticated",
    "registered",
    "error",
    "invalid",
    "fail",
    "malformed",
    "token_ok",
    "token_error",
];

/// Immutable gateway settings, fixed at start-up.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub vendor: String,
    pub protocol: String,
    pub mode: Mode,
    /// Route name (`@name`) or absolute URL.
    pub transaction_notification_url: String,
    pub token_notification_url: String,
    /// Redirect target per outcome key; route names or absolute URLs.
    pub redirects: HashMap<String, String>,
}

impl GatewaySettings {
    pub fn new(vendor: impl Into<String>, mode: Mode) -> Self {
        Self {
            vendor: vendor.into(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            mode,
            transaction_notification_url: DEFAULT_TRANSACTION_NOTIFICATION_URL.to_string(),
            token_notification_url: DEFAULT_TOKEN_NOTIFICATION_URL.to_string(),
            redirects: HashMap::new(),
        }
    }

    pub fn with_redirect(mut self, key: &str, target: impl Into<String>) -> Self {
        self.redirects.insert(key.to_string(), target.into());
        self
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.vendor.is_empty() || self.vendor.len() > 15 || !patterns::VENDOR.is_match(&self.vendor) {
            return Err(GatewayError::config_error(format!(
                "vendor must be 1-15 characters of [A-Za-z0-9_-], got {:?}",
                self.vendor
            )));
        }

        if !patterns::PROTOCOL.is_match(&self.protocol) {
            return Err(GatewayError::config_error(format!(
                "protocol must look like 2.23, got {:?}",
                self.protocol
            )));
        }

        let missing: Vec<&str> = REDIRECT_KEYS
            .iter()
            .copied()
            .filter(|key| self.redirects.get(*key).map_or(true, |t| t.is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(GatewayError::config_error(format!(
                "missing redirect targets: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }
}

/// Entry point for every gateway operation.
pub struct GatewayManager {
    settings: GatewaySettings,
    transport: Arc<dyn HttpTransport>,
    resolver: Arc<dyn RouteResolver>,
}

impl GatewayManager {
    pub fn new(
        settings: GatewaySettings,
        transport: Arc<dyn HttpTransport>,
        resolver: Arc<dyn RouteResolver>,
    ) -> GatewayResult<Self> {
        settings.validate()?;

        info!(
            vendor = %settings.vendor,
            mode = %settings.mode,
            protocol = %settings.protocol,
            "gateway manager initialised"
        );

        Ok(Self {
            settings,
            transport,
            resolver,
        })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Gateway URL a request of `tx_type` is posted to in the configured mode.
    pub fn endpoint(&self, tx_type: TxType) -> String {
        self.service_endpoint(tx_type.service())
    }

    pub fn service_endpoint(&self, service: Service) -> String {
        self.settings.mode.endpoint(service)
    }

    /// Stamps, validates and posts `request`, then decodes the answer.
    ///
    /// Nothing is sent when validation fails.
    pub async fn submit<R: GatewayRequest>(&self, request: &mut R) -> GatewayResult<R::Response> {
        request
            .header_mut()
            .stamp(&self.settings.protocol, &self.settings.vendor);

        if let Some(target) = request.notification_target() {
            let configured = match target {
                NotificationTarget::Transaction => &self.settings.transaction_notification_url,
                NotificationTarget::Token => &self.settings.token_notification_url,
            };
            let url = self.resolver.resolve(configured)?;
            request.set_notification_url(url);
        }

        let tx_type = request.tx_type();
        let vendor_tx_code = request.header().vendor_tx_code.clone().unwrap_or_default();

        if let Err(errors) = request.validate() {
            warn!(
                tx_type = %tx_type,
                vendor_tx_code = %vendor_tx_code,
                fields = ?errors.fields(),
                errors = %errors,
                "request failed validation"
            );
            return Err(errors.into());
        }

        let url = self.endpoint(tx_type);
        info!(
            tx_type = %tx_type,
            vendor_tx_code = %vendor_tx_code,
            endpoint = %url,
            "sending request to gateway"
        );

        let body = codec::encode_latin1(&request.to_field_set());
        let raw = self.transport.post(&url, body).await?;

        let response = R::Response::parse(&raw).map_err(|e| {
            warn!(
                tx_type = %tx_type,
                vendor_tx_code = %vendor_tx_code,
                error = %e,
                "gateway response could not be bound"
            );
            e
        })?;

        info!(
            tx_type = %tx_type,
            vendor_tx_code = %vendor_tx_code,
            status = %response.status(),
            status_detail = response.header().status_detail.as_deref().unwrap_or(""),
            "gateway responded"
        );

        Ok(response)
    }

    /// Submits `request` and, on an OK answer, records the gateway-assigned
    /// fields onto `target`.
    pub async fn submit_and_record<R: GatewayRequest>(
        &self,
        request: &mut R,
        target: &mut dyn TransactionReference,
    ) -> GatewayResult<R::Response> {
        let response = self.submit(request).await?;
        if response.is_ok() {
            request.record(&response, target);
        }
        Ok(response)
    }

    /// Registers a PAYMENT, DEFERRED or AUTHENTICATE transaction.
    pub async fn register_transaction<K: RequestKind>(
        &self,
        request: &mut TransactionRegistration<K>,
        transaction: &mut dyn TransactionReference,
    ) -> GatewayResult<TransactionRegistrationResponse> {
        self.submit_and_record(request, transaction).await
    }

    pub async fn register_token(
        &self,
        request: &mut TokenRegistrationRequest,
        transaction: &mut dyn TransactionReference,
    ) -> GatewayResult<TokenRegistrationResponse> {
        self.submit_and_record(request, transaction).await
    }

    pub async fn remove_token(&self, request: &mut TokenRemovalRequest) -> GatewayResult<TokenRemovalResponse> {
        self.submit(request).await
    }

    /// Releases a DEFERRED transaction, for its full amount unless given.
    pub async fn perform_release(
        &self,
        transaction: &dyn TransactionReference,
        release_amount: Option<Decimal>,
    ) -> GatewayResult<ReleaseResponse> {
        self.submit(&mut ReleaseRequest::new(transaction, release_amount)).await
    }

    pub async fn perform_abort(&self, transaction: &dyn TransactionReference) -> GatewayResult<AbortResponse> {
        self.submit(&mut AbortRequest::new(transaction)).await
    }

    pub async fn perform_void(&self, transaction: &dyn TransactionReference) -> GatewayResult<VoidResponse> {
        self.submit(&mut VoidRequest::new(transaction)).await
    }

    pub async fn perform_cancel(&self, transaction: &dyn TransactionReference) -> GatewayResult<CancelResponse> {
        self.submit(&mut CancelRequest::new(transaction)).await
    }

    /// Refunds `transaction`; the refund itself is recorded onto `refund`.
    pub async fn perform_refund(
        &self,
        transaction: &dyn TransactionReference,
        refund: &mut dyn TransactionReference,
        amount: Decimal,
        currency: &str,
        description: &str,
    ) -> GatewayResult<RefundResponse> {
        let mut request = RefundRequest::new(transaction, amount, currency, description);
        self.submit_and_record(&mut request, refund).await
    }

    /// Charges the card of `transaction` again; the new charge is recorded onto `repeat`.
    pub async fn perform_repeat(
        &self,
        transaction: &dyn TransactionReference,
        repeat: &mut dyn TransactionReference,
        amount: Decimal,
        currency: &str,
        description: &str,
        cv2: Option<String>,
    ) -> GatewayResult<RepeatResponse> {
        let mut request = RepeatRequest::new(transaction, amount, currency, description);
        request.cv2 = cv2;
        self.submit_and_record(&mut request, repeat).await
    }

    pub async fn perform_repeat_deferred(
        &self,
        transaction: &dyn TransactionReference,
        repeat: &mut dyn TransactionReference,
        amount: Decimal,
        currency: &str,
        description: &str,
        cv2: Option<String>,
    ) -> GatewayResult<RepeatResponse> {
        let mut request = RepeatDeferredRequest::new(transaction, amount, currency, description);
        request.cv2 = cv2;
        self.submit_and_record(&mut request, repeat).await
    }

    /// Authorises against an AUTHENTICATE transaction; the authorisation is
    /// recorded onto `authorise`.
    pub async fn perform_authorise(
        &self,
        transaction: &dyn TransactionReference,
        authorise: &mut dyn TransactionReference,
        amount: Decimal,
        description: &str,
        apply_avs_cv2: Option<u8>,
    ) -> GatewayResult<AuthoriseResponse> {
        let mut request = AuthoriseRequest::new(transaction, amount, description);
        request.apply_avs_cv2 = apply_avs_cv2;
        self.submit_and_record(&mut request, authorise).await
    }

    /// Decodes and validates a notification body of either family.
    pub fn create_notification<N: Notification>(&self, body: &str) -> GatewayResult<N> {
        let notification = N::parse(body).map_err(|e| {
            warn!(family = N::FAMILY.as_str(), error = %e, "notification could not be decoded");
            GatewayError::invalid_notification(e.to_string())
        })?;

        if let Err(errors) = notification.validate() {
            warn!(
                family = N::FAMILY.as_str(),
                vendor_tx_code = %notification.header().vendor_tx_code,
                fields = ?errors.fields(),
                "notification failed validation"
            );
            return Err(GatewayError::invalid_notification(errors.to_string()));
        }

        Ok(notification)
    }

    pub fn create_transaction_notification(&self, body: &str) -> GatewayResult<TransactionNotification> {
        self.create_notification(body)
    }

    pub fn create_token_notification(&self, body: &str) -> GatewayResult<TokenNotification> {
        self.create_notification(body)
    }

    /// Checks the notification's signature against `security_key`.
    ///
    /// Nothing in a notification may be acted on until this returns `true`.
    pub fn is_notification_authentic<N: Notification>(&self, notification: &N, security_key: &str) -> bool {
        let authentic = signature::is_authentic(notification, &self.settings.vendor, security_key);
        if !authentic {
            warn!(
                family = N::FAMILY.as_str(),
                vendor_tx_code = %notification.header().vendor_tx_code,
                vps_tx_id = %notification.header().vps_tx_id,
                "notification signature mismatch"
            );
        }
        authentic
    }

    /// Builds the acknowledgement for `outcome`, redirecting to the
    /// configured page for it.
    pub fn create_notification_response(
        &self,
        family: NotificationFamily,
        outcome: NotificationOutcome,
        status_detail: Option<String>,
    ) -> GatewayResult<NotificationResponse> {
        let key = outcome.redirect_key(family);
        let target = self
            .settings
            .redirects
            .get(key)
            .ok_or_else(|| GatewayError::config_error(format!("no redirect target for {}", key)))?;
        let redirect_url = self.resolver.resolve(target)?;

        NotificationResponse::new(family, outcome.ack_status(family), redirect_url, status_detail)
    }

    /// Acknowledges a decoded notification: its own outcome when the
    /// signature matches, INVALID otherwise.
    pub fn acknowledge<N: Notification>(
        &self,
        notification: &N,
        security_key: &str,
    ) -> GatewayResult<NotificationResponse> {
        if self.is_notification_authentic(notification, security_key) {
            self.create_notification_response(
                N::FAMILY,
                notification.outcome(),
                notification.header().status_detail.clone(),
            )
        } else {
            self.create_notification_response(
                N::FAMILY,
                NotificationOutcome::Invalid,
                Some("Signature mismatch".to_string()),
            )
        }
    }
}
