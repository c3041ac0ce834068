//! Registration endpoints
//!
//! Register a transaction or a card token with the gateway and keep the
//! issued SecurityKey so the later notification can be verified.

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::error::GatewayError;
use crate::payments::request::kind::{Authenticate, Deferred, Payment};
use crate::payments::request::{
    RequestHeader, RequestKind, TokenRegistrationRequest, TransactionRegistration,
};
use crate::payments::response::GatewayResponse;
use crate::payments::validation::ValidationError;
use crate::payments::{Address, Status, Transaction, TransactionReference};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegistrationKind {
    #[default]
    Payment,
    Deferred,
    Authenticate,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRegistrationBody {
    #[serde(default)]
    pub tx_type: RegistrationKind,
    /// Generated when absent.
    pub vendor_tx_code: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub billing: Address,
    /// Billing address is reused when absent.
    pub delivery: Option<Address>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRegistrationBody {
    pub vendor_tx_code: Option<String>,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub status: Status,
    pub status_detail: Option<String>,
    pub vendor_tx_code: String,
    pub vps_tx_id: Option<String>,
    pub next_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ValidationError>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: GatewayError) -> ApiError {
    let status = match &err {
        GatewayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GatewayError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    let fields = match &err {
        GatewayError::Validation(errors) => errors.iter().cloned().collect(),
        _ => Vec::new(),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            fields,
        }),
    )
}

fn header_for(vendor_tx_code: Option<String>) -> RequestHeader {
    match vendor_tx_code {
        Some(code) => RequestHeader::with_vendor_tx_code(code),
        None => RequestHeader::new(),
    }
}

fn build<K: RequestKind>(body: TransactionRegistrationBody) -> TransactionRegistration<K> {
    let mut request = TransactionRegistration::<K>::new(body.amount, body.currency, body.description);
    request.header = header_for(body.vendor_tx_code);
    request.customer_email = body.customer_email;
    let delivery = body.delivery.unwrap_or_else(|| body.billing.clone());
    request.set_billing_address(body.billing);
    request.set_delivery_address(delivery);
    request
}

async fn register<K: RequestKind>(
    state: &AppState,
    body: TransactionRegistrationBody,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let mut request = build::<K>(body);
    let mut transaction = Transaction::default();

    let response = state
        .manager
        .register_transaction(&mut request, &mut transaction)
        .await
        .map_err(api_error)?;
    let status = response.status();
    remember(state, &transaction, status).await;

    Ok(Json(RegistrationResponse {
        status,
        status_detail: response.header.status_detail,
        vendor_tx_code: request.header.vendor_tx_code.unwrap_or_default(),
        vps_tx_id: response.vps_tx_id,
        next_url: response.next_url,
    }))
}

/// Stores the key of an OK registration before NextURL reaches the customer.
async fn remember(state: &AppState, transaction: &Transaction, status: Status) {
    if state.keys.remember(transaction).await {
        info!(
            vendor_tx_code = transaction.vendor_tx_code().unwrap_or_default(),
            "registration key stored"
        );
    } else {
        warn!(status = %status, "registration not accepted, no key stored");
    }
}

pub async fn register_transaction(
    State(state): State<AppState>,
    Json(body): Json<TransactionRegistrationBody>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    match body.tx_type {
        RegistrationKind::Payment => register::<Payment>(&state, body).await,
        RegistrationKind::Deferred => register::<Deferred>(&state, body).await,
        RegistrationKind::Authenticate => register::<Authenticate>(&state, body).await,
    }
}

pub async fn register_token(
    State(state): State<AppState>,
    Json(body): Json<TokenRegistrationBody>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let mut request = TokenRegistrationRequest::new(body.currency);
    request.header = header_for(body.vendor_tx_code);
    let mut transaction = Transaction::default();

    let response = state
        .manager
        .register_token(&mut request, &mut transaction)
        .await
        .map_err(api_error)?;
    let status = response.status();
    remember(&state, &transaction, status).await;

    Ok(Json(RegistrationResponse {
        status,
        status_detail: response.header.status_detail,
        vendor_tx_code: request.header.vendor_tx_code.unwrap_or_default(),
        vps_tx_id: response.vps_tx_id,
        next_url: response.next_url,
    }))
}
